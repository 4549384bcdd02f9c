// SPDX-FileCopyrightText: 2026 TeleCoder Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration loader using Figment for layered config merging.
//!
//! Merge order (later overrides earlier): compiled defaults >
//! `~/.telecoder/telecoder.toml` > `./telecoder.toml` > `TELECODER_*`
//! environment variables.

#![allow(clippy::result_large_err)] // figment::Error is external and cannot be boxed without wrapper

use std::path::Path;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};

use crate::model::TelecoderConfig;

/// Load configuration from the standard hierarchy with env var overrides.
pub fn load_config() -> Result<TelecoderConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(TelecoderConfig::default()))
        .merge(Toml::file(
            dirs::home_dir()
                .map(|h| h.join(".telecoder/telecoder.toml"))
                .unwrap_or_default(),
        ))
        .merge(Toml::file("telecoder.toml"))
        .merge(env_provider())
        .extract()
}

/// Load configuration from a TOML string only. Used in tests.
pub fn load_config_from_str(toml_content: &str) -> Result<TelecoderConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(TelecoderConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load configuration from a specific file path with env var overrides.
pub fn load_config_from_path(path: &Path) -> Result<TelecoderConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(TelecoderConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// Environment variable provider using explicit `map()` for section-to-dot
/// mapping. `Env::split("_")` would misparse underscore-containing keys:
/// `TELECODER_LIMITS_MAX_REVISIONS` must map to `limits.max_revisions`,
/// not `limits.max.revisions`.
fn env_provider() -> Env {
    Env::prefixed("TELECODER_").map(|key| {
        let key_str = key.as_str();
        let mapped = key_str
            .replacen("server_", "server.", 1)
            .replacen("data_", "data.", 1)
            .replacen("sandbox_", "sandbox.", 1)
            .replacen("limits_", "limits.", 1)
            .replacen("agent_", "agent.", 1)
            .replacen("github_", "github.", 1)
            .replacen("llm_", "llm.", 1);
        mapped.into()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_string_yields_defaults() {
        let cfg = load_config_from_str("").unwrap();
        assert_eq!(cfg.limits.max_revisions, 1);
        assert_eq!(cfg.server.addr, "0.0.0.0:7080");
    }

    #[test]
    fn file_values_override_defaults() {
        let cfg = load_config_from_str(
            r#"
            [limits]
            max_revisions = 3
            max_sub_tasks = 8

            [sandbox]
            image = "custom-image"
        "#,
        )
        .unwrap();
        assert_eq!(cfg.limits.max_revisions, 3);
        assert_eq!(cfg.limits.max_sub_tasks, 8);
        assert_eq!(cfg.sandbox.image, "custom-image");
        // Untouched sections keep defaults.
        assert_eq!(cfg.limits.chat_max_messages, 50);
        assert_eq!(cfg.sandbox.network, "telecoder-net");
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let result = load_config_from_str(
            r#"
            [limits]
            max_revisionz = 3
        "#,
        );
        assert!(result.is_err(), "typoed key should be rejected");
    }

    #[test]
    fn webhook_secret_loads() {
        let cfg = load_config_from_str(
            r#"
            [github]
            webhook_secret = "s3cret"
        "#,
        )
        .unwrap();
        assert_eq!(cfg.github.webhook_secret.as_deref(), Some("s3cret"));
    }
}
