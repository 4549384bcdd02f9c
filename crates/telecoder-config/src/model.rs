// SPDX-FileCopyrightText: 2026 TeleCoder Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for the TeleCoder service.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Top-level TeleCoder configuration.
///
/// Loaded from TOML files with environment variable overrides. All sections
/// are optional and default to sensible values.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct TelecoderConfig {
    /// HTTP server settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// Persistent data location.
    #[serde(default)]
    pub data: DataConfig,

    /// Sandbox container settings.
    #[serde(default)]
    pub sandbox: SandboxConfig,

    /// Workflow bounds.
    #[serde(default)]
    pub limits: LimitsConfig,

    /// Coding agent selection.
    #[serde(default)]
    pub agent: AgentConfig,

    /// GitHub integration settings.
    #[serde(default)]
    pub github: GithubConfig,

    /// LLM settings for pipeline stages.
    #[serde(default)]
    pub llm: LlmConfig,
}

/// HTTP server configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    /// Listen address. A leading-colon form like ":7080" is accepted and
    /// bound on all interfaces.
    #[serde(default = "default_server_addr")]
    pub addr: String,

    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: default_server_addr(),
            log_level: default_log_level(),
        }
    }
}

fn default_server_addr() -> String {
    "0.0.0.0:7080".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

impl ServerConfig {
    /// Normalises the listen address: ":7080" becomes "0.0.0.0:7080".
    pub fn bind_addr(&self) -> String {
        if self.addr.starts_with(':') {
            format!("0.0.0.0{}", self.addr)
        } else {
            self.addr.clone()
        }
    }
}

/// Persistent data location.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct DataConfig {
    /// Data root; defaults to `~/.telecoder`.
    #[serde(default = "default_data_dir")]
    pub dir: String,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            dir: default_data_dir(),
        }
    }
}

fn default_data_dir() -> String {
    dirs::home_dir()
        .map(|h| h.join(".telecoder"))
        .unwrap_or_else(|| PathBuf::from(".telecoder"))
        .to_string_lossy()
        .to_string()
}

impl DataConfig {
    /// Full path of the SQLite database file under the data dir.
    pub fn database_path(&self) -> String {
        PathBuf::from(&self.dir)
            .join("telecoder.db")
            .to_string_lossy()
            .to_string()
    }
}

/// Sandbox container configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SandboxConfig {
    /// Container image for sandbox runs.
    #[serde(default = "default_sandbox_image")]
    pub image: String,

    /// Container network shared by sandboxes.
    #[serde(default = "default_sandbox_network")]
    pub network: String,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            image: default_sandbox_image(),
            network: default_sandbox_network(),
        }
    }
}

fn default_sandbox_image() -> String {
    "telecoder-sandbox".to_string()
}

fn default_sandbox_network() -> String {
    "telecoder-net".to_string()
}

/// Workflow bounds.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct LimitsConfig {
    /// Review-or-verify retry bound per sub-task.
    #[serde(default = "default_max_revisions")]
    pub max_revisions: u32,

    /// Upper bound on task decomposition.
    #[serde(default = "default_max_sub_tasks")]
    pub max_sub_tasks: usize,

    /// Idle chat sessions older than this many seconds are reaped.
    #[serde(default = "default_chat_idle_timeout_secs")]
    pub chat_idle_timeout_secs: u64,

    /// User-message cap per chat session.
    #[serde(default = "default_chat_max_messages")]
    pub chat_max_messages: usize,

    /// Maximum follow-up chain depth.
    #[serde(default = "default_max_chain_depth")]
    pub max_chain_depth: u32,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_revisions: default_max_revisions(),
            max_sub_tasks: default_max_sub_tasks(),
            chat_idle_timeout_secs: default_chat_idle_timeout_secs(),
            chat_max_messages: default_chat_max_messages(),
            max_chain_depth: default_max_chain_depth(),
        }
    }
}

fn default_max_revisions() -> u32 {
    1
}

fn default_max_sub_tasks() -> usize {
    5
}

fn default_chat_idle_timeout_secs() -> u64 {
    30 * 60
}

fn default_chat_max_messages() -> usize {
    50
}

fn default_max_chain_depth() -> u32 {
    3
}

/// Coding agent selection.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct AgentConfig {
    /// Agent to run inside the sandbox: "opencode", "claude-code", "codex",
    /// "pi", or "auto" (the entrypoint picks based on available API keys).
    #[serde(default = "default_coding_agent")]
    pub coding_agent: String,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            coding_agent: default_coding_agent(),
        }
    }
}

fn default_coding_agent() -> String {
    "auto".to_string()
}

/// GitHub integration configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct GithubConfig {
    /// HMAC secret for the PR-comment webhook. `None` disables signature
    /// verification.
    #[serde(default)]
    pub webhook_secret: Option<String>,
}

/// LLM configuration for pipeline stages.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct LlmConfig {
    /// Model override; empty uses each client's default.
    #[serde(default)]
    pub model: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let cfg = TelecoderConfig::default();
        assert_eq!(cfg.server.addr, "0.0.0.0:7080");
        assert_eq!(cfg.sandbox.image, "telecoder-sandbox");
        assert_eq!(cfg.sandbox.network, "telecoder-net");
        assert_eq!(cfg.limits.max_revisions, 1);
        assert_eq!(cfg.limits.max_sub_tasks, 5);
        assert_eq!(cfg.limits.chat_idle_timeout_secs, 1800);
        assert_eq!(cfg.limits.chat_max_messages, 50);
        assert_eq!(cfg.limits.max_chain_depth, 3);
        assert_eq!(cfg.agent.coding_agent, "auto");
        assert!(cfg.github.webhook_secret.is_none());
    }

    #[test]
    fn bind_addr_expands_leading_colon() {
        let server = ServerConfig {
            addr: ":7080".into(),
            log_level: "info".into(),
        };
        assert_eq!(server.bind_addr(), "0.0.0.0:7080");

        let explicit = ServerConfig {
            addr: "127.0.0.1:9000".into(),
            log_level: "info".into(),
        };
        assert_eq!(explicit.bind_addr(), "127.0.0.1:9000");
    }

    #[test]
    fn database_path_is_under_data_dir() {
        let data = DataConfig {
            dir: "/tmp/tc".into(),
        };
        assert!(data.database_path().ends_with("telecoder.db"));
        assert!(data.database_path().starts_with("/tmp/tc"));
    }
}
