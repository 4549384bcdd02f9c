// SPDX-FileCopyrightText: 2026 TeleCoder Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Layered configuration for the TeleCoder service.
//!
//! Resolution order: process environment (`TELECODER_*`) > TOML file
//! (`~/.telecoder/telecoder.toml`, then `./telecoder.toml`) > compiled
//! defaults.

pub mod loader;
pub mod model;

pub use loader::{load_config, load_config_from_path, load_config_from_str};
pub use model::TelecoderConfig;

/// Error produced by the configuration loader.
pub use figment::Error as ConfigError;
