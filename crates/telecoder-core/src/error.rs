// SPDX-FileCopyrightText: 2026 TeleCoder Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the TeleCoder service.

use thiserror::Error;

/// The primary error type used across all TeleCoder components.
#[derive(Debug, Error)]
pub enum TelecoderError {
    /// Caller-side errors (bad repo format, missing prompt, mode mismatch,
    /// idle-state mismatch, message limit). Surfaced to the caller; no
    /// session side-effects.
    #[error("validation error: {0}")]
    Validation(String),

    /// Storage backend errors (database open, query failure, serialization).
    #[error("storage error: {source}")]
    Storage {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Sandbox runtime errors (container start/exec/wait failed).
    #[error("sandbox error: {message}")]
    Runtime {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Git hosting provider errors (PR creation, push, API failure).
    #[error("git provider error: {message}")]
    Git {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// LLM provider errors (API failure, timeout, malformed response).
    #[error("llm provider error: {message}")]
    Provider {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// A chain evaluation was refused because the session already sits at
    /// the maximum chain depth. Never a session failure.
    #[error("chain depth limit reached ({max})")]
    ChainLimit { max: u32 },

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl TelecoderError {
    /// Shorthand for a [`TelecoderError::Runtime`] without a source.
    pub fn runtime(message: impl Into<String>) -> Self {
        TelecoderError::Runtime {
            message: message.into(),
            source: None,
        }
    }

    /// Shorthand for a [`TelecoderError::Git`] without a source.
    pub fn git(message: impl Into<String>) -> Self {
        TelecoderError::Git {
            message: message.into(),
            source: None,
        }
    }

    /// Shorthand for a [`TelecoderError::Provider`] without a source.
    pub fn provider(message: impl Into<String>) -> Self {
        TelecoderError::Provider {
            message: message.into(),
            source: None,
        }
    }
}

/// Convenience alias used throughout the workspace.
pub type Result<T> = std::result::Result<T, TelecoderError>;
