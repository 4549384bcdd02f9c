// SPDX-FileCopyrightText: 2026 TeleCoder Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Minimal LLM client trait.

use async_trait::async_trait;

use crate::error::Result;

/// A minimal interface for LLM API calls.
///
/// Pipeline stages and the dispatcher need nothing more than a function
/// from (system prompt, user prompt) to text.
#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn complete(&self, system: &str, user: &str) -> Result<String>;
}
