// SPDX-FileCopyrightText: 2026 TeleCoder Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! LLM clients for TeleCoder pipeline stages and the dispatcher.
//!
//! Both clients implement the single-operation [`LlmClient`] trait from
//! `telecoder-core`: `complete(system, user) → text`.
//!
//! [`LlmClient`]: telecoder_core::traits::LlmClient

pub mod anthropic;
pub mod openai;

pub use anthropic::AnthropicClient;
pub use openai::OpenAiClient;
