// SPDX-FileCopyrightText: 2026 TeleCoder Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! GitHub integration for TeleCoder.
//!
//! Implements the [`GitProvider`] trait over the GitHub REST API (pull
//! requests, default branches, PR-comment replies), repository indexing
//! for LLM context, and webhook parsing with HMAC verification.
//!
//! [`GitProvider`]: telecoder_core::traits::GitProvider

pub mod client;
pub mod indexer;
pub mod webhook;

pub use client::GithubClient;
pub use indexer::format_repo_context;
pub use webhook::parse_webhook;
