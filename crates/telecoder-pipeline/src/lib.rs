// SPDX-FileCopyrightText: 2026 TeleCoder Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! LLM-backed pipeline stages for TeleCoder sessions.
//!
//! Decompose, Plan, Verify, and Review are pure transforms over
//! `complete(system, user)`; each accepts a custom system prompt with a
//! supplied default. Parsers tolerate markdown fences and surrounding
//! prose, and fall back conservatively on malformed responses.

pub mod parse;
pub mod progress;
pub mod prompts;
pub mod stages;

pub use progress::{format_progress_json, progress_context};
pub use prompts::{enrich_prompt, revise_prompt};
pub use stages::{
    single_task, DecomposeStage, PlanStage, ReviewResult, ReviewStage, VerifyResult, VerifyStage,
};
