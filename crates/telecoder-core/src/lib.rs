// SPDX-FileCopyrightText: 2026 TeleCoder Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the TeleCoder service.
//!
//! This crate provides the domain types, the error type, and the component
//! traits (store, sandbox runtime, git provider, LLM client, coding agent)
//! used throughout the TeleCoder workspace. Every pluggable component has
//! exactly one default implementation in a sibling crate.

pub mod error;
pub mod traits;
pub mod types;

pub use error::{Result, TelecoderError};
pub use traits::{
    CodingAgent, GitProvider, LlmClient, LogStream, PrOptions, RepoContext, SandboxRuntime,
    SessionStore, StartOptions, WebhookEvent,
};
pub use types::{
    AgentEvent, Event, EventKind, Message, Mode, Session, SessionResult, Status, StepState,
    SubTask, SubTaskStatus,
};
