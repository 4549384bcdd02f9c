// SPDX-FileCopyrightText: 2026 TeleCoder Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Domain types shared across the TeleCoder workspace.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Marker prefix for status lines emitted by sandbox containers.
pub const MARKER_STATUS: &str = "###TELECODER_STATUS### ";
/// Marker prefix for error lines emitted by sandbox containers.
pub const MARKER_ERROR: &str = "###TELECODER_ERROR### ";
/// Marker prefix signalling a pushed branch (PR intent).
pub const MARKER_DONE: &str = "###TELECODER_DONE### ";
/// Marker prefix carrying a JSON result descriptor.
pub const MARKER_RESULT: &str = "###TELECODER_RESULT### ";

/// Session interaction mode.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize, Default,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Fire-and-forget mode: one prompt in, a PR or text result out.
    #[default]
    Task,
    /// Multi-turn interactive mode with a persistent sandbox.
    Chat,
}

/// Session lifecycle state.
///
/// Transitions form a DAG: `pending → running → {complete, error}` for task
/// sessions; chat sessions add `idle` (`pending → idle ⇄ running`). Terminal
/// states are never left.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize, Default,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Status {
    #[default]
    Pending,
    Running,
    Complete,
    Error,
    /// Chat sandbox is alive and waiting for the next message.
    Idle,
}

impl Status {
    /// Terminal states admit no further transitions.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Status::Complete | Status::Error)
    }
}

/// Kind of a session event.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    Status,
    Output,
    Error,
    Step,
    Progress,
    Result,
    Done,
}

/// Outcome of a completed session.
///
/// A tagged union rather than nullable PR fields; the legacy `pr_url` /
/// `pr_number` session columns are kept in sync for API compatibility.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum SessionResult {
    /// No result yet (session still running or failed).
    #[default]
    None,
    /// A pull request was opened.
    Pr { url: String, number: i64 },
    /// A plain-text answer; no branch was pushed.
    Text { content: String },
}

/// A single TeleCoder work unit: one prompt against one repository.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    /// Stable short identifier (8 hex chars). Immutable.
    pub id: String,
    /// Target repository as `owner/name`.
    pub repo: String,
    /// The initial user prompt (empty for chat sessions).
    pub prompt: String,
    /// Interaction mode. Immutable.
    pub mode: Mode,
    /// Per-session coding agent override; empty means auto.
    #[serde(default)]
    pub agent: String,
    /// Current lifecycle state.
    pub status: Status,
    /// Working branch, `telecoder/<id>`.
    pub branch: String,
    /// Legacy PR URL field, mirrored from `result`.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub pr_url: String,
    /// Legacy PR number field, mirrored from `result`.
    #[serde(default, skip_serializing_if = "is_zero")]
    pub pr_number: i64,
    /// Session outcome.
    #[serde(default)]
    pub result: SessionResult,
    /// Container id while a sandbox exists for this session; empty otherwise.
    #[serde(skip)]
    pub container_id: String,
    /// Failure description when status is `error`.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub error: String,
    /// Identifier shared by every session in a follow-up chain; empty when
    /// the session is not part of a chain.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub chain_id: String,
    /// Hops from the chain root: 0 for user-created sessions.
    #[serde(default)]
    pub chain_depth: i64,
    /// RFC 3339 creation timestamp.
    pub created_at: String,
    /// RFC 3339 last-update timestamp.
    pub updated_at: String,
}

fn is_zero(n: &i64) -> bool {
    *n == 0
}

impl Session {
    /// Creates a pending session with the standard branch name and fresh
    /// timestamps. `id` should be a short unique identifier.
    pub fn new(id: impl Into<String>, repo: impl Into<String>, prompt: impl Into<String>, mode: Mode) -> Self {
        let id = id.into();
        let now = now_rfc3339();
        Session {
            branch: format!("telecoder/{id}"),
            id,
            repo: repo.into(),
            prompt: prompt.into(),
            mode,
            agent: String::new(),
            status: Status::Pending,
            pr_url: String::new(),
            pr_number: 0,
            result: SessionResult::None,
            container_id: String::new(),
            error: String::new(),
            chain_id: String::new(),
            chain_depth: 0,
            created_at: now.clone(),
            updated_at: now,
        }
    }
}

/// A single message in a chat session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    /// Auto-increment identifier assigned by the store.
    pub id: i64,
    pub session_id: String,
    /// "user" or "assistant".
    pub role: String,
    pub content: String,
    /// RFC 3339 creation timestamp.
    pub created_at: String,
}

/// A single append-only event in a session's lifecycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    /// Auto-increment identifier assigned by the store; monotonic per session.
    pub id: i64,
    pub session_id: String,
    #[serde(rename = "type")]
    pub kind: EventKind,
    /// Opaque payload; JSON for `progress` and `result` events.
    pub data: String,
    /// RFC 3339 creation timestamp.
    pub created_at: String,
}

impl Event {
    /// Creates an unsaved event (id 0) with a fresh timestamp.
    pub fn new(session_id: impl Into<String>, kind: EventKind, data: impl Into<String>) -> Self {
        Event {
            id: 0,
            session_id: session_id.into(),
            kind,
            data: data.into(),
            created_at: now_rfc3339(),
        }
    }
}

/// An event parsed from a single line of agent stdout, before it is bound
/// to a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentEvent {
    pub kind: EventKind,
    pub data: String,
}

/// A single step in a decomposed task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubTask {
    pub title: String,
    pub description: String,
}

/// State of a sub-task during multi-step execution.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize, Default,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum StepState {
    #[default]
    Pending,
    Running,
    Completed,
    Failed,
}

/// Per-step progress record, persisted as JSON inside `progress` events and
/// as `.telecoder-progress.json` in the sandbox working copy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubTaskStatus {
    pub title: String,
    pub description: String,
    pub status: StepState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub commit_hash: Option<String>,
}

impl SubTaskStatus {
    /// A pending status for the given sub-task.
    pub fn pending(task: &SubTask) -> Self {
        SubTaskStatus {
            title: task.title.clone(),
            description: task.description.clone(),
            status: StepState::Pending,
            commit_hash: None,
        }
    }
}

/// The current UTC time as an RFC 3339 string, the timestamp format used
/// for every persisted row.
pub fn now_rfc3339() -> String {
    chrono::Utc::now().to_rfc3339()
}

/// Truncates `s` to at most `max` bytes, appending "..." when shortened.
/// Cuts on a char boundary.
pub fn truncate(s: &str, max: usize) -> String {
    if s.len() <= max {
        return s.to_string();
    }
    let mut end = max.saturating_sub(3);
    while end > 0 && !s.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &s[..end])
}
