// SPDX-FileCopyrightText: 2026 TeleCoder Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Persistence trait for sessions, messages, and events.

use async_trait::async_trait;

use crate::error::Result;
use crate::types::{Event, Message, Session};

/// Durable persistence for sessions and their messages and events.
///
/// Events are append-only: they are never mutated or deleted, and their ids
/// are strictly increasing within a session. Writes are serialized by the
/// backend; callers need no external locking.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn create_session(&self, session: &Session) -> Result<()>;

    /// Returns the session, or `None` if the id is unknown.
    async fn get_session(&self, id: &str) -> Result<Option<Session>>;

    /// All sessions, newest first.
    async fn list_sessions(&self) -> Result<Vec<Session>>;

    /// Persists the mutable fields of a session and refreshes `updated_at`.
    async fn update_session(&self, session: &Session) -> Result<()>;

    /// Finds the session that owns a PR, for routing webhook comments.
    async fn get_session_by_pr(&self, repo: &str, pr_number: i64) -> Result<Option<Session>>;

    /// Inserts a message and returns its assigned id.
    async fn add_message(&self, message: &Message) -> Result<i64>;

    /// All messages for a session ordered by id.
    async fn get_messages(&self, session_id: &str) -> Result<Vec<Message>>;

    /// Appends an event and returns its assigned id.
    async fn add_event(&self, event: &Event) -> Result<i64>;

    /// Events for a session with `id > after_id`, ascending. Used for SSE
    /// replay and resume.
    async fn get_events(&self, session_id: &str, after_id: i64) -> Result<Vec<Event>>;

    /// Flushes pending writes and releases the backend.
    async fn close(&self) -> Result<()>;
}
