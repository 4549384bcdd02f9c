// SPDX-FileCopyrightText: 2026 TeleCoder Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite implementation of the [`SessionStore`] trait.

use async_trait::async_trait;
use telecoder_core::traits::SessionStore;
use telecoder_core::types::{Event, Message, Session};
use telecoder_core::Result;

use crate::database::Database;
use crate::queries;

/// SQLite-backed session store.
///
/// Wraps a [`Database`] handle and delegates to the typed query modules.
/// All writes funnel through the connection's single background thread, so
/// callers need no external locking.
pub struct SqliteStore {
    db: Database,
}

impl SqliteStore {
    /// Opens (or creates) the store at the given path.
    pub async fn open(path: &str) -> Result<Self> {
        Ok(SqliteStore {
            db: Database::open(path).await?,
        })
    }

    /// An in-memory store. Test fixture.
    pub async fn open_in_memory() -> Result<Self> {
        Ok(SqliteStore {
            db: Database::open_in_memory().await?,
        })
    }
}

#[async_trait]
impl SessionStore for SqliteStore {
    async fn create_session(&self, session: &Session) -> Result<()> {
        queries::sessions::create_session(&self.db, session).await
    }

    async fn get_session(&self, id: &str) -> Result<Option<Session>> {
        queries::sessions::get_session(&self.db, id).await
    }

    async fn list_sessions(&self) -> Result<Vec<Session>> {
        queries::sessions::list_sessions(&self.db).await
    }

    async fn update_session(&self, session: &Session) -> Result<()> {
        queries::sessions::update_session(&self.db, session).await
    }

    async fn get_session_by_pr(&self, repo: &str, pr_number: i64) -> Result<Option<Session>> {
        queries::sessions::get_session_by_pr(&self.db, repo, pr_number).await
    }

    async fn add_message(&self, message: &Message) -> Result<i64> {
        queries::messages::add_message(&self.db, message).await
    }

    async fn get_messages(&self, session_id: &str) -> Result<Vec<Message>> {
        queries::messages::get_messages(&self.db, session_id).await
    }

    async fn add_event(&self, event: &Event) -> Result<i64> {
        queries::events::add_event(&self.db, event).await
    }

    async fn get_events(&self, session_id: &str, after_id: i64) -> Result<Vec<Event>> {
        queries::events::get_events(&self.db, session_id, after_id).await
    }

    async fn close(&self) -> Result<()> {
        self.db.close().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use telecoder_core::types::{EventKind, Mode, Status};

    #[tokio::test]
    async fn full_session_lifecycle_through_trait() {
        let store = SqliteStore::open_in_memory().await.unwrap();

        let mut sess = Session::new("life1234", "owner/repo", "do things", Mode::Task);
        store.create_session(&sess).await.unwrap();

        sess.status = Status::Running;
        store.update_session(&sess).await.unwrap();

        let got = store.get_session("life1234").await.unwrap().unwrap();
        assert_eq!(got.status, Status::Running);

        store
            .add_event(&Event::new("life1234", EventKind::Status, "Starting sandbox..."))
            .await
            .unwrap();
        let events = store.get_events("life1234", 0).await.unwrap();
        assert_eq!(events.len(), 1);

        store.close().await.unwrap();
    }

    #[tokio::test]
    async fn stored_events_count_matches_writes() {
        let store = SqliteStore::open_in_memory().await.unwrap();
        let sess = Session::new("cnt12345", "owner/repo", "p", Mode::Task);
        store.create_session(&sess).await.unwrap();

        let n = 10;
        for i in 0..n {
            store
                .add_event(&Event::new("cnt12345", EventKind::Output, format!("{i}")))
                .await
                .unwrap();
        }
        let events = store.get_events("cnt12345", 0).await.unwrap();
        assert_eq!(events.len(), n);
    }
}
