// SPDX-FileCopyrightText: 2026 TeleCoder Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Database connection management with PRAGMA setup, WAL mode, and schema
//! migration.
//!
//! All writes are serialized through tokio-rusqlite's single background
//! thread. Do NOT create additional Connection instances for writes.

use telecoder_core::TelecoderError;
use tokio_rusqlite::Connection;
use tracing::debug;

/// Converts a tokio-rusqlite error into the workspace storage error.
pub(crate) fn storage_err(e: tokio_rusqlite::Error) -> TelecoderError {
    TelecoderError::Storage {
        source: Box::new(e),
    }
}

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS sessions (
        id             TEXT PRIMARY KEY,
        repo           TEXT NOT NULL,
        prompt         TEXT NOT NULL,
        mode           TEXT NOT NULL DEFAULT 'task',
        agent          TEXT NOT NULL DEFAULT '',
        status         TEXT NOT NULL DEFAULT 'pending',
        branch         TEXT NOT NULL DEFAULT '',
        pr_url         TEXT NOT NULL DEFAULT '',
        pr_number      INTEGER NOT NULL DEFAULT 0,
        result_type    TEXT NOT NULL DEFAULT '',
        result_content TEXT NOT NULL DEFAULT '',
        container_id   TEXT NOT NULL DEFAULT '',
        error          TEXT NOT NULL DEFAULT '',
        chain_id       TEXT NOT NULL DEFAULT '',
        chain_depth    INTEGER NOT NULL DEFAULT 0,
        created_at     TEXT NOT NULL,
        updated_at     TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS session_events (
        id         INTEGER PRIMARY KEY AUTOINCREMENT,
        session_id TEXT NOT NULL,
        type       TEXT NOT NULL,
        data       TEXT NOT NULL DEFAULT '',
        created_at TEXT NOT NULL,
        FOREIGN KEY (session_id) REFERENCES sessions(id)
    );

    CREATE INDEX IF NOT EXISTS idx_events_session_id
        ON session_events(session_id);

    CREATE TABLE IF NOT EXISTS messages (
        id         INTEGER PRIMARY KEY AUTOINCREMENT,
        session_id TEXT NOT NULL,
        role       TEXT NOT NULL,
        content    TEXT NOT NULL,
        created_at TEXT NOT NULL,
        FOREIGN KEY (session_id) REFERENCES sessions(id)
    );

    CREATE INDEX IF NOT EXISTS idx_messages_session_id
        ON messages(session_id);
";

/// A handle to the TeleCoder SQLite database.
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Opens (or creates) the database at `path`, enabling WAL mode and
    /// applying the schema.
    pub async fn open(path: &str) -> Result<Self, TelecoderError> {
        let conn = Connection::open(path).await.map_err(storage_err)?;
        Self::setup(conn, path).await
    }

    /// Opens an in-memory database. Test fixture.
    pub async fn open_in_memory() -> Result<Self, TelecoderError> {
        let conn = Connection::open_in_memory().await.map_err(storage_err)?;
        Self::setup(conn, ":memory:").await
    }

    async fn setup(conn: Connection, path: &str) -> Result<Self, TelecoderError> {
        conn.call(|conn| {
            // WAL allows concurrent readers during long writes.
            conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;
            conn.execute_batch(SCHEMA)?;
            Ok(())
        })
        .await
        .map_err(storage_err)?;
        debug!(path, "database opened");
        Ok(Database { conn })
    }

    /// The underlying tokio-rusqlite connection.
    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Checkpoints the WAL and closes the connection.
    pub async fn close(&self) -> Result<(), TelecoderError> {
        self.conn
            .call(|conn| {
                conn.execute_batch("PRAGMA wal_checkpoint(TRUNCATE);")?;
                Ok(())
            })
            .await
            .map_err(storage_err)
    }
}
