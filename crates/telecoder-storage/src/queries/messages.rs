// SPDX-FileCopyrightText: 2026 TeleCoder Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Chat message persistence.

use rusqlite::params;
use telecoder_core::types::Message;
use telecoder_core::TelecoderError;

use crate::database::{storage_err, Database};

/// Insert a message and return its assigned id.
pub async fn add_message(db: &Database, message: &Message) -> Result<i64, TelecoderError> {
    let m = message.clone();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO messages (session_id, role, content, created_at)
                 VALUES (?1, ?2, ?3, ?4)",
                params![m.session_id, m.role, m.content, m.created_at],
            )?;
            Ok(conn.last_insert_rowid())
        })
        .await
        .map_err(storage_err)
}

/// All messages for a session ordered by id.
pub async fn get_messages(db: &Database, session_id: &str) -> Result<Vec<Message>, TelecoderError> {
    let session_id = session_id.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, session_id, role, content, created_at
                 FROM messages WHERE session_id = ?1 ORDER BY id ASC",
            )?;
            let messages = stmt
                .query_map(params![session_id], |row| {
                    Ok(Message {
                        id: row.get(0)?,
                        session_id: row.get(1)?,
                        role: row.get(2)?,
                        content: row.get(3)?,
                        created_at: row.get(4)?,
                    })
                })?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(messages)
        })
        .await
        .map_err(storage_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use telecoder_core::types::now_rfc3339;

    fn make_message(session_id: &str, role: &str, content: &str) -> Message {
        Message {
            id: 0,
            session_id: session_id.to_string(),
            role: role.to_string(),
            content: content.to_string(),
            created_at: now_rfc3339(),
        }
    }

    #[tokio::test]
    async fn messages_are_ordered_by_id() {
        let db = Database::open_in_memory().await.unwrap();

        let first = add_message(&db, &make_message("s1", "user", "add /health"))
            .await
            .unwrap();
        let second = add_message(&db, &make_message("s1", "assistant", "done"))
            .await
            .unwrap();
        assert!(second > first);

        let messages = get_messages(&db, "s1").await.unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, "user");
        assert_eq!(messages[1].role, "assistant");
    }

    #[tokio::test]
    async fn messages_are_scoped_to_their_session() {
        let db = Database::open_in_memory().await.unwrap();
        add_message(&db, &make_message("s1", "user", "one"))
            .await
            .unwrap();
        add_message(&db, &make_message("s2", "user", "two"))
            .await
            .unwrap();

        let s1 = get_messages(&db, "s1").await.unwrap();
        assert_eq!(s1.len(), 1);
        assert_eq!(s1[0].content, "one");
    }
}
