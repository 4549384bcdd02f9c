// SPDX-FileCopyrightText: 2026 TeleCoder Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Append-only session event log.

use std::str::FromStr;

use rusqlite::params;
use telecoder_core::types::{Event, EventKind};
use telecoder_core::TelecoderError;

use crate::database::{storage_err, Database};

/// Append an event and return its assigned id. Events are never mutated
/// or deleted.
pub async fn add_event(db: &Database, event: &Event) -> Result<i64, TelecoderError> {
    let e = event.clone();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO session_events (session_id, type, data, created_at)
                 VALUES (?1, ?2, ?3, ?4)",
                params![e.session_id, e.kind.to_string(), e.data, e.created_at],
            )?;
            Ok(conn.last_insert_rowid())
        })
        .await
        .map_err(storage_err)
}

/// Events for a session with `id > after_id`, ascending. `after_id = 0`
/// replays the full history.
pub async fn get_events(
    db: &Database,
    session_id: &str,
    after_id: i64,
) -> Result<Vec<Event>, TelecoderError> {
    let session_id = session_id.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, session_id, type, data, created_at
                 FROM session_events
                 WHERE session_id = ?1 AND id > ?2
                 ORDER BY id ASC",
            )?;
            let events = stmt
                .query_map(params![session_id, after_id], |row| {
                    let kind: String = row.get(2)?;
                    Ok(Event {
                        id: row.get(0)?,
                        session_id: row.get(1)?,
                        kind: EventKind::from_str(&kind).unwrap_or(EventKind::Output),
                        data: row.get(3)?,
                        created_at: row.get(4)?,
                    })
                })?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(events)
        })
        .await
        .map_err(storage_err)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn events_replay_in_publish_order() {
        let db = Database::open_in_memory().await.unwrap();

        for i in 0..5 {
            add_event(&db, &Event::new("s1", EventKind::Output, format!("line {i}")))
                .await
                .unwrap();
        }

        let events = get_events(&db, "s1", 0).await.unwrap();
        assert_eq!(events.len(), 5);
        for (i, e) in events.iter().enumerate() {
            assert_eq!(e.data, format!("line {i}"));
        }
        // Ids are strictly increasing.
        for pair in events.windows(2) {
            assert!(pair[1].id > pair[0].id);
        }
    }

    #[tokio::test]
    async fn after_id_resumes_past_seen_events() {
        let db = Database::open_in_memory().await.unwrap();

        let first = add_event(&db, &Event::new("s1", EventKind::Status, "one"))
            .await
            .unwrap();
        add_event(&db, &Event::new("s1", EventKind::Status, "two"))
            .await
            .unwrap();

        let tail = get_events(&db, "s1", first).await.unwrap();
        assert_eq!(tail.len(), 1);
        assert_eq!(tail[0].data, "two");
    }

    #[tokio::test]
    async fn events_are_scoped_to_their_session() {
        let db = Database::open_in_memory().await.unwrap();
        add_event(&db, &Event::new("s1", EventKind::Status, "mine"))
            .await
            .unwrap();
        add_event(&db, &Event::new("s2", EventKind::Status, "other"))
            .await
            .unwrap();

        let events = get_events(&db, "s1", 0).await.unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].data, "mine");
    }

    #[tokio::test]
    async fn kind_round_trips_through_storage() {
        let db = Database::open_in_memory().await.unwrap();
        for kind in [
            EventKind::Status,
            EventKind::Progress,
            EventKind::Result,
            EventKind::Done,
        ] {
            add_event(&db, &Event::new("s1", kind, "payload")).await.unwrap();
        }
        let events = get_events(&db, "s1", 0).await.unwrap();
        assert_eq!(events[0].kind, EventKind::Status);
        assert_eq!(events[1].kind, EventKind::Progress);
        assert_eq!(events[2].kind, EventKind::Result);
        assert_eq!(events[3].kind, EventKind::Done);
    }
}
