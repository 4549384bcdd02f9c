// SPDX-FileCopyrightText: 2026 TeleCoder Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Session CRUD operations.

use std::str::FromStr;

use rusqlite::{params, Row};
use telecoder_core::types::{now_rfc3339, Mode, Session, SessionResult, Status};
use telecoder_core::TelecoderError;

use crate::database::{storage_err, Database};

const SESSION_COLUMNS: &str = "id, repo, prompt, mode, agent, status, branch, pr_url, pr_number, \
     result_type, result_content, container_id, error, chain_id, chain_depth, \
     created_at, updated_at";

/// Insert a new session.
pub async fn create_session(db: &Database, session: &Session) -> Result<(), TelecoderError> {
    let s = session.clone();
    let (result_type, result_content) = result_columns(&s.result);
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO sessions (id, repo, prompt, mode, agent, status, branch, pr_url, \
                 pr_number, result_type, result_content, container_id, error, chain_id, \
                 chain_depth, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17)",
                params![
                    s.id,
                    s.repo,
                    s.prompt,
                    s.mode.to_string(),
                    s.agent,
                    s.status.to_string(),
                    s.branch,
                    s.pr_url,
                    s.pr_number,
                    result_type,
                    result_content,
                    s.container_id,
                    s.error,
                    s.chain_id,
                    s.chain_depth,
                    s.created_at,
                    s.updated_at,
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(storage_err)
}

/// Get a session by id.
pub async fn get_session(db: &Database, id: &str) -> Result<Option<Session>, TelecoderError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {SESSION_COLUMNS} FROM sessions WHERE id = ?1"
            ))?;
            let result = stmt.query_row(params![id], row_to_session);
            match result {
                Ok(session) => Ok(Some(session)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e.into()),
            }
        })
        .await
        .map_err(storage_err)
}

/// All sessions, newest first.
pub async fn list_sessions(db: &Database) -> Result<Vec<Session>, TelecoderError> {
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {SESSION_COLUMNS} FROM sessions ORDER BY created_at DESC, id DESC"
            ))?;
            let sessions = stmt
                .query_map([], row_to_session)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(sessions)
        })
        .await
        .map_err(storage_err)
}

/// Update the mutable fields of a session and refresh `updated_at`.
pub async fn update_session(db: &Database, session: &Session) -> Result<(), TelecoderError> {
    let s = session.clone();
    let (result_type, result_content) = result_columns(&s.result);
    let updated_at = now_rfc3339();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE sessions SET
                    status = ?1, branch = ?2, pr_url = ?3, pr_number = ?4,
                    result_type = ?5, result_content = ?6, container_id = ?7,
                    error = ?8, updated_at = ?9
                 WHERE id = ?10",
                params![
                    s.status.to_string(),
                    s.branch,
                    s.pr_url,
                    s.pr_number,
                    result_type,
                    result_content,
                    s.container_id,
                    s.error,
                    updated_at,
                    s.id,
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(storage_err)
}

/// Find the newest session that owns the given PR. Used to route webhook
/// comments back to the originating session.
pub async fn get_session_by_pr(
    db: &Database,
    repo: &str,
    pr_number: i64,
) -> Result<Option<Session>, TelecoderError> {
    let repo = repo.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {SESSION_COLUMNS} FROM sessions
                 WHERE repo = ?1 AND pr_number = ?2
                 ORDER BY created_at DESC LIMIT 1"
            ))?;
            let result = stmt.query_row(params![repo, pr_number], row_to_session);
            match result {
                Ok(session) => Ok(Some(session)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e.into()),
            }
        })
        .await
        .map_err(storage_err)
}

fn result_columns(result: &SessionResult) -> (String, String) {
    match result {
        SessionResult::None => (String::new(), String::new()),
        SessionResult::Pr { .. } => ("pr".to_string(), String::new()),
        SessionResult::Text { content } => ("text".to_string(), content.clone()),
    }
}

fn row_to_session(row: &Row<'_>) -> Result<Session, rusqlite::Error> {
    let mode: String = row.get(3)?;
    let status: String = row.get(5)?;
    let pr_url: String = row.get(7)?;
    let pr_number: i64 = row.get(8)?;
    let result_type: String = row.get(9)?;
    let result_content: String = row.get(10)?;

    let result = match result_type.as_str() {
        "pr" => SessionResult::Pr {
            url: pr_url.clone(),
            number: pr_number,
        },
        "text" => SessionResult::Text {
            content: result_content,
        },
        _ => SessionResult::None,
    };

    Ok(Session {
        id: row.get(0)?,
        repo: row.get(1)?,
        prompt: row.get(2)?,
        mode: Mode::from_str(&mode).unwrap_or_default(),
        agent: row.get(4)?,
        status: Status::from_str(&status).unwrap_or_default(),
        branch: row.get(6)?,
        pr_url,
        pr_number,
        result,
        container_id: row.get(11)?,
        error: row.get(12)?,
        chain_id: row.get(13)?,
        chain_depth: row.get(14)?,
        created_at: row.get(15)?,
        updated_at: row.get(16)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use telecoder_core::types::Mode;

    async fn setup_db() -> Database {
        Database::open_in_memory().await.unwrap()
    }

    fn make_session(id: &str) -> Session {
        Session::new(id, "owner/repo", "add tests", Mode::Task)
    }

    #[tokio::test]
    async fn create_and_get_round_trips() {
        let db = setup_db().await;
        let sess = make_session("abc12345");
        create_session(&db, &sess).await.unwrap();

        let got = get_session(&db, "abc12345").await.unwrap().unwrap();
        assert_eq!(got.id, "abc12345");
        assert_eq!(got.repo, "owner/repo");
        assert_eq!(got.status, Status::Pending);
        assert_eq!(got.branch, "telecoder/abc12345");
        assert_eq!(got.result, SessionResult::None);
    }

    #[tokio::test]
    async fn get_unknown_session_returns_none() {
        let db = setup_db().await;
        assert!(get_session(&db, "nope").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn update_persists_status_and_result() {
        let db = setup_db().await;
        let mut sess = make_session("upd11111");
        create_session(&db, &sess).await.unwrap();

        sess.status = Status::Complete;
        sess.pr_url = "https://github.com/owner/repo/pull/7".into();
        sess.pr_number = 7;
        sess.result = SessionResult::Pr {
            url: sess.pr_url.clone(),
            number: 7,
        };
        update_session(&db, &sess).await.unwrap();

        let got = get_session(&db, "upd11111").await.unwrap().unwrap();
        assert_eq!(got.status, Status::Complete);
        assert_eq!(got.pr_number, 7);
        assert_eq!(
            got.result,
            SessionResult::Pr {
                url: "https://github.com/owner/repo/pull/7".into(),
                number: 7
            }
        );
        assert!(got.updated_at >= got.created_at);
    }

    #[tokio::test]
    async fn text_result_round_trips() {
        let db = setup_db().await;
        let mut sess = make_session("txt11111");
        create_session(&db, &sess).await.unwrap();

        sess.status = Status::Complete;
        sess.result = SessionResult::Text {
            content: "This project is written in Go.".into(),
        };
        update_session(&db, &sess).await.unwrap();

        let got = get_session(&db, "txt11111").await.unwrap().unwrap();
        assert_eq!(
            got.result,
            SessionResult::Text {
                content: "This project is written in Go.".into()
            }
        );
        assert!(got.pr_url.is_empty());
    }

    #[tokio::test]
    async fn list_returns_newest_first() {
        let db = setup_db().await;
        let mut first = make_session("s1");
        first.created_at = "2026-01-01T00:00:00+00:00".into();
        first.updated_at = first.created_at.clone();
        let mut second = make_session("s2");
        second.created_at = "2026-01-02T00:00:00+00:00".into();
        second.updated_at = second.created_at.clone();

        create_session(&db, &first).await.unwrap();
        create_session(&db, &second).await.unwrap();

        let all = list_sessions(&db).await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].id, "s2");
        assert_eq!(all[1].id, "s1");
    }

    #[tokio::test]
    async fn get_session_by_pr_routes_to_owner() {
        let db = setup_db().await;
        let mut sess = make_session("pr111111");
        sess.pr_url = "https://github.com/owner/repo/pull/42".into();
        sess.pr_number = 42;
        create_session(&db, &sess).await.unwrap();

        let found = get_session_by_pr(&db, "owner/repo", 42).await.unwrap();
        assert_eq!(found.unwrap().id, "pr111111");

        let missing = get_session_by_pr(&db, "owner/repo", 99).await.unwrap();
        assert!(missing.is_none());

        let wrong_repo = get_session_by_pr(&db, "other/repo", 42).await.unwrap();
        assert!(wrong_repo.is_none());
    }

    #[tokio::test]
    async fn chain_fields_round_trip() {
        let db = setup_db().await;
        let mut sess = make_session("ch111111");
        sess.chain_id = "root1234".into();
        sess.chain_depth = 2;
        create_session(&db, &sess).await.unwrap();

        let got = get_session(&db, "ch111111").await.unwrap().unwrap();
        assert_eq!(got.chain_id, "root1234");
        assert_eq!(got.chain_depth, 2);
    }
}
