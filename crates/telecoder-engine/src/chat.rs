// SPDX-FileCopyrightText: 2026 TeleCoder Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Chat-session workflow: persistent sandbox, serialized messages, PR
//! creation from the accumulated changes, and idle reaping.
//!
//! A chat session accepts messages only while idle, so agent runs in the
//! same container never overlap.

use std::sync::Arc;
use std::time::Duration;

use telecoder_core::traits::{PrOptions, StartOptions};
use telecoder_core::types::{
    now_rfc3339, truncate, EventKind, Message, Mode, Session, SessionResult, Status,
};
use telecoder_core::{Result, TelecoderError};
use tracing::{info, warn};

use crate::{short_id, Engine};

impl Engine {
    /// Creates a chat-mode session and launches its initialisation
    /// (persistent sandbox + repo setup) in the background.
    pub async fn create_chat_session(self: &Arc<Self>, repo: &str) -> Result<Session> {
        telecoder_core::traits::git::split_repo(repo)?;

        let sess = Session::new(short_id(), repo, "", Mode::Chat);
        self.store.create_session(&sess).await?;

        let engine = self.clone();
        let session_id = sess.id.clone();
        self.spawn_worker(async move {
            engine.init_chat_session(session_id).await;
        });

        Ok(sess)
    }

    async fn init_chat_session(self: Arc<Self>, session_id: String) {
        let mut sess = match self.store.get_session(&session_id).await {
            Ok(Some(sess)) => sess,
            _ => {
                warn!(session_id, "chat session not found during init");
                return;
            }
        };

        self.emit_event(&sess.id, EventKind::Status, "Starting sandbox...").await;

        let container_id = match self
            .sandbox
            .start(&StartOptions {
                session_id: sess.id.clone(),
                repo: sess.repo.clone(),
                prompt: String::new(),
                persistent: true,
                branch: sess.branch.clone(),
                image: self.config.image.clone(),
                env: self.build_sandbox_env(&sess.agent),
                network: self.config.network.clone(),
            })
            .await
        {
            Ok(id) => id,
            Err(e) => {
                self.fail_session(&mut sess, &format!("failed to start sandbox: {e}"))
                    .await;
                return;
            }
        };

        sess.container_id = container_id.clone();
        let _ = self.store.update_session(&sess).await;

        self.emit_event(&sess.id, EventKind::Status, "Setting up repository...")
            .await;
        if let Err(e) = self.run_setup(&sess, &container_id).await {
            self.fail_session(&mut sess, &format!("failed to run setup: {e}")).await;
            let _ = self.sandbox.stop(&container_id).await;
            return;
        }

        sess.status = Status::Idle;
        let _ = self.store.update_session(&sess).await;
        self.emit_event(
            &sess.id,
            EventKind::Status,
            "Ready — send a message to start coding",
        )
        .await;
    }

    /// Appends a user message to an idle chat session and launches an
    /// agent run for it. Rejected while the session is not idle, which
    /// serializes agent runs per container.
    pub async fn send_chat_message(
        self: &Arc<Self>,
        session_id: &str,
        content: &str,
    ) -> Result<Message> {
        let sess = self
            .store
            .get_session(session_id)
            .await?
            .ok_or_else(|| TelecoderError::Validation("session not found".into()))?;

        if sess.mode != Mode::Chat {
            return Err(TelecoderError::Validation(format!(
                "session {session_id} is not a chat session"
            )));
        }
        if sess.status != Status::Idle {
            return Err(TelecoderError::Validation(format!(
                "session is {}, not idle (wait for current operation to finish)",
                sess.status
            )));
        }
        if sess.container_id.is_empty() {
            return Err(TelecoderError::Validation("session has no container".into()));
        }

        let messages = self.store.get_messages(session_id).await.unwrap_or_default();
        let user_count = messages.iter().filter(|m| m.role == "user").count();
        if user_count >= self.config.chat_max_messages {
            return Err(TelecoderError::Validation(format!(
                "message limit reached ({} messages)",
                self.config.chat_max_messages
            )));
        }

        let mut message = Message {
            id: 0,
            session_id: session_id.to_string(),
            role: "user".to_string(),
            content: content.to_string(),
            created_at: now_rfc3339(),
        };
        message.id = self.store.add_message(&message).await?;

        let engine = self.clone();
        let session_id = session_id.to_string();
        let content = content.to_string();
        self.spawn_worker(async move {
            engine.run_chat_message(session_id, content).await;
        });

        Ok(message)
    }

    async fn run_chat_message(self: Arc<Self>, session_id: String, content: String) {
        let mut sess = match self.store.get_session(&session_id).await {
            Ok(Some(sess)) => sess,
            _ => {
                warn!(session_id, "chat session not found while running message");
                return;
            }
        };

        sess.status = Status::Running;
        let _ = self.store.update_session(&sess).await;
        self.emit_event(&sess.id, EventKind::Status, "Running agent...").await;

        let container_id = sess.container_id.clone();
        let output_lines = match self.run_agent_in_container(&sess, &container_id, &content).await {
            Ok(lines) => lines,
            Err(e) => {
                warn!(session_id = %sess.id, error = %e, "chat message exec failed");
                self.emit_event(
                    &sess.id,
                    EventKind::Error,
                    &format!("Agent failed to start: {e}"),
                )
                .await;
                sess.status = Status::Idle;
                let _ = self.store.update_session(&sess).await;
                return;
            }
        };

        let mut assistant_content = output_lines.join("\n");
        if assistant_content.is_empty() {
            assistant_content = "(no output)".to_string();
        }
        let assistant = Message {
            id: 0,
            session_id: sess.id.clone(),
            role: "assistant".to_string(),
            content: assistant_content,
            created_at: now_rfc3339(),
        };
        if let Err(e) = self.store.add_message(&assistant).await {
            warn!(session_id = %sess.id, error = %e, "storing assistant message failed");
        }

        sess.status = Status::Idle;
        let _ = self.store.update_session(&sess).await;
        self.emit_event(&sess.id, EventKind::Status, "Ready").await;
    }

    /// Commits and pushes all changes in an idle chat session and opens a
    /// PR whose body quotes every user message. Marks the session
    /// complete.
    pub async fn create_pr_from_chat(&self, session_id: &str) -> Result<(String, i64)> {
        let mut sess = self
            .store
            .get_session(session_id)
            .await?
            .ok_or_else(|| TelecoderError::Validation("session not found".into()))?;

        if sess.mode != Mode::Chat {
            return Err(TelecoderError::Validation(format!(
                "session {session_id} is not a chat session"
            )));
        }
        if sess.status != Status::Idle {
            return Err(TelecoderError::Validation(format!(
                "session is {}, wait for it to be idle",
                sess.status
            )));
        }
        if sess.container_id.is_empty() {
            return Err(TelecoderError::Validation("session has no container".into()));
        }

        self.emit_event(&sess.id, EventKind::Status, "Committing and pushing changes...")
            .await;

        let messages = self.store.get_messages(session_id).await.unwrap_or_default();
        let commit_desc = messages
            .iter()
            .find(|m| m.role == "user")
            .map(|m| m.content.clone())
            .unwrap_or_else(|| "chat session changes".to_string());

        self.sandbox
            .commit_and_push(&sess.container_id, &commit_desc, &sess.branch)
            .await
            .map_err(|e| TelecoderError::runtime(format!("commit/push failed: {e}")))?;

        self.emit_event(&sess.id, EventKind::Status, "Creating pull request...")
            .await;

        let default_branch = self
            .git
            .get_default_branch(&sess.repo)
            .await
            .unwrap_or_else(|_| "main".to_string());

        let pr_title = format!("telecoder: {}", truncate(&commit_desc, 72));
        let mut pr_body = format!("## TeleCoder Chat Session `{}`\n\n", sess.id);
        for message in messages.iter().filter(|m| m.role == "user") {
            pr_body.push_str(&format!("> **You:** {}\n\n", message.content));
        }
        pr_body.push_str("---\n*Created by [TeleCoder](https://github.com/telecoder/telecoder-rs)*");

        let (pr_url, pr_number) = self
            .git
            .create_pr(&PrOptions {
                repo: sess.repo.clone(),
                branch: sess.branch.clone(),
                base: default_branch,
                title: pr_title,
                body: pr_body,
            })
            .await
            .map_err(|e| TelecoderError::git(format!("failed to create PR: {e}")))?;

        sess.pr_url = pr_url.clone();
        sess.pr_number = pr_number;
        sess.status = Status::Complete;
        sess.result = SessionResult::Pr {
            url: pr_url.clone(),
            number: pr_number,
        };
        self.store.update_session(&sess).await?;

        self.emit_event(&sess.id, EventKind::Done, &pr_url).await;
        info!(session_id = %sess.id, pr = %pr_url, "chat session complete");

        Ok((pr_url, pr_number))
    }

    /// Background ticker that stops chat sandboxes idle for longer than
    /// the configured timeout.
    pub(crate) async fn reap_idle_chat_sessions(self: Arc<Self>) {
        let mut ticker = tokio::time::interval(Duration::from_secs(60));
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // The first tick fires immediately; skip it.
        ticker.tick().await;

        let cancel = self.cancelled();
        loop {
            tokio::select! {
                _ = cancel.cancelled() => return,
                _ = ticker.tick() => {}
            }
            self.reap_tick().await;
        }
    }

    /// One reaper pass over all sessions.
    pub async fn reap_tick(&self) {
        let sessions = match self.store.list_sessions().await {
            Ok(sessions) => sessions,
            Err(e) => {
                warn!(error = %e, "reaper: list sessions failed");
                return;
            }
        };

        for mut sess in sessions {
            if sess.mode != Mode::Chat || sess.status != Status::Idle {
                continue;
            }
            if !idle_longer_than(&sess.updated_at, self.config.chat_idle_timeout) {
                continue;
            }

            info!(session_id = %sess.id, "reaping idle chat session");
            if !sess.container_id.is_empty() {
                if let Err(e) = self.sandbox.stop(&sess.container_id).await {
                    warn!(session_id = %sess.id, error = %e, "stopping idle container failed");
                }
            }
            sess.status = Status::Error;
            sess.error = "session timed out due to inactivity".to_string();
            let _ = self.store.update_session(&sess).await;
            self.emit_event(&sess.id, EventKind::Status, "Session stopped (idle timeout)")
                .await;
        }
    }
}

/// Whether `updated_at` (RFC 3339) lies further in the past than `timeout`.
fn idle_longer_than(updated_at: &str, timeout: Duration) -> bool {
    let Ok(updated) = chrono::DateTime::parse_from_rfc3339(updated_at) else {
        return false;
    };
    let elapsed = chrono::Utc::now().signed_duration_since(updated);
    elapsed.to_std().map(|e| e > timeout).unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn idle_longer_than_compares_against_now() {
        let past = (chrono::Utc::now() - chrono::Duration::minutes(45)).to_rfc3339();
        assert!(idle_longer_than(&past, Duration::from_secs(30 * 60)));

        let recent = (chrono::Utc::now() - chrono::Duration::minutes(5)).to_rfc3339();
        assert!(!idle_longer_than(&recent, Duration::from_secs(30 * 60)));
    }

    #[test]
    fn unparseable_timestamp_is_not_reaped() {
        assert!(!idle_longer_than("not a timestamp", Duration::from_secs(60)));
    }
}
