// SPDX-FileCopyrightText: 2026 TeleCoder Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Chain evaluation: should a completed session spawn a follow-up?

use telecoder_core::types::{truncate, Session, SessionResult};
use telecoder_core::{Result, TelecoderError};

use crate::{Action, ChannelKind, Decision, Dispatcher};

/// Decides whether a completed session should trigger a follow-up session.
///
/// Refuses outright once a session sits at the maximum chain depth, so a
/// runaway agent cannot spawn unbounded work.
pub struct ChainEvaluator {
    dispatcher: Dispatcher,
    max_depth: u32,
}

impl ChainEvaluator {
    pub fn new(dispatcher: Dispatcher, max_depth: u32) -> Self {
        ChainEvaluator {
            dispatcher,
            max_depth,
        }
    }

    /// The configured maximum chain depth.
    pub fn max_depth(&self) -> u32 {
        self.max_depth
    }

    /// Evaluates a completed session. Returns a spawn decision, `None` when
    /// no follow-up is wanted, or [`TelecoderError::ChainLimit`] when the
    /// session is already at the depth limit (no child is created).
    pub async fn evaluate(&self, session: &Session) -> Result<Option<Decision>> {
        if session.chain_depth >= i64::from(self.max_depth) {
            return Err(TelecoderError::ChainLimit {
                max: self.max_depth,
            });
        }

        let event = format_completion_event(session);
        let mut decision = self.dispatcher.dispatch(ChannelKind::Generic, &event).await?;

        if decision.action != Action::Spawn {
            return Ok(None);
        }
        if decision.repo.is_empty() {
            decision.repo = session.repo.clone();
        }
        Ok(Some(decision))
    }
}

fn format_completion_event(session: &Session) -> String {
    match &session.result {
        SessionResult::Pr { url, .. } => format!(
            "Session {} completed with a PR: {}\nRepo: {}\nPrompt: {}",
            session.id, url, session.repo, session.prompt
        ),
        SessionResult::Text { content } => format!(
            "Session {} completed with text result.\nRepo: {}\nPrompt: {}\nResult: {}",
            session.id,
            session.repo,
            session.prompt,
            truncate(content, 500)
        ),
        SessionResult::None => format!(
            "Session {} completed.\nRepo: {}\nPrompt: {}",
            session.id, session.repo, session.prompt
        ),
    }
}
