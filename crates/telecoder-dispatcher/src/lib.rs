// SPDX-FileCopyrightText: 2026 TeleCoder Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! LLM-powered event routing.
//!
//! Instead of keyword matching, a lightweight LLM decides whether an
//! incoming event should spawn a session, get a reply, or be ignored.
//! Unparseable or unknown responses conservatively map to ignore.

pub mod chain;

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use telecoder_core::traits::LlmClient;
use telecoder_core::Result;
use telecoder_pipeline::parse::extract_json_object;
use tracing::debug;

pub use chain::ChainEvaluator;

/// What to do with an incoming event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Spawn,
    Reply,
    #[default]
    Ignore,
}

// Unknown actions from the LLM map to Ignore rather than failing the parse.
impl<'de> Deserialize<'de> for Action {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        Ok(match raw.as_str() {
            "spawn" => Action::Spawn,
            "reply" => Action::Reply,
            _ => Action::Ignore,
        })
    }
}

/// Structured routing decision produced by the dispatcher.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Decision {
    pub action: Action,
    #[serde(default)]
    pub repo: String,
    #[serde(default)]
    pub prompt: String,
    #[serde(default)]
    pub agent: String,
    #[serde(default)]
    pub reply: String,
}

/// Source channel of an event, selecting the system prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum ChannelKind {
    Slack,
    Telegram,
    Github,
    Generic,
}

/// Routes incoming events using an LLM.
pub struct Dispatcher {
    llm: Arc<dyn LlmClient>,
    prompts: HashMap<ChannelKind, String>,
}

impl Dispatcher {
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        Dispatcher {
            llm,
            prompts: default_prompts(),
        }
    }

    /// Overrides the system prompt for a specific channel.
    pub fn set_prompt(&mut self, channel: ChannelKind, prompt: String) {
        self.prompts.insert(channel, prompt);
    }

    /// Evaluates an incoming event and returns a routing decision.
    ///
    /// An LLM failure propagates; an unparseable response maps to
    /// [`Action::Ignore`].
    pub async fn dispatch(&self, channel: ChannelKind, event: &str) -> Result<Decision> {
        let prompt = self
            .prompts
            .get(&channel)
            .or_else(|| self.prompts.get(&ChannelKind::Generic))
            .expect("generic prompt always present");

        let response = self.llm.complete(prompt, event).await?;

        match parse_decision(&response) {
            Some(decision) => Ok(decision),
            None => {
                debug!(%channel, "unparseable dispatcher response, ignoring");
                Ok(Decision::default())
            }
        }
    }
}

fn parse_decision(response: &str) -> Option<Decision> {
    let json = extract_json_object(response)?;
    serde_json::from_str(json).ok()
}

fn default_prompts() -> HashMap<ChannelKind, String> {
    let base = |source: &str| {
        format!(
            r#"You are a routing engine for TeleCoder, a background coding agent.

You receive events from {source}. For each event, decide:
- "spawn": create a coding session (requires repo and prompt)
- "reply": respond directly without a session (provide reply text)
- "ignore": do nothing

Return ONLY a JSON object:
{{"action": "spawn"|"reply"|"ignore", "repo": "owner/repo", "prompt": "task description", "agent": "auto", "reply": "text"}}

Rules:
- If the event is a clear coding task (bug fix, feature, refactor), use "spawn"
- If the event is a question that can be answered without code, use "reply"
- If the event is irrelevant (greetings, off-topic, spam), use "ignore"
- For "spawn", repo and prompt are required
- For "reply", reply is required
- agent is optional (default "auto"); set to "pi", "opencode", "claude-code", or "codex" if specified"#
        )
    };

    HashMap::from([
        (ChannelKind::Slack, base("Slack messages")),
        (ChannelKind::Telegram, base("Telegram messages")),
        (ChannelKind::Github, base("GitHub issues and comments")),
        (ChannelKind::Generic, base("an external source")),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    struct FakeLlm {
        response: String,
    }

    #[async_trait]
    impl LlmClient for FakeLlm {
        async fn complete(&self, _system: &str, _user: &str) -> Result<String> {
            Ok(self.response.clone())
        }
    }

    fn dispatcher(response: &str) -> Dispatcher {
        Dispatcher::new(Arc::new(FakeLlm {
            response: response.to_string(),
        }))
    }

    #[tokio::test]
    async fn spawn_decision_parses() {
        let d = dispatcher(
            r#"{"action":"spawn","repo":"acme/api","prompt":"fix the login bug","agent":"auto"}"#,
        );
        let decision = d.dispatch(ChannelKind::Slack, "please fix login").await.unwrap();
        assert_eq!(decision.action, Action::Spawn);
        assert_eq!(decision.repo, "acme/api");
        assert_eq!(decision.prompt, "fix the login bug");
    }

    #[tokio::test]
    async fn fenced_response_parses() {
        let d = dispatcher("```json\n{\"action\":\"reply\",\"reply\":\"hello\"}\n```");
        let decision = d.dispatch(ChannelKind::Telegram, "hi").await.unwrap();
        assert_eq!(decision.action, Action::Reply);
        assert_eq!(decision.reply, "hello");
    }

    #[tokio::test]
    async fn unknown_action_maps_to_ignore() {
        let d = dispatcher(r#"{"action":"launch","repo":"a/b"}"#);
        let decision = d.dispatch(ChannelKind::Github, "event").await.unwrap();
        assert_eq!(decision.action, Action::Ignore);
    }

    #[tokio::test]
    async fn unparseable_response_maps_to_ignore() {
        let d = dispatcher("I can't decide, sorry");
        let decision = d.dispatch(ChannelKind::Generic, "event").await.unwrap();
        assert_eq!(decision.action, Action::Ignore);
    }

    #[tokio::test]
    async fn prose_around_json_is_tolerated() {
        let d = dispatcher("Sure! Here's my decision:\n{\"action\":\"ignore\"}\nLet me know.");
        let decision = d.dispatch(ChannelKind::Generic, "event").await.unwrap();
        assert_eq!(decision.action, Action::Ignore);
    }
}
