// SPDX-FileCopyrightText: 2026 TeleCoder Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock LLM clients for deterministic testing.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use telecoder_core::traits::LlmClient;
use telecoder_core::Result;

/// A mock LLM that pops responses from a FIFO queue. When the queue is
/// empty a default "mock response" text is returned.
pub struct MockLlm {
    responses: Mutex<VecDeque<String>>,
}

impl MockLlm {
    pub fn new() -> Self {
        MockLlm {
            responses: Mutex::new(VecDeque::new()),
        }
    }

    pub fn with_responses(responses: Vec<String>) -> Self {
        MockLlm {
            responses: Mutex::new(VecDeque::from(responses)),
        }
    }

    pub fn push_response(&self, text: impl Into<String>) {
        self.responses.lock().unwrap().push_back(text.into());
    }
}

impl Default for MockLlm {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LlmClient for MockLlm {
    async fn complete(&self, _system: &str, _user: &str) -> Result<String> {
        Ok(self
            .responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| "mock response".to_string()))
    }
}

/// A mock LLM that routes on the system prompt, so one client can serve
/// the decompose, plan, verify, and review stages in engine-level tests.
pub struct RoutedLlm {
    pub decompose: String,
    pub plan: String,
    pub verify: String,
    pub review: String,
}

impl RoutedLlm {
    /// A happy-path router: single sub-task, a short plan, PASSED verify,
    /// APPROVED review.
    pub fn happy() -> Self {
        RoutedLlm {
            decompose: r#"[{"title":"Complete task","description":"do the thing"}]"#.to_string(),
            plan: "1. Modify files\n2. Add tests".to_string(),
            verify: "PASSED: all tests pass".to_string(),
            review: "APPROVED: looks good".to_string(),
        }
    }
}

#[async_trait]
impl LlmClient for RoutedLlm {
    async fn complete(&self, system: &str, _user: &str) -> Result<String> {
        let lower = system.to_lowercase();
        if lower.contains("decomposition") {
            return Ok(self.decompose.clone());
        }
        if lower.contains("reviewing a code change") {
            return Ok(self.review.clone());
        }
        if lower.contains("test-output analyst") {
            return Ok(self.verify.clone());
        }
        if lower.contains("planning a code change") {
            return Ok(self.plan.clone());
        }
        Ok("ok".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn queued_responses_in_order_then_default() {
        let llm = MockLlm::with_responses(vec!["first".into(), "second".into()]);
        assert_eq!(llm.complete("s", "u").await.unwrap(), "first");
        assert_eq!(llm.complete("s", "u").await.unwrap(), "second");
        assert_eq!(llm.complete("s", "u").await.unwrap(), "mock response");
    }

    #[tokio::test]
    async fn routed_llm_picks_by_system_prompt() {
        let llm = RoutedLlm::happy();
        let review = llm
            .complete("You are a senior software engineer reviewing a code change.", "u")
            .await
            .unwrap();
        assert!(review.starts_with("APPROVED"));

        let verify = llm.complete("You are a test-output analyst for ...", "u").await.unwrap();
        assert!(verify.starts_with("PASSED"));
    }
}
