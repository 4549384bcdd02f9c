// SPDX-FileCopyrightText: 2026 TeleCoder Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! [`LlmClient`] implementation for the Anthropic Messages API.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue};
use serde::{Deserialize, Serialize};
use telecoder_core::traits::LlmClient;
use telecoder_core::{Result, TelecoderError};
use tracing::debug;

const API_BASE_URL: &str = "https://api.anthropic.com/v1/messages";
const DEFAULT_MODEL: &str = "claude-sonnet-4-20250514";
const MAX_TOKENS: u32 = 4096;

/// Anthropic Messages API client.
#[derive(Debug, Clone)]
pub struct AnthropicClient {
    client: reqwest::Client,
    model: String,
    base_url: String,
}

#[derive(Debug, Serialize)]
struct MessageRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    system: &'a str,
    messages: Vec<ApiMessage<'a>>,
}

#[derive(Debug, Serialize)]
struct ApiMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct MessageResponse {
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: String,
}

impl AnthropicClient {
    /// Creates a client. `model` empty uses the default model. LLM calls
    /// are capped at 2 minutes.
    pub fn new(api_key: &str, model: &str) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-api-key",
            HeaderValue::from_str(api_key)
                .map_err(|e| TelecoderError::provider(format!("invalid API key header: {e}")))?,
        );
        headers.insert("anthropic-version", HeaderValue::from_static("2023-06-01"));
        headers.insert("content-type", HeaderValue::from_static("application/json"));

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(120))
            .build()
            .map_err(|e| TelecoderError::Provider {
                message: format!("failed to build HTTP client: {e}"),
                source: Some(Box::new(e)),
            })?;

        Ok(AnthropicClient {
            client,
            model: if model.is_empty() {
                DEFAULT_MODEL.to_string()
            } else {
                model.to_string()
            },
            base_url: API_BASE_URL.to_string(),
        })
    }

    /// Overrides the base URL (for testing with wiremock).
    pub fn with_base_url(mut self, url: String) -> Self {
        self.base_url = url;
        self
    }
}

#[async_trait]
impl LlmClient for AnthropicClient {
    async fn complete(&self, system: &str, user: &str) -> Result<String> {
        let request = MessageRequest {
            model: &self.model,
            max_tokens: MAX_TOKENS,
            system,
            messages: vec![ApiMessage {
                role: "user",
                content: user,
            }],
        };

        let response = self
            .client
            .post(&self.base_url)
            .json(&request)
            .send()
            .await
            .map_err(|e| TelecoderError::Provider {
                message: format!("anthropic request failed: {e}"),
                source: Some(Box::new(e)),
            })?;

        let status = response.status();
        let body = response.text().await.map_err(|e| TelecoderError::Provider {
            message: format!("reading anthropic response: {e}"),
            source: Some(Box::new(e)),
        })?;

        if !status.is_success() {
            return Err(TelecoderError::provider(format!(
                "anthropic API error ({status}): {body}"
            )));
        }

        debug!(model = %self.model, "anthropic completion received");

        let parsed: MessageResponse =
            serde_json::from_str(&body).map_err(|e| TelecoderError::Provider {
                message: format!("parsing anthropic response: {e}"),
                source: Some(Box::new(e)),
            })?;

        parsed
            .content
            .into_iter()
            .find(|block| block.kind == "text")
            .map(|block| block.text)
            .ok_or_else(|| TelecoderError::provider("no text content in response"))
    }
}
