// SPDX-FileCopyrightText: 2026 TeleCoder Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! [`GitProvider`] implementation over the GitHub REST API.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue};
use serde::Deserialize;
use serde_json::json;
use telecoder_core::traits::git::{split_repo, GitProvider, PrOptions, RepoContext};
use telecoder_core::{Result, TelecoderError};
use tracing::debug;

const API_BASE_URL: &str = "https://api.github.com";

/// GitHub REST API client.
#[derive(Debug, Clone)]
pub struct GithubClient {
    pub(crate) client: reqwest::Client,
    pub(crate) base_url: String,
}

#[derive(Debug, Deserialize)]
struct PrResponse {
    html_url: String,
    number: i64,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RepoResponse {
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub default_branch: Option<String>,
}

impl GithubClient {
    /// Creates a client authenticated with the given token.
    pub fn new(token: &str) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            "authorization",
            HeaderValue::from_str(&format!("Bearer {token}"))
                .map_err(|e| TelecoderError::git(format!("invalid token header: {e}")))?,
        );
        headers.insert("accept", HeaderValue::from_static("application/vnd.github+json"));
        headers.insert("user-agent", HeaderValue::from_static("telecoder"));

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| TelecoderError::Git {
                message: format!("failed to build HTTP client: {e}"),
                source: Some(Box::new(e)),
            })?;

        Ok(GithubClient {
            client,
            base_url: API_BASE_URL.to_string(),
        })
    }

    /// Overrides the base URL (for testing with wiremock).
    pub fn with_base_url(mut self, url: String) -> Self {
        self.base_url = url;
        self
    }

    pub(crate) async fn get_json<T: serde::de::DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = format!("{}{path}", self.base_url);
        let response = self.client.get(&url).send().await.map_err(|e| {
            TelecoderError::Git {
                message: format!("GET {path}: {e}"),
                source: Some(Box::new(e)),
            }
        })?;
        Self::decode(path, response).await
    }

    pub(crate) async fn post_json<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        body: &serde_json::Value,
    ) -> Result<T> {
        let url = format!("{}{path}", self.base_url);
        let response = self.client.post(&url).json(body).send().await.map_err(|e| {
            TelecoderError::Git {
                message: format!("POST {path}: {e}"),
                source: Some(Box::new(e)),
            }
        })?;
        Self::decode(path, response).await
    }

    /// Fetches a file's raw contents at a ref.
    pub(crate) async fn get_raw(&self, path: &str) -> Result<String> {
        let url = format!("{}{path}", self.base_url);
        let response = self
            .client
            .get(&url)
            .header("accept", "application/vnd.github.raw+json")
            .send()
            .await
            .map_err(|e| TelecoderError::Git {
                message: format!("GET {path}: {e}"),
                source: Some(Box::new(e)),
            })?;

        let status = response.status();
        let body = response.text().await.map_err(|e| TelecoderError::Git {
            message: format!("reading {path}: {e}"),
            source: Some(Box::new(e)),
        })?;
        if !status.is_success() {
            return Err(TelecoderError::git(format!(
                "github API error ({status}) on {path}: {body}"
            )));
        }
        Ok(body)
    }

    async fn decode<T: serde::de::DeserializeOwned>(
        path: &str,
        response: reqwest::Response,
    ) -> Result<T> {
        let status = response.status();
        let body = response.text().await.map_err(|e| TelecoderError::Git {
            message: format!("reading {path}: {e}"),
            source: Some(Box::new(e)),
        })?;

        if !status.is_success() {
            return Err(TelecoderError::git(format!(
                "github API error ({status}) on {path}: {body}"
            )));
        }
        serde_json::from_str(&body).map_err(|e| TelecoderError::Git {
            message: format!("parsing {path} response: {e}"),
            source: Some(Box::new(e)),
        })
    }
}

#[async_trait]
impl GitProvider for GithubClient {
    async fn create_pr(&self, opts: &PrOptions) -> Result<(String, i64)> {
        let (owner, repo) = split_repo(&opts.repo)?;
        let base = if opts.base.is_empty() {
            "main"
        } else {
            &opts.base
        };

        let pr: PrResponse = self
            .post_json(
                &format!("/repos/{owner}/{repo}/pulls"),
                &json!({
                    "title": opts.title,
                    "body": opts.body,
                    "head": opts.branch,
                    "base": base,
                }),
            )
            .await?;

        debug!(repo = %opts.repo, number = pr.number, "pull request created");
        Ok((pr.html_url, pr.number))
    }

    async fn get_default_branch(&self, repo: &str) -> Result<String> {
        let (owner, name) = split_repo(repo)?;
        let info: RepoResponse = self.get_json(&format!("/repos/{owner}/{name}")).await?;
        Ok(info.default_branch.unwrap_or_else(|| "main".to_string()))
    }

    async fn index_repo(&self, repo: &str) -> Result<RepoContext> {
        crate::indexer::index_repo(self, repo).await
    }

    async fn reply_to_pr_comment(&self, repo: &str, pr_number: i64, body: &str) -> Result<()> {
        let (owner, name) = split_repo(repo)?;
        let _: serde_json::Value = self
            .post_json(
                &format!("/repos/{owner}/{name}/issues/{pr_number}/comments"),
                &json!({ "body": body }),
            )
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_json_string, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_client(base_url: &str) -> GithubClient {
        GithubClient::new("test-token")
            .unwrap()
            .with_base_url(base_url.to_string())
    }

    #[tokio::test]
    async fn create_pr_returns_url_and_number() {
        let server = MockServer::start().await;
        let body = serde_json::json!({
            "html_url": "https://github.com/acme/api/pull/42",
            "number": 42
        });

        Mock::given(method("POST"))
            .and(path("/repos/acme/api/pulls"))
            .and(header("authorization", "Bearer test-token"))
            .respond_with(ResponseTemplate::new(201).set_body_json(&body))
            .mount(&server)
            .await;

        let client = test_client(&server.uri());
        let (url, number) = client
            .create_pr(&PrOptions {
                repo: "acme/api".into(),
                branch: "telecoder/abc123".into(),
                base: String::new(),
                title: "telecoder: add rate limiting".into(),
                body: "body".into(),
            })
            .await
            .unwrap();

        assert_eq!(url, "https://github.com/acme/api/pull/42");
        assert_eq!(number, 42);
    }

    #[tokio::test]
    async fn get_default_branch_reads_repo_info() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/repos/acme/api"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"default_branch": "develop"})),
            )
            .mount(&server)
            .await;

        let client = test_client(&server.uri());
        assert_eq!(client.get_default_branch("acme/api").await.unwrap(), "develop");
    }

    #[tokio::test]
    async fn reply_to_pr_comment_posts_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/repos/acme/api/issues/7/comments"))
            .and(body_json_string(r#"{"body":"on it"}"#))
            .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!({"id": 1})))
            .mount(&server)
            .await;

        let client = test_client(&server.uri());
        client
            .reply_to_pr_comment("acme/api", 7, "on it")
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn api_error_surfaces_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/repos/acme/api"))
            .respond_with(ResponseTemplate::new(404).set_body_string("not found"))
            .mount(&server)
            .await;

        let client = test_client(&server.uri());
        let err = client.get_default_branch("acme/api").await.unwrap_err();
        assert!(err.to_string().contains("404"), "got: {err}");
    }

    #[tokio::test]
    async fn create_pr_rejects_bad_repo() {
        let client = test_client("http://unused.invalid");
        let err = client
            .create_pr(&PrOptions {
                repo: "not-a-repo".into(),
                ..Default::default()
            })
            .await
            .unwrap_err();
        assert!(err.to_string().contains("invalid repo format"));
    }
}
