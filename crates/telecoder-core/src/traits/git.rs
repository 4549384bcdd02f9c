// SPDX-FileCopyrightText: 2026 TeleCoder Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Git hosting provider trait.

use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Options for opening a pull request.
#[derive(Debug, Clone, Default)]
pub struct PrOptions {
    /// Target repository as `owner/name`.
    pub repo: String,
    /// Source branch.
    pub branch: String,
    /// Base branch; empty defaults to the repository's main branch.
    pub base: String,
    pub title: String,
    pub body: String,
}

/// Structural summary of a repository used as LLM context.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RepoContext {
    pub description: String,
    /// Flattened file tree, truncated for prompt budgets.
    pub tree: String,
    /// Language name → byte count.
    pub languages: HashMap<String, i64>,
    /// Manifest/config file path → contents excerpt.
    pub key_files: HashMap<String, String>,
}

/// A parsed webhook event describing a new PR comment or review.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebhookEvent {
    pub action: String,
    pub repo: String,
    pub pr_number: i64,
    pub comment_body: String,
    pub comment_user: String,
    pub comment_id: i64,
}

/// Git hosting operations the engine depends on.
#[async_trait]
pub trait GitProvider: Send + Sync {
    /// Opens a pull request, returning its URL and number.
    async fn create_pr(&self, opts: &PrOptions) -> Result<(String, i64)>;

    /// The repository's default branch name.
    async fn get_default_branch(&self, repo: &str) -> Result<String>;

    /// Builds a structural summary of the repository. Failures are
    /// non-fatal: the engine proceeds without context.
    async fn index_repo(&self, repo: &str) -> Result<RepoContext>;

    /// Posts a comment on a pull request.
    async fn reply_to_pr_comment(&self, repo: &str, pr_number: i64, body: &str) -> Result<()>;
}

/// Splits `owner/name` into its two halves.
pub fn split_repo(repo: &str) -> Result<(&str, &str)> {
    match repo.split_once('/') {
        Some((owner, name))
            if !owner.is_empty()
                && !name.is_empty()
                && !name.contains('/')
                && !repo.chars().any(char::is_whitespace) =>
        {
            Ok((owner, name))
        }
        _ => Err(crate::error::TelecoderError::Validation(format!(
            "invalid repo format {repo:?}, expected owner/name"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_repo_accepts_owner_name() {
        assert_eq!(split_repo("acme/api").unwrap(), ("acme", "api"));
    }

    #[test]
    fn split_repo_rejects_bad_formats() {
        for bad in ["", "acme", "/api", "acme/", "a/b/c", "acme /api"] {
            assert!(split_repo(bad).is_err(), "should reject {bad:?}");
        }
    }
}
