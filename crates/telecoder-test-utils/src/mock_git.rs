// SPDX-FileCopyrightText: 2026 TeleCoder Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Counting stub git provider for engine tests.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use telecoder_core::traits::{GitProvider, PrOptions, RepoContext};
use telecoder_core::Result;

/// A git provider stub that records calls and returns a fixed PR.
pub struct MockGit {
    pub pr_url: String,
    pub pr_number: i64,
    create_pr_count: AtomicI64,
    created_prs: Mutex<Vec<PrOptions>>,
    replies: Mutex<Vec<(String, i64, String)>>,
}

impl MockGit {
    pub fn new() -> Self {
        MockGit {
            pr_url: "https://github.com/test/repo/pull/1".to_string(),
            pr_number: 1,
            create_pr_count: AtomicI64::new(0),
            created_prs: Mutex::new(Vec::new()),
            replies: Mutex::new(Vec::new()),
        }
    }

    pub fn with_pr(url: &str, number: i64) -> Self {
        MockGit {
            pr_url: url.to_string(),
            pr_number: number,
            ..MockGit::new()
        }
    }

    pub fn create_pr_calls(&self) -> i64 {
        self.create_pr_count.load(Ordering::SeqCst)
    }

    pub fn created_prs(&self) -> Vec<PrOptions> {
        self.created_prs.lock().unwrap().clone()
    }

    /// Comments posted via `reply_to_pr_comment` as (repo, pr, body).
    pub fn replies(&self) -> Vec<(String, i64, String)> {
        self.replies.lock().unwrap().clone()
    }
}

impl Default for MockGit {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl GitProvider for MockGit {
    async fn create_pr(&self, opts: &PrOptions) -> Result<(String, i64)> {
        self.create_pr_count.fetch_add(1, Ordering::SeqCst);
        self.created_prs.lock().unwrap().push(opts.clone());
        Ok((self.pr_url.clone(), self.pr_number))
    }

    async fn get_default_branch(&self, _repo: &str) -> Result<String> {
        Ok("main".to_string())
    }

    async fn index_repo(&self, _repo: &str) -> Result<RepoContext> {
        Ok(RepoContext {
            tree: "README.md".to_string(),
            ..RepoContext::default()
        })
    }

    async fn reply_to_pr_comment(&self, repo: &str, pr_number: i64, body: &str) -> Result<()> {
        self.replies
            .lock()
            .unwrap()
            .push((repo.to_string(), pr_number, body.to_string()));
        Ok(())
    }
}
