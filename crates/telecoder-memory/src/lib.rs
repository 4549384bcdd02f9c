// SPDX-FileCopyrightText: 2026 TeleCoder Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Cross-session memory for TeleCoder.
//!
//! Stores embeddings of past-session summaries and retrieves relevant ones
//! to inject as context when new sessions start. Entries are filtered to
//! the queried repository: sessions from other repos never leak into a
//! prompt.

use std::sync::Arc;

use async_trait::async_trait;
use telecoder_core::types::{now_rfc3339, truncate};
use telecoder_core::Result;
use tokio::sync::RwLock;

/// Generates vector embeddings from text.
#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;
}

/// A stored session summary with its embedding.
#[derive(Debug, Clone)]
pub struct Summary {
    pub session_id: String,
    pub repo: String,
    pub prompt: String,
    pub result: String,
    pub embedding: Vec<f32>,
    pub created_at: String,
}

/// A retrieval result with its similarity score.
#[derive(Debug, Clone)]
pub struct Match {
    pub summary: Summary,
    pub similarity: f32,
}

/// Cross-session memory with vector search.
pub struct MemoryStore {
    summaries: RwLock<Vec<Summary>>,
    embedder: Arc<dyn Embedder>,
}

impl MemoryStore {
    pub fn new(embedder: Arc<dyn Embedder>) -> Self {
        MemoryStore {
            summaries: RwLock::new(Vec::new()),
            embedder,
        }
    }

    /// Stores a session summary with its embedding.
    pub async fn add(
        &self,
        session_id: &str,
        repo: &str,
        prompt: &str,
        result: &str,
    ) -> Result<()> {
        let text = format!("Repo: {repo}\nTask: {prompt}\nResult: {result}");
        let embedding = self.embedder.embed(&text).await?;

        let summary = Summary {
            session_id: session_id.to_string(),
            repo: repo.to_string(),
            prompt: prompt.to_string(),
            result: result.to_string(),
            embedding,
            created_at: now_rfc3339(),
        };

        self.summaries.write().await.push(summary);
        Ok(())
    }

    /// Retrieves the top-k most relevant past sessions for the given repo
    /// and prompt. Only sessions from the same repo are considered.
    pub async fn query(&self, repo: &str, prompt: &str, top_k: usize) -> Result<Vec<Match>> {
        let query_embedding = self.embedder.embed(prompt).await?;

        let summaries = self.summaries.read().await;
        let mut matches: Vec<Match> = summaries
            .iter()
            .filter(|s| s.repo == repo)
            .map(|s| Match {
                similarity: cosine_similarity(&query_embedding, &s.embedding),
                summary: s.clone(),
            })
            .collect();

        matches.sort_by(|a, b| {
            b.similarity
                .partial_cmp(&a.similarity)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        matches.truncate(top_k);
        Ok(matches)
    }

    /// Total number of stored summaries.
    pub async fn count(&self) -> usize {
        self.summaries.read().await.len()
    }
}

/// Builds a markdown context block from retrieved matches, suitable for
/// injecting into a session prompt. Empty for no matches.
pub fn format_context(matches: &[Match]) -> String {
    if matches.is_empty() {
        return String::new();
    }
    let mut out = String::from("## Relevant Past Sessions\n\n");
    for (i, m) in matches.iter().enumerate() {
        out.push_str(&format!(
            "{}. **{}** (similarity: {:.2})\n   Task: {}\n   Result: {}\n\n",
            i + 1,
            m.summary.session_id,
            m.similarity,
            m.summary.prompt,
            truncate(&m.summary.result, 200)
        ));
    }
    out
}

/// Cosine similarity of two vectors; 0 for mismatched or empty inputs.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;
    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a.sqrt() * norm_b.sqrt())
}
