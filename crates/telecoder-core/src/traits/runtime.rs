// SPDX-FileCopyrightText: 2026 TeleCoder Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Sandbox runtime trait: container lifecycle and line-oriented output.

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::Result;

/// Options for starting a sandbox container.
#[derive(Debug, Clone, Default)]
pub struct StartOptions {
    pub session_id: String,
    /// Target repository as `owner/name`.
    pub repo: String,
    /// Prompt injected as `TELECODER_PROMPT`; ignored for persistent
    /// containers, which receive work through `exec`.
    pub prompt: String,
    /// When true the container's entry point is replaced with an idle
    /// sleeper and real work runs through `exec`.
    pub persistent: bool,
    /// Git branch name for the working copy.
    pub branch: String,
    /// Container image name.
    pub image: String,
    /// Additional `KEY=VALUE` environment entries.
    pub env: Vec<String>,
    /// Container network name; empty means the runtime default.
    pub network: String,
}

/// A line-by-line view of container output with stdout and stderr merged.
///
/// Dropping the stream detaches from the underlying process; the producer
/// side stops on its own once the consumer is gone.
pub struct LogStream {
    rx: mpsc::Receiver<String>,
}

impl LogStream {
    /// Wraps a receiver whose sender side is fed by the runtime.
    pub fn new(rx: mpsc::Receiver<String>) -> Self {
        LogStream { rx }
    }

    /// A stream that yields the given lines then ends. Test fixture.
    pub fn from_lines(lines: Vec<String>) -> Self {
        let (tx, rx) = mpsc::channel(lines.len().max(1));
        for line in lines {
            // Capacity covers every line; a full buffer is impossible here.
            let _ = tx.try_send(line);
        }
        LogStream { rx }
    }

    /// The next output line, or `None` when the process has finished.
    pub async fn next_line(&mut self) -> Option<String> {
        self.rx.recv().await
    }
}

/// Manages sandbox container lifecycle.
///
/// Implementations must label containers with the owning session id (for
/// orphan cleanup) and inject the session environment on start.
#[async_trait]
pub trait SandboxRuntime: Send + Sync {
    /// Creates and starts a container, returning its id.
    async fn start(&self, opts: &StartOptions) -> Result<String>;

    /// Kills and removes a container.
    async fn stop(&self, container_id: &str) -> Result<()>;

    /// Blocks until the container exits and returns its exit code.
    async fn wait(&self, container_id: &str) -> Result<i64>;

    /// Attaches to the container's output from the beginning.
    async fn stream_logs(&self, container_id: &str) -> Result<LogStream>;

    /// Runs a command inside a running container, streaming its output.
    async fn exec(&self, container_id: &str, cmd: &[String]) -> Result<LogStream>;

    /// Runs a command and collects its full output. Fails when the command
    /// exits non-zero, which callers use for existence probes and
    /// `git diff --cached --quiet`.
    async fn exec_collect(&self, container_id: &str, cmd: &[String]) -> Result<String>;

    /// Stages all changes, commits with a truncated message, and
    /// force-with-lease pushes the branch. Fails when nothing is staged.
    async fn commit_and_push(&self, container_id: &str, message: &str, branch: &str) -> Result<()>;

    /// Creates the named container network if it does not exist.
    async fn ensure_network(&self, name: &str) -> Result<()>;

    /// Whether the container is currently running.
    async fn is_running(&self, container_id: &str) -> bool;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn from_lines_yields_all_then_ends() {
        let mut stream = LogStream::from_lines(vec!["one".into(), "two".into()]);
        assert_eq!(stream.next_line().await.as_deref(), Some("one"));
        assert_eq!(stream.next_line().await.as_deref(), Some("two"));
        assert!(stream.next_line().await.is_none());
    }

    #[tokio::test]
    async fn from_lines_empty_ends_immediately() {
        let mut stream = LogStream::from_lines(vec![]);
        assert!(stream.next_line().await.is_none());
    }
}
