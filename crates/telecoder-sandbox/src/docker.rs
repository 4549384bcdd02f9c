// SPDX-FileCopyrightText: 2026 TeleCoder Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Docker implementation of [`SandboxRuntime`] over the `docker` CLI.

use std::path::Path;
use std::process::Stdio;

use async_trait::async_trait;
use telecoder_core::traits::{LogStream, SandboxRuntime, StartOptions};
use telecoder_core::{Result, TelecoderError};
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Buffer capacity for line streams.
const LINE_BUFFER: usize = 256;

/// Sandbox runtime backed by the Docker CLI.
pub struct DockerRuntime {
    docker_bin: String,
}

impl DockerRuntime {
    pub fn new() -> Self {
        DockerRuntime {
            docker_bin: find_docker(),
        }
    }

    fn docker(&self, args: &[String]) -> Command {
        let mut cmd = Command::new(&self.docker_bin);
        cmd.args(args);
        cmd.stdin(Stdio::null());
        cmd
    }

    /// Runs a docker command to completion, returning stdout. A non-zero
    /// exit becomes an error carrying the combined output.
    async fn run_collect(&self, args: &[String]) -> Result<String> {
        let output = self
            .docker(args)
            .output()
            .await
            .map_err(|e| TelecoderError::Runtime {
                message: format!("running docker {}: {e}", args.first().map(String::as_str).unwrap_or("")),
                source: Some(Box::new(e)),
            })?;

        if !output.status.success() {
            let mut combined = String::from_utf8_lossy(&output.stdout).to_string();
            combined.push_str(&String::from_utf8_lossy(&output.stderr));
            return Err(TelecoderError::runtime(format!(
                "docker {} exited with {}: {}",
                args.first().map(String::as_str).unwrap_or(""),
                output.status,
                combined.trim()
            )));
        }
        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }

    /// Spawns a docker command and merges its stdout and stderr into one
    /// line stream.
    fn spawn_line_stream(&self, args: &[String]) -> Result<LogStream> {
        let mut cmd = self.docker(args);
        cmd.stdout(Stdio::piped()).stderr(Stdio::piped());

        let mut child = cmd.spawn().map_err(|e| TelecoderError::Runtime {
            message: format!("spawning docker: {e}"),
            source: Some(Box::new(e)),
        })?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| TelecoderError::runtime("missing stdout pipe"))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| TelecoderError::runtime("missing stderr pipe"))?;

        let (tx, rx) = mpsc::channel(LINE_BUFFER);
        let tx_err = tx.clone();
        tokio::spawn(pump_lines(stdout, tx));
        tokio::spawn(pump_lines(stderr, tx_err));
        tokio::spawn(async move {
            // Reap the child; the line channel closes once both pipes end.
            let _ = child.wait().await;
        });

        Ok(LogStream::new(rx))
    }
}

impl Default for DockerRuntime {
    fn default() -> Self {
        Self::new()
    }
}

async fn pump_lines<R: AsyncRead + Unpin>(reader: R, tx: mpsc::Sender<String>) {
    let mut lines = BufReader::new(reader).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        if tx.send(line).await.is_err() {
            break;
        }
    }
}

/// Locates the docker binary, checking well-known install locations
/// (Docker Desktop on macOS, Homebrew) before deferring to PATH lookup.
fn find_docker() -> String {
    let candidates = [
        "/Applications/Docker.app/Contents/Resources/bin/docker",
        "/usr/local/bin/docker",
        "/opt/homebrew/bin/docker",
        "/usr/bin/docker",
    ];
    for candidate in candidates {
        if Path::new(candidate).exists() {
            return candidate.to_string();
        }
    }
    "docker".to_string()
}

fn s(v: &str) -> String {
    v.to_string()
}

#[async_trait]
impl SandboxRuntime for DockerRuntime {
    async fn start(&self, opts: &StartOptions) -> Result<String> {
        let mut args = vec![
            s("run"),
            s("-d"),
            s("--name"),
            format!("telecoder-{}", opts.session_id),
            s("--label"),
            format!("telecoder.session={}", opts.session_id),
        ];

        if !opts.network.is_empty() {
            args.push(s("--network"));
            args.push(opts.network.clone());
        }

        let mut env = opts.env.clone();
        env.push(format!("TELECODER_SESSION_ID={}", opts.session_id));
        env.push(format!("TELECODER_REPO={}", opts.repo));
        env.push(format!("TELECODER_BRANCH={}", opts.branch));
        if !opts.persistent {
            env.push(format!("TELECODER_PROMPT={}", opts.prompt));
        }
        for entry in env {
            args.push(s("-e"));
            args.push(entry);
        }

        if opts.persistent {
            // Replace the entry point with an idle sleeper; real work runs
            // through exec.
            args.push(s("--entrypoint"));
            args.push(s("sleep"));
            args.push(opts.image.clone());
            args.push(s("infinity"));
        } else {
            args.push(opts.image.clone());
        }

        let output = self.run_collect(&args).await?;
        let container_id = output.trim().to_string();
        debug!(session_id = %opts.session_id, container_id = %container_id, "container started");
        Ok(container_id)
    }

    async fn stop(&self, container_id: &str) -> Result<()> {
        if let Err(e) = self.run_collect(&[s("kill"), s(container_id)]).await {
            debug!(container_id, error = %e, "kill failed (container may have exited)");
        }
        self.run_collect(&[s("rm"), s("-f"), s(container_id)])
            .await
            .map(|_| ())
    }

    async fn wait(&self, container_id: &str) -> Result<i64> {
        let output = self.run_collect(&[s("wait"), s(container_id)]).await?;
        output
            .trim()
            .parse::<i64>()
            .map_err(|e| TelecoderError::runtime(format!("parsing exit code {:?}: {e}", output.trim())))
    }

    async fn stream_logs(&self, container_id: &str) -> Result<LogStream> {
        self.spawn_line_stream(&[s("logs"), s("-f"), s(container_id)])
    }

    async fn exec(&self, container_id: &str, cmd: &[String]) -> Result<LogStream> {
        let mut args = vec![s("exec"), s(container_id)];
        args.extend(cmd.iter().cloned());
        self.spawn_line_stream(&args)
    }

    async fn exec_collect(&self, container_id: &str, cmd: &[String]) -> Result<String> {
        let mut args = vec![s("exec"), s(container_id)];
        args.extend(cmd.iter().cloned());
        self.run_collect(&args).await
    }

    async fn commit_and_push(&self, container_id: &str, message: &str, branch: &str) -> Result<()> {
        self.exec_collect(
            container_id,
            &[s("git"), s("-C"), s("/workspace/repo"), s("add"), s("-A")],
        )
        .await?;

        // Zero exit from --quiet means nothing staged; refuse the commit.
        let staged = self
            .exec_collect(
                container_id,
                &[
                    s("git"),
                    s("-C"),
                    s("/workspace/repo"),
                    s("diff"),
                    s("--cached"),
                    s("--quiet"),
                ],
            )
            .await;
        if staged.is_ok() {
            return Err(TelecoderError::runtime("no changes to commit"));
        }

        let commit_msg = format!("telecoder: {}", telecoder_core::types::truncate(message, 72));
        self.exec_collect(
            container_id,
            &[
                s("git"),
                s("-C"),
                s("/workspace/repo"),
                s("commit"),
                s("-m"),
                commit_msg,
            ],
        )
        .await?;

        // Force-with-lease tolerates rebases of the working branch without
        // clobbering unrelated pushes.
        self.exec_collect(
            container_id,
            &[
                s("git"),
                s("-C"),
                s("/workspace/repo"),
                s("push"),
                s("--force-with-lease"),
                s("origin"),
                s(branch),
            ],
        )
        .await
        .map(|_| ())
    }

    async fn ensure_network(&self, name: &str) -> Result<()> {
        if self
            .run_collect(&[s("network"), s("inspect"), s(name)])
            .await
            .is_ok()
        {
            return Ok(());
        }
        match self.run_collect(&[s("network"), s("create"), s(name)]).await {
            Ok(_) => Ok(()),
            Err(e) => {
                warn!(network = name, error = %e, "network create failed");
                Err(e)
            }
        }
    }

    async fn is_running(&self, container_id: &str) -> bool {
        match self
            .run_collect(&[
                s("inspect"),
                s("-f"),
                s("{{.State.Running}}"),
                s(container_id),
            ])
            .await
        {
            Ok(output) => output.trim() == "true",
            Err(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn find_docker_returns_something() {
        let bin = find_docker();
        assert!(!bin.is_empty());
        assert!(bin.contains("docker"));
    }

    #[tokio::test]
    async fn pump_lines_forwards_every_line() {
        let data = b"alpha\nbeta\ngamma\n" as &[u8];
        let (tx, mut rx) = mpsc::channel(8);
        pump_lines(data, tx).await;

        assert_eq!(rx.recv().await.as_deref(), Some("alpha"));
        assert_eq!(rx.recv().await.as_deref(), Some("beta"));
        assert_eq!(rx.recv().await.as_deref(), Some("gamma"));
        assert!(rx.recv().await.is_none());
    }
}
