// SPDX-FileCopyrightText: 2026 TeleCoder Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Scriptable sandbox runtime for engine tests.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use telecoder_core::traits::{LogStream, SandboxRuntime, StartOptions};
use telecoder_core::{Result, TelecoderError};

/// A sandbox runtime that records every call and replays scripted output.
///
/// - `stream_logs` pops one script from the log queue per call (empty
///   stream once exhausted), simulating per-round container output.
/// - `exec_collect` understands the git commands the engine issues:
///   `git diff --cached --quiet` honours [`set_has_changes`],
///   `git rev-parse HEAD` returns a fixed hash. Substring-keyed overrides
///   take precedence.
///
/// [`set_has_changes`]: MockRuntime::set_has_changes
#[derive(Default)]
pub struct MockRuntime {
    start_count: AtomicI64,
    stop_count: AtomicI64,
    wait_exit_code: AtomicI64,
    has_changes: AtomicBool,
    started: Mutex<Vec<StartOptions>>,
    stopped: Mutex<Vec<String>>,
    exec_calls: Mutex<Vec<Vec<String>>>,
    log_scripts: Mutex<VecDeque<Vec<String>>>,
    exec_scripts: Mutex<VecDeque<Vec<String>>>,
    exec_results: Mutex<HashMap<String, Result<String>>>,
}

impl MockRuntime {
    pub fn new() -> Self {
        MockRuntime::default()
    }

    /// Queues one container's worth of log lines for the next
    /// `stream_logs` call.
    pub fn push_log_script(&self, lines: Vec<&str>) {
        self.log_scripts
            .lock()
            .unwrap()
            .push_back(lines.into_iter().map(String::from).collect());
    }

    /// Queues one `exec` call's worth of streamed lines.
    pub fn push_exec_script(&self, lines: Vec<&str>) {
        self.exec_scripts
            .lock()
            .unwrap()
            .push_back(lines.into_iter().map(String::from).collect());
    }

    /// Sets the exit code returned by `wait`.
    pub fn set_exit_code(&self, code: i64) {
        self.wait_exit_code.store(code, Ordering::SeqCst);
    }

    /// Whether `git diff --cached --quiet` reports staged changes.
    pub fn set_has_changes(&self, has: bool) {
        self.has_changes.store(has, Ordering::SeqCst);
    }

    /// Overrides `exec_collect` for any command whose joined form contains
    /// `needle`.
    pub fn set_exec_result(&self, needle: &str, result: Result<String>) {
        self.exec_results
            .lock()
            .unwrap()
            .insert(needle.to_string(), result);
    }

    pub fn start_calls(&self) -> i64 {
        self.start_count.load(Ordering::SeqCst)
    }

    pub fn stop_calls(&self) -> i64 {
        self.stop_count.load(Ordering::SeqCst)
    }

    pub fn started_options(&self) -> Vec<StartOptions> {
        self.started.lock().unwrap().clone()
    }

    pub fn stopped_containers(&self) -> Vec<String> {
        self.stopped.lock().unwrap().clone()
    }

    /// Every exec/exec_collect command, space-joined.
    pub fn exec_history(&self) -> Vec<String> {
        self.exec_calls
            .lock()
            .unwrap()
            .iter()
            .map(|cmd| cmd.join(" "))
            .collect()
    }
}

fn clone_result(r: &Result<String>) -> Result<String> {
    match r {
        Ok(s) => Ok(s.clone()),
        Err(e) => Err(TelecoderError::runtime(e.to_string())),
    }
}

#[async_trait]
impl SandboxRuntime for MockRuntime {
    async fn start(&self, opts: &StartOptions) -> Result<String> {
        let n = self.start_count.fetch_add(1, Ordering::SeqCst) + 1;
        self.started.lock().unwrap().push(opts.clone());
        Ok(format!("mock-container-{n}"))
    }

    async fn stop(&self, container_id: &str) -> Result<()> {
        self.stop_count.fetch_add(1, Ordering::SeqCst);
        self.stopped.lock().unwrap().push(container_id.to_string());
        Ok(())
    }

    async fn wait(&self, _container_id: &str) -> Result<i64> {
        Ok(self.wait_exit_code.load(Ordering::SeqCst))
    }

    async fn stream_logs(&self, _container_id: &str) -> Result<LogStream> {
        let lines = self
            .log_scripts
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_default();
        Ok(LogStream::from_lines(lines))
    }

    async fn exec(&self, _container_id: &str, cmd: &[String]) -> Result<LogStream> {
        self.exec_calls.lock().unwrap().push(cmd.to_vec());
        let lines = self
            .exec_scripts
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_default();
        Ok(LogStream::from_lines(lines))
    }

    async fn exec_collect(&self, _container_id: &str, cmd: &[String]) -> Result<String> {
        self.exec_calls.lock().unwrap().push(cmd.to_vec());
        let joined = cmd.join(" ");

        {
            let overrides = self.exec_results.lock().unwrap();
            for (needle, result) in overrides.iter() {
                if joined.contains(needle) {
                    return clone_result(result);
                }
            }
        }

        if joined.contains("git diff --cached --quiet") {
            return if self.has_changes.load(Ordering::SeqCst) {
                Err(TelecoderError::runtime("exit status 1"))
            } else {
                Ok(String::new())
            };
        }
        if joined.contains("git rev-parse HEAD") {
            return Ok("abc123def456\n".to_string());
        }
        if joined.starts_with("test -f") {
            // Probed files are absent unless an override says otherwise.
            return Err(TelecoderError::runtime("exit status 1"));
        }

        Ok(String::new())
    }

    async fn commit_and_push(&self, container_id: &str, message: &str, _branch: &str) -> Result<()> {
        self.exec_calls.lock().unwrap().push(vec![
            "commit-and-push".to_string(),
            container_id.to_string(),
            message.to_string(),
        ]);
        Ok(())
    }

    async fn ensure_network(&self, _name: &str) -> Result<()> {
        Ok(())
    }

    async fn is_running(&self, _container_id: &str) -> bool {
        true
    }
}
