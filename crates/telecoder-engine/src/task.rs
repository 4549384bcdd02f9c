// SPDX-FileCopyrightText: 2026 TeleCoder Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Task-session execution: the fire-and-forget path.
//!
//! A task session indexes the repo, optionally decomposes the prompt, and
//! runs each sub-task as a sandbox round with a plan/verify/review
//! revision loop. A single sub-task uses one ephemeral container per
//! round; multiple sub-tasks switch to the persistent multi-step path.

use std::collections::HashSet;
use std::sync::Arc;

use telecoder_core::traits::{PrOptions, StartOptions, WebhookEvent};
use telecoder_core::types::{
    truncate, EventKind, Mode, Session, SessionResult, Status, SubTask, MARKER_DONE,
    MARKER_RESULT,
};
use telecoder_core::{Result, TelecoderError};
use telecoder_github::format_repo_context;
use telecoder_pipeline::{enrich_prompt, revise_prompt, single_task, VerifyResult};
use telecoder_sandbox::verify::{detect_verify_commands, PROBE_FILES};
use tracing::{info, warn};

use crate::{short_id, Engine};

/// Outcome of one sandbox container round.
pub(crate) struct SandboxRound {
    pub container_id: String,
    pub exit_code: i64,
    pub last_line: String,
    /// Set when the container declared a text result (no PR).
    pub text_result: bool,
    /// Non-marker output lines, accumulated for text results.
    pub output_lines: Vec<String>,
}

impl Engine {
    /// Entry point for a task session's worker.
    pub(crate) async fn run_session(self: Arc<Self>, session_id: String) {
        let mut sess = match self.store.get_session(&session_id).await {
            Ok(Some(sess)) => sess,
            Ok(None) => {
                warn!(session_id, "session not found while starting run");
                return;
            }
            Err(e) => {
                warn!(session_id, error = %e, "loading session failed");
                return;
            }
        };

        // Cross-session memory: prepend relevant past sessions to the
        // prompt when the store has seen this repo before.
        let mut prompt = sess.prompt.clone();
        if let Some(memory) = &self.memory {
            if let Ok(matches) = memory.query(&sess.repo, &sess.prompt, 3).await {
                let context = telecoder_memory::format_context(&matches);
                if !context.is_empty() {
                    prompt = format!("{context}\n{prompt}");
                }
            }
        }

        let repo_context = self.index_repo_context(&sess).await;

        let sub_tasks = self.decompose_task(&sess, &prompt, &repo_context).await;

        if sub_tasks.len() <= 1 {
            self.run_session_single_task(&mut sess, &sub_tasks, &repo_context)
                .await;
        } else {
            self.run_session_multi_step(&mut sess, &sub_tasks, &repo_context)
                .await;
        }

        self.after_completion(&session_id).await;
    }

    /// Indexes the repository for codebase context. Failure degrades to an
    /// empty context, never a session failure.
    pub(crate) async fn index_repo_context(&self, sess: &Session) -> String {
        self.emit_event(&sess.id, EventKind::Status, "Indexing repository...")
            .await;
        match self.git.index_repo(&sess.repo).await {
            Ok(rc) => {
                self.emit_event(&sess.id, EventKind::Status, "Repository indexed")
                    .await;
                format_repo_context(&rc)
            }
            Err(e) => {
                warn!(session_id = %sess.id, error = %e, "repo indexing failed, proceeding without context");
                self.emit_event(
                    &sess.id,
                    EventKind::Status,
                    "Repo indexing failed, proceeding without context",
                )
                .await;
                String::new()
            }
        }
    }

    /// Decomposes the prompt into ordered sub-tasks, capped at the
    /// configured maximum. Decomposition failure means a single task.
    async fn decompose_task(
        &self,
        sess: &Session,
        prompt: &str,
        repo_context: &str,
    ) -> Vec<SubTask> {
        let Some(decompose) = &self.decompose else {
            return vec![single_task(prompt)];
        };

        self.emit_event(&sess.id, EventKind::Status, "Analyzing task complexity...")
            .await;

        let max = if self.config.max_sub_tasks == 0 {
            5
        } else {
            self.config.max_sub_tasks
        };

        let sub_tasks = match decompose.decompose(prompt, repo_context, max).await {
            Ok(tasks) => tasks,
            Err(e) => {
                warn!(session_id = %sess.id, error = %e, "decomposition failed, treating as single task");
                vec![single_task(prompt)]
            }
        };

        if sub_tasks.len() > 1 {
            self.emit_event(
                &sess.id,
                EventKind::Status,
                &format!("Task decomposed into {} steps", sub_tasks.len()),
            )
            .await;
        }
        sub_tasks
    }

    /// The fire-and-forget flow: one ephemeral container round per
    /// revision, then a PR or text result.
    async fn run_session_single_task(
        self: &Arc<Self>,
        sess: &mut Session,
        sub_tasks: &[SubTask],
        repo_context: &str,
    ) {
        let mut last_round: Option<SandboxRound> = None;

        for (i, sub_task) in sub_tasks.iter().enumerate() {
            if sub_tasks.len() > 1 {
                self.emit_event(
                    &sess.id,
                    EventKind::Step,
                    &format!("Step {}/{}: {}", i + 1, sub_tasks.len(), sub_task.title),
                )
                .await;
            }

            match self
                .run_sub_task(sess, &sub_task.description, repo_context)
                .await
            {
                Ok(round) => {
                    if let Some(prev) = last_round.take() {
                        if prev.container_id != round.container_id {
                            let _ = self.sandbox.stop(&prev.container_id).await;
                        }
                    }
                    last_round = Some(round);
                }
                Err(e) => {
                    self.fail_session(
                        sess,
                        &format!("step {}/{} failed: {e}", i + 1, sub_tasks.len()),
                    )
                    .await;
                    if let Some(prev) = last_round {
                        let _ = self.sandbox.stop(&prev.container_id).await;
                    }
                    return;
                }
            }
        }

        self.finalize_session(sess, last_round).await;
    }

    /// Runs one sub-task with up to `max_revisions` verify/review-driven
    /// revision rounds.
    async fn run_sub_task(
        &self,
        sess: &mut Session,
        task_prompt: &str,
        repo_context: &str,
    ) -> Result<SandboxRound> {
        let mut prompt = task_prompt.to_string();
        let mut plan = String::new();

        if let Some(plan_stage) = &self.plan {
            self.emit_event(&sess.id, EventKind::Status, "Planning task...").await;
            match plan_stage.plan(&sess.repo, task_prompt, repo_context).await {
                Ok(generated) => {
                    self.emit_event(&sess.id, EventKind::Output, &format!("## Plan\n{generated}"))
                        .await;
                    prompt = enrich_prompt(task_prompt, &generated);
                    plan = generated;
                }
                Err(e) => {
                    warn!(session_id = %sess.id, error = %e, "planning failed, using direct prompt");
                    self.emit_event(&sess.id, EventKind::Status, "Planning failed, using direct prompt")
                        .await;
                }
            }
        }

        let max_rounds = self.config.max_revisions;
        let mut last_round: Option<SandboxRound> = None;

        for round_no in 0..=max_rounds {
            if round_no > 0 {
                self.emit_event(
                    &sess.id,
                    EventKind::Status,
                    &format!("Starting revision round {round_no}/{max_rounds}..."),
                )
                .await;
            }

            let round = self.run_sandbox_round(sess, &prompt).await?;

            if let Some(prev) = last_round.take() {
                if prev.container_id != round.container_id {
                    let _ = self.sandbox.stop(&prev.container_id).await;
                }
            }

            // A non-zero exit is a session failure, not a revision trigger.
            if round.exit_code != 0 {
                let mut msg = format!("sandbox exited with code {}", round.exit_code);
                if !round.last_line.is_empty() {
                    msg.push_str(": ");
                    msg.push_str(&round.last_line);
                }
                let _ = self.sandbox.stop(&round.container_id).await;
                return Err(TelecoderError::runtime(msg));
            }

            // Text results need neither verify nor review.
            if round.text_result {
                return Ok(round);
            }

            let container_id = round.container_id.clone();
            last_round = Some(round);

            if self.verify.is_some() {
                if let Some(verify) = self.run_verify(sess, &container_id, task_prompt).await {
                    if !verify.passed {
                        self.emit_event(
                            &sess.id,
                            EventKind::Output,
                            &format!("## Verify Failed\n{}", verify.feedback),
                        )
                        .await;
                        if round_no >= max_rounds {
                            self.emit_event(
                                &sess.id,
                                EventKind::Status,
                                &format!(
                                    "Tests/lint failed but max revision rounds ({max_rounds}) reached, proceeding"
                                ),
                            )
                            .await;
                        } else {
                            prompt = revise_prompt(
                                task_prompt,
                                &plan,
                                &format!(
                                    "Tests/lint failed. Fix the following issues:\n\n{}",
                                    verify.feedback
                                ),
                            );
                            continue;
                        }
                    }
                }
            }

            // Review needs a plan to compare against.
            let Some(review_stage) = &self.review else { break };
            if plan.is_empty() {
                break;
            }

            self.emit_event(&sess.id, EventKind::Status, "Reviewing changes...").await;
            let diff = self.get_diff_from_container(&container_id).await;
            if diff.is_empty() {
                self.emit_event(&sess.id, EventKind::Status, "No diff found, skipping review")
                    .await;
                break;
            }

            let review = match review_stage.review(task_prompt, &plan, &diff).await {
                Ok(review) => review,
                Err(e) => {
                    warn!(session_id = %sess.id, error = %e, "review failed, proceeding");
                    self.emit_event(&sess.id, EventKind::Status, "Review failed, proceeding")
                        .await;
                    break;
                }
            };

            if review.approved {
                self.emit_event(&sess.id, EventKind::Output, &format!("## Review\n{}", review.feedback))
                    .await;
                break;
            }

            self.emit_event(
                &sess.id,
                EventKind::Output,
                &format!("## Review Feedback\n{}", review.feedback),
            )
            .await;

            if round_no >= max_rounds {
                self.emit_event(
                    &sess.id,
                    EventKind::Status,
                    &format!("Max revision rounds ({max_rounds}) reached, proceeding"),
                )
                .await;
                break;
            }

            prompt = revise_prompt(task_prompt, &plan, &review.feedback);
        }

        last_round.ok_or_else(|| TelecoderError::Internal("no sandbox round executed".into()))
    }

    /// One ephemeral container run: start, stream markers and output, wait
    /// for exit.
    pub(crate) async fn run_sandbox_round(
        &self,
        sess: &mut Session,
        prompt: &str,
    ) -> Result<SandboxRound> {
        self.emit_event(&sess.id, EventKind::Status, "Starting sandbox...").await;

        let container_id = self
            .sandbox
            .start(&StartOptions {
                session_id: sess.id.clone(),
                repo: sess.repo.clone(),
                prompt: prompt.to_string(),
                persistent: false,
                branch: sess.branch.clone(),
                image: self.config.image.clone(),
                env: self.build_sandbox_env(&sess.agent),
                network: self.config.network.clone(),
            })
            .await
            .map_err(|e| TelecoderError::runtime(format!("failed to start sandbox: {e}")))?;

        sess.container_id = container_id.clone();
        sess.status = Status::Running;
        let _ = self.store.update_session(sess).await;
        self.emit_event(&sess.id, EventKind::Status, "Sandbox started, running agent...")
            .await;

        let mut logs = match self.sandbox.stream_logs(&container_id).await {
            Ok(logs) => logs,
            Err(e) => {
                let _ = self.sandbox.stop(&container_id).await;
                return Err(TelecoderError::runtime(format!("failed to stream logs: {e}")));
            }
        };

        let mut last_line = String::new();
        let mut text_result = false;
        let mut output_lines = Vec::new();

        while let Some(line) = logs.next_line().await {
            last_line = line.clone();
            self.dispatch_log_line(&sess.id, &sess.agent, &line).await;

            if let Some(branch) = line.strip_prefix(MARKER_DONE) {
                sess.branch = branch.to_string();
                text_result = false;
            } else if let Some(payload) = line.strip_prefix(MARKER_RESULT) {
                #[derive(serde::Deserialize)]
                struct ResultPayload {
                    #[serde(rename = "type", default)]
                    kind: String,
                }
                if let Ok(parsed) = serde_json::from_str::<ResultPayload>(payload) {
                    text_result = parsed.kind == "text";
                }
            } else if !line.starts_with("###TELECODER_") {
                output_lines.push(line);
            }
        }

        let exit_code = match self.sandbox.wait(&container_id).await {
            Ok(code) => code,
            Err(e) => {
                let _ = self.sandbox.stop(&container_id).await;
                return Err(TelecoderError::runtime(format!(
                    "error waiting for sandbox: {e}"
                )));
            }
        };

        Ok(SandboxRound {
            container_id,
            exit_code,
            last_line,
            text_result,
            output_lines,
        })
    }

    /// Detects build files in the container, runs the matched test/lint
    /// commands, and asks the verify stage to classify the output.
    /// `None` means verify was skipped or degraded.
    pub(crate) async fn run_verify(
        &self,
        sess: &Session,
        container_id: &str,
        task_prompt: &str,
    ) -> Option<VerifyResult> {
        let verify_stage = self.verify.as_ref()?;

        self.emit_event(&sess.id, EventKind::Status, "Running tests and linting...")
            .await;

        let mut existing = HashSet::new();
        for file in PROBE_FILES {
            let cmd = vec![
                "test".to_string(),
                "-f".to_string(),
                format!("/workspace/repo/{file}"),
            ];
            if self.sandbox.exec_collect(container_id, &cmd).await.is_ok() {
                existing.insert(file.to_string());
            }
        }

        let cmds = detect_verify_commands(&existing);
        if cmds.is_empty() {
            self.emit_event(
                &sess.id,
                EventKind::Status,
                "No test/lint commands detected, skipping verify",
            )
            .await;
            return None;
        }

        let mut all_output = String::new();
        for cmd in cmds {
            let shell = vec![
                "bash".to_string(),
                "-c".to_string(),
                format!("cd /workspace/repo && {cmd}"),
            ];
            // Failing commands carry their output in the error.
            let output = match self.sandbox.exec_collect(container_id, &shell).await {
                Ok(output) => output,
                Err(e) => e.to_string(),
            };
            if !output.is_empty() {
                all_output.push_str(&output);
                all_output.push('\n');
            }
        }

        match verify_stage.verify(task_prompt, &all_output).await {
            Ok(result) => {
                let status = if result.passed {
                    "Tests and linting passed"
                } else {
                    "Tests or linting failed"
                };
                self.emit_event(&sess.id, EventKind::Status, status).await;
                Some(result)
            }
            Err(e) => {
                warn!(session_id = %sess.id, error = %e, "verify analysis failed, proceeding");
                self.emit_event(&sess.id, EventKind::Status, "Verify analysis failed, proceeding")
                    .await;
                None
            }
        }
    }

    /// The last-commit diff from the container, or empty when unavailable.
    pub(crate) async fn get_diff_from_container(&self, container_id: &str) -> String {
        let cmd = vec![
            "git".to_string(),
            "-C".to_string(),
            "/workspace/repo".to_string(),
            "diff".to_string(),
            "HEAD~1".to_string(),
        ];
        self.sandbox
            .exec_collect(container_id, &cmd)
            .await
            .unwrap_or_default()
    }

    /// Final output decision for the fire-and-forget flow: text result or
    /// pull request.
    async fn finalize_session(&self, sess: &mut Session, last_round: Option<SandboxRound>) {
        let text_content = last_round
            .as_ref()
            .filter(|r| r.text_result)
            .map(|r| r.output_lines.join("\n"));

        if let Some(content) = text_content {
            sess.status = Status::Complete;
            sess.result = SessionResult::Text {
                content: content.clone(),
            };
            let _ = self.store.update_session(sess).await;
            self.emit_event(&sess.id, EventKind::Done, &content).await;
        } else {
            self.emit_event(&sess.id, EventKind::Status, "Creating pull request...")
                .await;

            let default_branch = self
                .git
                .get_default_branch(&sess.repo)
                .await
                .unwrap_or_else(|_| "main".to_string());

            let pr_title = format!("telecoder: {}", truncate(&sess.prompt, 72));
            let pr_body = format!(
                "## TeleCoder Session `{}`\n\n**Prompt:**\n> {}\n\n---\n*Created by [TeleCoder](https://github.com/telecoder/telecoder-rs)*",
                sess.id, sess.prompt
            );

            let (pr_url, pr_number) = match self
                .git
                .create_pr(&PrOptions {
                    repo: sess.repo.clone(),
                    branch: sess.branch.clone(),
                    base: default_branch,
                    title: pr_title,
                    body: pr_body,
                })
                .await
            {
                Ok(result) => result,
                Err(e) => {
                    self.fail_session(sess, &format!("failed to create PR: {e}")).await;
                    if let Some(round) = last_round {
                        let _ = self.sandbox.stop(&round.container_id).await;
                    }
                    return;
                }
            };

            sess.status = Status::Complete;
            sess.pr_url = pr_url.clone();
            sess.pr_number = pr_number;
            sess.result = SessionResult::Pr {
                url: pr_url.clone(),
                number: pr_number,
            };
            let _ = self.store.update_session(sess).await;
            self.emit_event(&sess.id, EventKind::Done, &pr_url).await;
            info!(session_id = %sess.id, pr = %pr_url, "session complete");
        }

        if let Some(round) = last_round {
            let _ = self.sandbox.stop(&round.container_id).await;
        }
    }

    // --- PR-comment sessions ---

    /// Spawns a task session that addresses a reviewer comment on an
    /// existing PR, reusing the original branch and PR number.
    pub async fn create_pr_comment_session(
        self: &Arc<Self>,
        original: &Session,
        event: &WebhookEvent,
    ) -> Result<Session> {
        let prompt = format!(
            r#"A reviewer left the following comment on Pull Request #{} in repository {}.

## Reviewer Comment (by @{})
{}

## Instructions
- Address the reviewer's feedback by making the necessary code changes
- The changes should be committed to the existing PR branch
- Keep changes minimal and focused on the feedback
- Run tests after making changes if a test suite exists
- Do not make unrelated changes"#,
            event.pr_number, event.repo, event.comment_user, event.comment_body
        );

        let mut sess = Session::new(short_id(), &event.repo, &prompt, Mode::Task);
        sess.branch = original.branch.clone();
        sess.pr_url = original.pr_url.clone();
        sess.pr_number = original.pr_number;

        self.store.create_session(&sess).await?;

        let engine = self.clone();
        let session_id = sess.id.clone();
        self.spawn_worker(async move {
            engine.run_pr_comment_session(session_id).await;
        });

        Ok(sess)
    }

    async fn run_pr_comment_session(self: Arc<Self>, session_id: String) {
        let mut sess = match self.store.get_session(&session_id).await {
            Ok(Some(sess)) => sess,
            _ => {
                warn!(session_id, "PR comment session not found");
                return;
            }
        };

        let ack = format!(
            "🤖 TeleCoder is addressing this comment (session `{}`)...",
            sess.id
        );
        if let Err(e) = self
            .git
            .reply_to_pr_comment(&sess.repo, sess.pr_number, &ack)
            .await
        {
            warn!(session_id = %sess.id, error = %e, "posting ack comment failed");
        }

        let repo_context = self.index_repo_context(&sess).await;

        let mut prompt = sess.prompt.clone();
        if let Some(plan_stage) = &self.plan {
            self.emit_event(&sess.id, EventKind::Status, "Planning changes for PR comment...")
                .await;
            match plan_stage.plan(&sess.repo, &sess.prompt, &repo_context).await {
                Ok(plan) => prompt = enrich_prompt(&sess.prompt, &plan),
                Err(e) => {
                    warn!(session_id = %sess.id, error = %e, "planning failed for PR comment session");
                }
            }
        }

        let round = match self.run_sandbox_round(&mut sess, &prompt).await {
            Ok(round) => round,
            Err(e) => {
                self.fail_session(&mut sess, &format!("PR comment session failed: {e}"))
                    .await;
                let reply = format!(
                    "❌ TeleCoder failed to address this comment (session `{}`): {e}",
                    sess.id
                );
                let _ = self
                    .git
                    .reply_to_pr_comment(&sess.repo, sess.pr_number, &reply)
                    .await;
                return;
            }
        };

        if round.exit_code != 0 {
            let mut msg = format!("sandbox exited with code {}", round.exit_code);
            if !round.last_line.is_empty() {
                msg.push_str(": ");
                msg.push_str(&round.last_line);
            }
            self.fail_session(&mut sess, &msg).await;
            let reply = format!(
                "❌ TeleCoder encountered an error while addressing this comment (session `{}`): {msg}",
                sess.id
            );
            let _ = self
                .git
                .reply_to_pr_comment(&sess.repo, sess.pr_number, &reply)
                .await;
            let _ = self.sandbox.stop(&round.container_id).await;
            return;
        }

        sess.status = Status::Complete;
        let _ = self.store.update_session(&sess).await;
        self.emit_event(&sess.id, EventKind::Done, &sess.pr_url).await;

        let reply = format!(
            "✅ TeleCoder has pushed changes to address this comment (session `{}`). Please review the updated code.",
            sess.id
        );
        if let Err(e) = self
            .git
            .reply_to_pr_comment(&sess.repo, sess.pr_number, &reply)
            .await
        {
            warn!(session_id = %sess.id, error = %e, "posting completion comment failed");
        }

        let _ = self.sandbox.stop(&round.container_id).await;
    }
}
