// SPDX-FileCopyrightText: 2026 TeleCoder Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Multi-step persistent execution.
//!
//! When decomposition yields more than one sub-task, the whole session
//! runs in a single persistent container: intermediate steps share a
//! working copy, see each other's edits, and are individually committed
//! so later steps can be rolled back without losing earlier ones.
//! Per-step failures are recorded in the progress statuses and execution
//! continues; only infrastructure failures terminate the session.

use std::sync::Arc;

use serde_json::json;
use telecoder_core::traits::{PrOptions, StartOptions};
use telecoder_core::types::{
    truncate, EventKind, Session, SessionResult, Status, StepState, SubTask, SubTaskStatus,
};
use telecoder_core::{Result, TelecoderError};
use telecoder_pipeline::{
    enrich_prompt, format_progress_json, progress_context, revise_prompt,
};
use tracing::warn;

use crate::Engine;

const PROGRESS_FILE: &str = ".telecoder-progress.json";

impl Engine {
    /// Runs multiple sub-tasks in one persistent container with progress
    /// tracking, git checkpoints, pre-validation, and self-correction.
    pub(crate) async fn run_session_multi_step(
        self: &Arc<Self>,
        sess: &mut Session,
        sub_tasks: &[SubTask],
        repo_context: &str,
    ) {
        let mut statuses: Vec<SubTaskStatus> =
            sub_tasks.iter().map(SubTaskStatus::pending).collect();

        self.emit_event(
            &sess.id,
            EventKind::Status,
            "Starting persistent sandbox for multi-step task...",
        )
        .await;

        let container_id = match self
            .sandbox
            .start(&StartOptions {
                session_id: sess.id.clone(),
                repo: sess.repo.clone(),
                prompt: String::new(),
                persistent: true,
                branch: sess.branch.clone(),
                image: self.config.image.clone(),
                env: self.build_sandbox_env(&sess.agent),
                network: self.config.network.clone(),
            })
            .await
        {
            Ok(id) => id,
            Err(e) => {
                self.fail_session(sess, &format!("failed to start persistent sandbox: {e}"))
                    .await;
                return;
            }
        };

        sess.container_id = container_id.clone();
        sess.status = Status::Running;
        let _ = self.store.update_session(sess).await;

        self.emit_event(&sess.id, EventKind::Status, "Setting up repository...")
            .await;
        if let Err(e) = self.run_setup(sess, &container_id).await {
            self.fail_session(sess, &format!("failed to run setup: {e}")).await;
            let _ = self.sandbox.stop(&container_id).await;
            return;
        }

        // Keep the progress file out of the PR.
        let _ = self
            .exec_shell(
                &container_id,
                &format!(
                    "cd /workspace/repo && grep -qxF '{PROGRESS_FILE}' .gitignore 2>/dev/null || echo '{PROGRESS_FILE}' >> .gitignore"
                ),
            )
            .await;

        let mut last_checkpoint_hash = String::new();
        let mut any_code_changed = false;
        let total = sub_tasks.len();

        for (i, sub_task) in sub_tasks.iter().enumerate() {
            self.emit_event(
                &sess.id,
                EventKind::Step,
                &format!("Step {}/{}: {}", i + 1, total, sub_task.title),
            )
            .await;
            self.emit_progress(&sess.id, i + 1, total, &sub_task.title, "running")
                .await;

            statuses[i].status = StepState::Running;
            if let Err(e) = self.write_progress_file(&container_id, &statuses).await {
                warn!(session_id = %sess.id, error = %e, "writing progress file failed");
            }

            // Pre-validation: from the second step on, make sure the
            // previous step left the codebase healthy.
            if i > 0 {
                self.pre_validate_step(sess, &container_id, &mut statuses, i, &mut last_checkpoint_hash)
                    .await;
            }

            let progress_ctx = progress_context(&statuses, i);

            let mut prompt = sub_task.description.clone();
            let mut plan = String::new();
            if let Some(plan_stage) = &self.plan {
                self.emit_event(
                    &sess.id,
                    EventKind::Status,
                    &format!("Planning step {}/{}...", i + 1, total),
                )
                .await;
                match plan_stage
                    .plan(&sess.repo, &sub_task.description, repo_context)
                    .await
                {
                    Ok(generated) => {
                        self.emit_event(&sess.id, EventKind::Output, &format!("## Plan\n{generated}"))
                            .await;
                        prompt = enrich_prompt(&sub_task.description, &generated);
                        plan = generated;
                    }
                    Err(e) => {
                        warn!(session_id = %sess.id, step = i + 1, error = %e, "planning failed, falling back");
                    }
                }
            }

            if !progress_ctx.is_empty() {
                prompt = format!("{progress_ctx}\n\n{prompt}");
            }

            self.emit_event(
                &sess.id,
                EventKind::Status,
                &format!("Running agent for step {}/{}...", i + 1, total),
            )
            .await;
            if let Err(e) = self.run_agent_in_container(sess, &container_id, &prompt).await {
                statuses[i].status = StepState::Failed;
                self.emit_event(
                    &sess.id,
                    EventKind::Status,
                    &format!("Step {}/{} failed: {e}", i + 1, total),
                )
                .await;
                // A failed step is not a session failure; move on.
                self.emit_progress(&sess.id, i + 1, total, &sub_task.title, "failed")
                    .await;
                continue;
            }

            // Post-verify: one in-container revision on failure.
            if self.verify.is_some() {
                self.emit_event(&sess.id, EventKind::Status, "Verifying changes...").await;
                if let Some(result) = self
                    .run_verify(sess, &container_id, &sub_task.description)
                    .await
                {
                    if !result.passed {
                        self.emit_event(
                            &sess.id,
                            EventKind::Output,
                            &format!("## Verify Failed\n{}", result.feedback),
                        )
                        .await;
                        let revise = revise_prompt(
                            &sub_task.description,
                            &plan,
                            &format!(
                                "Tests/lint failed. Fix the following issues:\n\n{}",
                                result.feedback
                            ),
                        );
                        let _ = self.run_agent_in_container(sess, &container_id, &revise).await;
                    }
                }
            }

            if self.has_uncommitted_changes(&container_id).await {
                any_code_changed = true;
            }
            match self
                .checkpoint_sub_task(&container_id, &sub_task.title, i)
                .await
            {
                Ok(hash) => {
                    last_checkpoint_hash = hash.clone();
                    statuses[i].commit_hash = Some(hash);
                }
                Err(e) => {
                    warn!(session_id = %sess.id, step = i + 1, error = %e, "checkpoint failed");
                }
            }

            statuses[i].status = StepState::Completed;
            let _ = self.write_progress_file(&container_id, &statuses).await;
            self.emit_progress(&sess.id, i + 1, total, &sub_task.title, "completed")
                .await;
        }

        self.finalize_multi_step(sess, &container_id, &statuses, any_code_changed)
            .await;
    }

    /// Runs the verify commands before starting the next step and attempts
    /// one self-correction round on failure. When the correction does not
    /// stick, the working copy is rolled back to the last checkpoint and
    /// the previous step marked failed.
    async fn pre_validate_step(
        &self,
        sess: &Session,
        container_id: &str,
        statuses: &mut [SubTaskStatus],
        i: usize,
        last_checkpoint_hash: &mut String,
    ) {
        if self.verify.is_none() {
            return;
        }

        self.emit_event(&sess.id, EventKind::Status, "Pre-validating previous work...")
            .await;
        let Some(pre) = self.run_verify(sess, container_id, &sess.prompt).await else {
            return;
        };
        if pre.passed {
            return;
        }

        self.emit_event(
            &sess.id,
            EventKind::Output,
            &format!("## Pre-validation Failed\n{}", pre.feedback),
        )
        .await;

        self.emit_event(&sess.id, EventKind::Status, "Attempting self-correction...")
            .await;
        let fix_prompt = format!(
            "Tests/lint failed after the previous step. Fix the following issues WITHOUT starting on the next task:\n\n{}",
            pre.feedback
        );

        match self.run_agent_in_container(sess, container_id, &fix_prompt).await {
            Ok(_) => {
                let recheck = self.run_verify(sess, container_id, &sess.prompt).await;
                if let Some(recheck) = recheck {
                    if !recheck.passed {
                        // Still broken: roll back to the last checkpoint and
                        // blame the step that broke things.
                        self.emit_event(
                            &sess.id,
                            EventKind::Status,
                            "Self-correction failed, rolling back to last checkpoint",
                        )
                        .await;
                        if !last_checkpoint_hash.is_empty() {
                            if let Err(e) = self
                                .rollback_to_checkpoint(container_id, last_checkpoint_hash)
                                .await
                            {
                                warn!(session_id = %sess.id, error = %e, "rollback failed");
                            }
                        }
                        statuses[i - 1].status = StepState::Failed;
                        return;
                    }
                }
                // The fix held: checkpoint it so a later rollback keeps it.
                self.emit_event(&sess.id, EventKind::Status, "Self-correction succeeded")
                    .await;
                if let Ok(hash) = self
                    .checkpoint_sub_task(container_id, "self-correction", i - 1)
                    .await
                {
                    if !hash.is_empty() {
                        *last_checkpoint_hash = hash;
                    }
                }
            }
            Err(e) => {
                warn!(session_id = %sess.id, error = %e, "self-correction agent failed");
                self.emit_event(
                    &sess.id,
                    EventKind::Status,
                    "Self-correction agent failed, rolling back",
                )
                .await;
                if !last_checkpoint_hash.is_empty() {
                    let _ = self
                        .rollback_to_checkpoint(container_id, last_checkpoint_hash)
                        .await;
                }
                statuses[i - 1].status = StepState::Failed;
            }
        }
    }

    async fn finalize_multi_step(
        &self,
        sess: &mut Session,
        container_id: &str,
        statuses: &[SubTaskStatus],
        any_code_changed: bool,
    ) {
        if any_code_changed {
            self.emit_event(&sess.id, EventKind::Status, "Pushing branch...").await;
            if let Err(e) = self.push_branch(container_id, &sess.branch).await {
                self.fail_session(sess, &format!("failed to push branch: {e}")).await;
                let _ = self.sandbox.stop(container_id).await;
                return;
            }

            self.emit_event(&sess.id, EventKind::Status, "Creating pull request...")
                .await;

            let default_branch = self
                .git
                .get_default_branch(&sess.repo)
                .await
                .unwrap_or_else(|_| "main".to_string());

            let pr_title = format!("telecoder: {}", truncate(&sess.prompt, 72));
            let mut pr_body = format!(
                "## TeleCoder Session `{}`\n\n**Prompt:**\n> {}\n\n### Steps\n",
                sess.id, sess.prompt
            );
            for (j, status) in statuses.iter().enumerate() {
                let icon = match status.status {
                    StepState::Failed => "❌",
                    StepState::Pending => "⏳",
                    _ => "✅",
                };
                pr_body.push_str(&format!(
                    "{}. {} **{}** — {}\n",
                    j + 1,
                    icon,
                    status.title,
                    status.description
                ));
            }
            pr_body.push_str(
                "\n---\n*Created by [TeleCoder](https://github.com/telecoder/telecoder-rs)*",
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
                    let _ = self.sandbox.stop(container_id).await;
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
        } else {
            let content = "All steps completed without code changes.";
            sess.status = Status::Complete;
            sess.result = SessionResult::Text {
                content: content.to_string(),
            };
            let _ = self.store.update_session(sess).await;
            self.emit_event(&sess.id, EventKind::Done, content).await;
        }

        let _ = self.sandbox.stop(container_id).await;
    }

    // --- Persistent-container helpers ---

    /// Runs `/setup.sh` in the container, forwarding its marker lines.
    pub(crate) async fn run_setup(&self, sess: &Session, container_id: &str) -> Result<()> {
        let mut stream = self
            .sandbox
            .exec(container_id, &["/setup.sh".to_string()])
            .await?;
        while let Some(line) = stream.next_line().await {
            self.dispatch_log_line(&sess.id, &sess.agent, &line).await;
        }
        Ok(())
    }

    /// Runs the coding agent inside an already-running persistent
    /// container, forwarding each output line as an `output` event.
    pub(crate) async fn run_agent_in_container(
        &self,
        sess: &Session,
        container_id: &str,
        prompt: &str,
    ) -> Result<Vec<String>> {
        let agent = telecoder_agent::registry().resolve(self.resolve_agent_name(&sess.agent));
        let cmd = agent.command(prompt);

        let mut stream = self
            .sandbox
            .exec(
                container_id,
                &["bash".to_string(), "-c".to_string(), cmd],
            )
            .await
            .map_err(|e| TelecoderError::runtime(format!("agent exec failed: {e}")))?;

        let mut output_lines = Vec::new();
        while let Some(line) = stream.next_line().await {
            self.emit_event(&sess.id, EventKind::Output, &line).await;
            output_lines.push(line);
        }
        Ok(output_lines)
    }

    /// Writes the progress statuses into the container working copy.
    pub(crate) async fn write_progress_file(
        &self,
        container_id: &str,
        statuses: &[SubTaskStatus],
    ) -> Result<()> {
        let data = format_progress_json(statuses)?;
        let cmd = format!(
            "cat > /workspace/repo/{PROGRESS_FILE} << 'PROGRESS_EOF'\n{data}\nPROGRESS_EOF"
        );
        self.exec_shell(container_id, &cmd).await.map(|_| ())
    }

    /// Commits all current changes with a step-numbered message and returns
    /// the resulting HEAD hash. Without changes, returns the current HEAD
    /// unchanged.
    pub(crate) async fn checkpoint_sub_task(
        &self,
        container_id: &str,
        title: &str,
        index: usize,
    ) -> Result<String> {
        self.exec_shell(container_id, "cd /workspace/repo && git add -A")
            .await
            .map_err(|e| TelecoderError::runtime(format!("git add: {e}")))?;

        // Zero exit from --quiet means nothing staged.
        let staged = self
            .exec_shell(container_id, "cd /workspace/repo && git diff --cached --quiet")
            .await;
        if staged.is_ok() {
            let head = self
                .exec_shell(container_id, "cd /workspace/repo && git rev-parse HEAD")
                .await
                .unwrap_or_default();
            return Ok(head.trim().to_string());
        }

        let message = format!("telecoder: step {} — {}", index + 1, title);
        self.exec_shell(
            container_id,
            &format!("cd /workspace/repo && git commit -m '{message}'"),
        )
        .await
        .map_err(|e| TelecoderError::runtime(format!("git commit: {e}")))?;

        let head = self
            .exec_shell(container_id, "cd /workspace/repo && git rev-parse HEAD")
            .await
            .map_err(|e| TelecoderError::runtime(format!("git rev-parse: {e}")))?;
        Ok(head.trim().to_string())
    }

    /// Resets the working copy to the given commit.
    pub(crate) async fn rollback_to_checkpoint(
        &self,
        container_id: &str,
        commit_hash: &str,
    ) -> Result<()> {
        self.exec_shell(
            container_id,
            &format!("cd /workspace/repo && git reset --hard {commit_hash}"),
        )
        .await
        .map(|_| ())
    }

    /// Pushes the working branch from the persistent container.
    pub(crate) async fn push_branch(&self, container_id: &str, branch: &str) -> Result<()> {
        self.exec_shell(
            container_id,
            &format!("cd /workspace/repo && git push -u origin {branch}"),
        )
        .await
        .map(|_| ())
    }

    /// Stages everything and reports whether any diff is staged.
    pub(crate) async fn has_uncommitted_changes(&self, container_id: &str) -> bool {
        self.exec_shell(
            container_id,
            "cd /workspace/repo && git add -A && git diff --cached --quiet",
        )
        .await
        .is_err()
    }

    async fn exec_shell(&self, container_id: &str, script: &str) -> Result<String> {
        self.sandbox
            .exec_collect(
                container_id,
                &["bash".to_string(), "-c".to_string(), script.to_string()],
            )
            .await
    }

    async fn emit_progress(
        &self,
        session_id: &str,
        step: usize,
        total: usize,
        title: &str,
        status: &str,
    ) {
        let payload = json!({
            "step": step,
            "total": total,
            "title": title,
            "status": status,
        });
        self.emit_event(session_id, EventKind::Progress, &payload.to_string())
            .await;
    }
}
