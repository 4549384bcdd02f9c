// SPDX-FileCopyrightText: 2026 TeleCoder Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! LLM-backed pipeline stages: decompose, plan, verify, review.
//!
//! Each stage is a thin wrapper around `LlmClient::complete`. Stage failures
//! are degraded, never fatal: the engine falls back to a direct prompt,
//! skips review, or treats the task as a single step.

use std::sync::Arc;

use telecoder_core::traits::LlmClient;
use telecoder_core::types::SubTask;
use telecoder_core::Result;

use crate::parse::parse_sub_tasks;
use crate::prompts::{
    DEFAULT_DECOMPOSER_PROMPT, DEFAULT_PLANNER_PROMPT, DEFAULT_REVIEWER_PROMPT,
    DEFAULT_VERIFIER_PROMPT,
};

/// Outcome of a code review.
#[derive(Debug, Clone)]
pub struct ReviewResult {
    /// True iff the trimmed response begins with "APPROVED".
    pub approved: bool,
    pub feedback: String,
}

/// Outcome of a verify (test/lint) analysis.
#[derive(Debug, Clone)]
pub struct VerifyResult {
    pub passed: bool,
    pub feedback: String,
}

fn or_default(system_prompt: &str, default: &str) -> String {
    if system_prompt.is_empty() {
        default.to_string()
    } else {
        system_prompt.to_string()
    }
}

/// Breaks a task into ordered sub-tasks using an LLM.
pub struct DecomposeStage {
    llm: Arc<dyn LlmClient>,
    system_prompt: String,
}

impl DecomposeStage {
    /// Pass an empty `system_prompt` to use the default.
    pub fn new(llm: Arc<dyn LlmClient>, system_prompt: &str) -> Self {
        DecomposeStage {
            llm,
            system_prompt: or_default(system_prompt, DEFAULT_DECOMPOSER_PROMPT),
        }
    }

    /// Decomposes `prompt` into at most `max_sub_tasks` ordered steps.
    ///
    /// An LLM failure propagates (the engine treats it as a single task);
    /// a parse failure or empty list falls back to a single sub-task equal
    /// to the prompt.
    pub async fn decompose(
        &self,
        prompt: &str,
        repo_context: &str,
        max_sub_tasks: usize,
    ) -> Result<Vec<SubTask>> {
        let mut user = if repo_context.is_empty() {
            format!("Task: {prompt}")
        } else {
            format!("## Codebase Context\n{repo_context}\n\nTask: {prompt}")
        };
        if max_sub_tasks > 5 {
            user.push_str(&format!("\n\nYou may return up to {max_sub_tasks} steps."));
        }

        let response = self.llm.complete(&self.system_prompt, &user).await?;

        let mut tasks = match parse_sub_tasks(&response) {
            Some(tasks) => tasks,
            None => vec![single_task(prompt)],
        };
        if max_sub_tasks > 0 {
            tasks.truncate(max_sub_tasks);
        }
        Ok(tasks)
    }
}

/// The fallback decomposition: one sub-task equal to the prompt.
pub fn single_task(prompt: &str) -> SubTask {
    SubTask {
        title: "Complete task".to_string(),
        description: prompt.to_string(),
    }
}

/// Generates a structured markdown plan using an LLM.
pub struct PlanStage {
    llm: Arc<dyn LlmClient>,
    system_prompt: String,
}

impl PlanStage {
    /// Pass an empty `system_prompt` to use the default.
    pub fn new(llm: Arc<dyn LlmClient>, system_prompt: &str) -> Self {
        PlanStage {
            llm,
            system_prompt: or_default(system_prompt, DEFAULT_PLANNER_PROMPT),
        }
    }

    /// Produces an opaque markdown plan for the task.
    pub async fn plan(&self, repo: &str, prompt: &str, repo_context: &str) -> Result<String> {
        let user = if repo_context.is_empty() {
            format!("Repository: {repo}\n\nTask: {prompt}")
        } else {
            format!(
                "Repository: {repo}\n\n## Codebase Context\n{repo_context}\n\nTask: {prompt}"
            )
        };
        self.llm.complete(&self.system_prompt, &user).await
    }
}

/// Classifies aggregated test/lint output as pass or fail using an LLM.
pub struct VerifyStage {
    llm: Arc<dyn LlmClient>,
    system_prompt: String,
}

impl VerifyStage {
    /// Pass an empty `system_prompt` to use the default.
    pub fn new(llm: Arc<dyn LlmClient>, system_prompt: &str) -> Self {
        VerifyStage {
            llm,
            system_prompt: or_default(system_prompt, DEFAULT_VERIFIER_PROMPT),
        }
    }

    /// Analyses the combined test/lint output. Empty output passes without
    /// an LLM call; otherwise `passed` is derived from a leading
    /// PASSED/FAILED token (case-insensitive).
    pub async fn verify(&self, task_prompt: &str, output: &str) -> Result<VerifyResult> {
        if output.trim().is_empty() {
            return Ok(VerifyResult {
                passed: true,
                feedback: String::new(),
            });
        }

        let user = format!("## Task\n{task_prompt}\n\n## Test/Lint Output\n{output}");
        let response = self.llm.complete(&self.system_prompt, &user).await?;
        let passed = response.trim().to_uppercase().starts_with("PASSED");

        Ok(VerifyResult {
            passed,
            feedback: response,
        })
    }
}

/// Reviews a diff against the plan and task using an LLM.
pub struct ReviewStage {
    llm: Arc<dyn LlmClient>,
    system_prompt: String,
}

impl ReviewStage {
    /// Pass an empty `system_prompt` to use the default.
    pub fn new(llm: Arc<dyn LlmClient>, system_prompt: &str) -> Self {
        ReviewStage {
            llm,
            system_prompt: or_default(system_prompt, DEFAULT_REVIEWER_PROMPT),
        }
    }

    /// Reviews a diff; approval requires the trimmed response to begin
    /// with "APPROVED".
    pub async fn review(&self, prompt: &str, plan: &str, diff: &str) -> Result<ReviewResult> {
        let user = format!(
            "## Original Task\n{prompt}\n\n## Plan\n{plan}\n\n## Diff\n```diff\n{diff}\n```"
        );
        let response = self.llm.complete(&self.system_prompt, &user).await?;
        let approved = response.trim().to_uppercase().starts_with("APPROVED");

        Ok(ReviewResult {
            approved,
            feedback: response,
        })
    }
}
