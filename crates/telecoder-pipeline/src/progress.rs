// SPDX-FileCopyrightText: 2026 TeleCoder Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Progress helpers for multi-step execution.

use telecoder_core::types::{StepState, SubTaskStatus};
use telecoder_core::{Result, TelecoderError};

/// Serializes the progress state as pretty JSON for writing into the
/// sandbox as `.telecoder-progress.json`.
pub fn format_progress_json(statuses: &[SubTaskStatus]) -> Result<String> {
    serde_json::to_string_pretty(statuses)
        .map_err(|e| TelecoderError::Internal(format!("marshalling progress: {e}")))
}

/// Builds a markdown summary of completed/failed steps to prepend to the
/// agent's prompt, giving it awareness of what has been done so far.
/// Returns an empty string for the first step.
pub fn progress_context(statuses: &[SubTaskStatus], current_index: usize) -> String {
    if current_index == 0 {
        return String::new();
    }

    let mut out = String::new();
    out.push_str("## Previous Steps\n\n");
    out.push_str("The following steps have already been completed on this branch.\n");
    out.push_str("Do NOT redo any of this work -- build on top of it.\n\n");

    for (i, status) in statuses.iter().take(current_index).enumerate() {
        let icon = if status.status == StepState::Failed {
            "❌"
        } else {
            "✅"
        };
        out.push_str(&format!(
            "{}. {} **{}** -- {}\n",
            i + 1,
            icon,
            status.title,
            status.description
        ));
    }

    if let Some(current) = statuses.get(current_index) {
        out.push_str(&format!(
            "\n## Current Step ({}/{})\n\n",
            current_index + 1,
            statuses.len()
        ));
        out.push_str(&format!("**{}**: {}\n", current.title, current.description));
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status(title: &str, state: StepState) -> SubTaskStatus {
        SubTaskStatus {
            title: title.to_string(),
            description: format!("{title} description"),
            status: state,
            commit_hash: None,
        }
    }

    #[test]
    fn progress_json_round_trips() {
        let statuses = vec![
            SubTaskStatus {
                title: "Add auth".into(),
                description: "Add authentication".into(),
                status: StepState::Completed,
                commit_hash: Some("abc123".into()),
            },
            status("Add tests", StepState::Running),
            status("Add docs", StepState::Pending),
        ];

        let json = format_progress_json(&statuses).unwrap();
        assert!(json.contains("Add auth"));
        assert!(json.contains("abc123"));
        assert!(json.contains("running"));

        let parsed: Vec<SubTaskStatus> = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, statuses);
    }

    #[test]
    fn progress_json_empty_array() {
        assert_eq!(format_progress_json(&[]).unwrap(), "[]");
    }

    #[test]
    fn first_step_has_no_context() {
        let statuses = vec![
            status("Step 1", StepState::Running),
            status("Step 2", StepState::Pending),
        ];
        assert_eq!(progress_context(&statuses, 0), "");
    }

    #[test]
    fn second_step_lists_prior_and_current_only() {
        let statuses = vec![
            status("Add auth", StepState::Completed),
            status("Add tests", StepState::Running),
            status("Add docs", StepState::Pending),
        ];

        let ctx = progress_context(&statuses, 1);
        assert!(ctx.contains("Previous Steps"));
        assert!(ctx.contains("Add auth"));
        assert!(ctx.contains("Current Step (2/3)"));
        assert!(ctx.contains("Add tests"));
        assert!(!ctx.contains("Add docs"));
    }

    #[test]
    fn failed_step_gets_failure_icon() {
        let statuses = vec![
            status("Step 1", StepState::Failed),
            status("Step 2", StepState::Running),
        ];
        let ctx = progress_context(&statuses, 1);
        assert!(ctx.contains('❌'));
    }
}
