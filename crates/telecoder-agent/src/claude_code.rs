// SPDX-FileCopyrightText: 2026 TeleCoder Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use telecoder_core::traits::CodingAgent;
use telecoder_core::types::AgentEvent;

use crate::{parse_generic_line, shell_quote};

/// The Claude Code CLI agent. Anthropic models only.
pub struct ClaudeCode;

impl CodingAgent for ClaudeCode {
    fn name(&self) -> &str {
        "claude-code"
    }

    fn command(&self, prompt: &str) -> String {
        format!(
            "cd /workspace/repo && claude --print {} 2>&1",
            shell_quote(prompt)
        )
    }

    fn parse_event(&self, line: &str) -> Option<AgentEvent> {
        parse_generic_line(line)
    }
}
