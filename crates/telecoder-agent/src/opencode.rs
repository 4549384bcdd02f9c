// SPDX-FileCopyrightText: 2026 TeleCoder Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use telecoder_core::traits::CodingAgent;
use telecoder_core::types::AgentEvent;

use crate::{parse_generic_line, shell_quote};

/// The OpenCode CLI agent. Model-agnostic (15+ providers), MIT licensed;
/// the default agent.
pub struct OpenCode;

impl CodingAgent for OpenCode {
    fn name(&self) -> &str {
        "opencode"
    }

    fn command(&self, prompt: &str) -> String {
        format!("cd /workspace/repo && opencode -p {} 2>&1", shell_quote(prompt))
    }

    fn parse_event(&self, line: &str) -> Option<AgentEvent> {
        parse_generic_line(line)
    }
}
