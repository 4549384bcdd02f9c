// SPDX-FileCopyrightText: 2026 TeleCoder Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use telecoder_core::traits::CodingAgent;
use telecoder_core::types::AgentEvent;

use crate::{parse_generic_line, shell_quote};

/// The Pi CLI agent. Model-agnostic, MIT licensed, rich JSONL output.
pub struct Pi;

impl CodingAgent for Pi {
    fn name(&self) -> &str {
        "pi"
    }

    fn command(&self, prompt: &str) -> String {
        format!(
            "cd /workspace/repo && pi -p {} --mode json 2>&1",
            shell_quote(prompt)
        )
    }

    fn parse_event(&self, line: &str) -> Option<AgentEvent> {
        parse_generic_line(line)
    }
}
