// SPDX-FileCopyrightText: 2026 TeleCoder Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use telecoder_core::traits::CodingAgent;
use telecoder_core::types::AgentEvent;

use crate::{parse_generic_line, shell_quote};

/// The OpenAI Codex CLI agent. OpenAI models only, Apache 2.0 licensed.
pub struct Codex;

impl CodingAgent for Codex {
    fn name(&self) -> &str {
        "codex"
    }

    fn command(&self, prompt: &str) -> String {
        format!(
            "cd /workspace/repo && codex exec --full-auto --ephemeral {} 2>&1",
            shell_quote(prompt)
        )
    }

    fn parse_event(&self, line: &str) -> Option<AgentEvent> {
        parse_generic_line(line)
    }
}
