// SPDX-FileCopyrightText: 2026 TeleCoder Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Pluggable coding engines for TeleCoder sandboxes.
//!
//! Each implementation wraps a headless coding agent CLI (OpenCode, Claude
//! Code, Codex, Pi) that runs inside a sandbox container. The process-wide
//! registry is built once and frozen; it is the only global state in the
//! system.

mod claude_code;
mod codex;
mod opencode;
mod pi;

use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

use telecoder_core::traits::CodingAgent;
use telecoder_core::types::{
    AgentEvent, EventKind, MARKER_DONE, MARKER_ERROR, MARKER_RESULT, MARKER_STATUS,
};

pub use claude_code::ClaudeCode;
pub use codex::Codex;
pub use opencode::OpenCode;
pub use pi::Pi;

/// Named coding agents, keyed by [`CodingAgent::name`].
pub struct Registry {
    agents: HashMap<&'static str, Arc<dyn CodingAgent>>,
}

impl Registry {
    fn builtin() -> Self {
        let mut agents: HashMap<&'static str, Arc<dyn CodingAgent>> = HashMap::new();
        agents.insert("opencode", Arc::new(OpenCode));
        agents.insert("claude-code", Arc::new(ClaudeCode));
        agents.insert("codex", Arc::new(Codex));
        agents.insert("pi", Arc::new(Pi));
        Registry { agents }
    }

    /// The agent with the given name, if registered.
    pub fn get(&self, name: &str) -> Option<Arc<dyn CodingAgent>> {
        self.agents.get(name).cloned()
    }

    /// The default agent (OpenCode).
    pub fn default_agent(&self) -> Arc<dyn CodingAgent> {
        self.agents["opencode"].clone()
    }

    /// The agent for `name`; empty, "auto", and unknown names fall back to
    /// the default.
    pub fn resolve(&self, name: &str) -> Arc<dyn CodingAgent> {
        if name.is_empty() || name == "auto" {
            return self.default_agent();
        }
        self.get(name).unwrap_or_else(|| self.default_agent())
    }

    /// All registered agent names, sorted.
    pub fn names(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.agents.keys().copied().collect();
        names.sort_unstable();
        names
    }
}

/// The process-wide agent registry, populated on first use and immutable
/// thereafter.
pub fn registry() -> &'static Registry {
    static REGISTRY: OnceLock<Registry> = OnceLock::new();
    REGISTRY.get_or_init(Registry::builtin)
}

/// Parses the shared `###TELECODER_*` marker protocol. Returns `None` for
/// lines that are not markers (regular output).
pub(crate) fn parse_generic_line(line: &str) -> Option<AgentEvent> {
    if let Some(data) = line.strip_prefix(MARKER_STATUS) {
        return Some(AgentEvent {
            kind: EventKind::Status,
            data: data.to_string(),
        });
    }
    if let Some(data) = line.strip_prefix(MARKER_ERROR) {
        return Some(AgentEvent {
            kind: EventKind::Error,
            data: data.to_string(),
        });
    }
    if let Some(data) = line.strip_prefix(MARKER_DONE) {
        return Some(AgentEvent {
            kind: EventKind::Done,
            data: data.to_string(),
        });
    }
    if let Some(data) = line.strip_prefix(MARKER_RESULT) {
        return Some(AgentEvent {
            kind: EventKind::Result,
            data: data.to_string(),
        });
    }
    None
}

/// Quotes a prompt for safe interpolation into a `bash -c` command line.
/// POSIX single-quote quoting: `'` becomes `'\''`.
pub(crate) fn shell_quote(s: &str) -> String {
    format!("'{}'", s.replace('\'', r"'\''"))
}
