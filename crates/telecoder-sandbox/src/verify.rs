// SPDX-FileCopyrightText: 2026 TeleCoder Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Build-file detection for test and lint commands.

use std::collections::HashSet;

/// Files probed inside the sandbox working copy to pick verify commands.
pub const PROBE_FILES: &[&str] = &[
    "go.mod",
    "package.json",
    "Cargo.toml",
    "requirements.txt",
    "pyproject.toml",
    "setup.py",
    "Makefile",
    ".eslintrc.js",
    ".eslintrc.json",
    "eslint.config.js",
    "eslint.config.mjs",
];

/// Returns shell commands to run tests and linting based on which project
/// files exist. The caller probes file existence inside the sandbox via
/// `exec_collect` before calling this.
pub fn detect_verify_commands(existing: &HashSet<String>) -> Vec<String> {
    let has = |f: &str| existing.contains(f);
    let mut cmds = Vec::new();

    if has("go.mod") {
        cmds.push("go test ./... 2>&1".to_string());
    } else if has("package.json") {
        cmds.push("npm test --if-present 2>&1".to_string());
    } else if has("Cargo.toml") {
        cmds.push("cargo test 2>&1".to_string());
    } else if has("requirements.txt") || has("pyproject.toml") || has("setup.py") {
        cmds.push("python -m pytest 2>&1 || python -m unittest discover 2>&1".to_string());
    } else if has("Makefile") {
        cmds.push("make test 2>&1".to_string());
    }

    if has("go.mod") {
        cmds.push("go vet ./... 2>&1".to_string());
    } else if has(".eslintrc.js")
        || has(".eslintrc.json")
        || has("eslint.config.js")
        || has("eslint.config.mjs")
    {
        cmds.push("npx eslint . 2>&1".to_string());
    }

    cmds
}
