// SPDX-FileCopyrightText: 2026 TeleCoder Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Repository indexing: fetches structure and key files from the GitHub
//! API and formats them as LLM context.

use std::collections::HashMap;

use serde::Deserialize;
use telecoder_core::traits::git::{split_repo, RepoContext};
use telecoder_core::Result;

use crate::client::{GithubClient, RepoResponse};

const KEY_FILE_NAMES: &[&str] = &[
    "README.md",
    "package.json",
    "go.mod",
    "pyproject.toml",
    "Cargo.toml",
    "Makefile",
    "Dockerfile",
    "docker-compose.yml",
    "compose.yml",
    "requirements.txt",
    "tsconfig.json",
];

const MAX_TREE_DEPTH: usize = 3;
const MAX_KEY_FILE_LINES: usize = 100;

#[derive(Debug, Deserialize)]
struct TreeResponse {
    #[serde(default)]
    tree: Vec<TreeEntry>,
}

#[derive(Debug, Deserialize)]
struct TreeEntry {
    #[serde(default)]
    path: String,
    #[serde(rename = "type", default)]
    kind: String,
}

/// Fetches repository metadata, file tree, and key files.
pub(crate) async fn index_repo(client: &GithubClient, repo: &str) -> Result<RepoContext> {
    let (owner, name) = split_repo(repo)?;

    let mut rc = RepoContext::default();

    let info: RepoResponse = client.get_json(&format!("/repos/{owner}/{name}")).await?;
    rc.description = info.description.unwrap_or_default();
    let default_branch = info.default_branch.unwrap_or_else(|| "main".to_string());

    // Language breakdown is best-effort.
    if let Ok(languages) = client
        .get_json::<HashMap<String, i64>>(&format!("/repos/{owner}/{name}/languages"))
        .await
    {
        let total: i64 = languages.values().sum();
        if total > 0 {
            for (lang, bytes) in languages {
                rc.languages.insert(lang, bytes * 100 / total);
            }
        }
    }

    let tree: TreeResponse = client
        .get_json(&format!(
            "/repos/{owner}/{name}/git/trees/{default_branch}?recursive=1"
        ))
        .await?;

    rc.tree = build_tree_string(&tree.tree);

    for entry in &tree.tree {
        // Only root-level manifests are worth quoting in full.
        if entry.path.contains('/') || !KEY_FILE_NAMES.contains(&entry.path.as_str()) {
            continue;
        }
        if let Ok(content) = client
            .get_raw(&format!(
                "/repos/{owner}/{name}/contents/{}?ref={default_branch}",
                entry.path
            ))
            .await
        {
            if !content.is_empty() {
                rc.key_files
                    .insert(entry.path.clone(), truncate_lines(&content, MAX_KEY_FILE_LINES));
            }
        }
    }

    Ok(rc)
}

/// Formats a [`RepoContext`] as a single block of text suitable for
/// injection into an LLM prompt.
pub fn format_repo_context(rc: &RepoContext) -> String {
    let mut out = String::new();

    if !rc.description.is_empty() {
        out.push_str(&format!("### Description\n{}\n\n", rc.description));
    }

    if !rc.languages.is_empty() {
        out.push_str("### Languages\n");
        let mut langs: Vec<(&String, &i64)> = rc.languages.iter().collect();
        langs.sort_by(|a, b| b.1.cmp(a.1).then_with(|| a.0.cmp(b.0)));
        for (name, pct) in langs {
            out.push_str(&format!("- {name}: {pct}%\n"));
        }
        out.push('\n');
    }

    if !rc.tree.is_empty() {
        out.push_str(&format!(
            "### File Tree (top {MAX_TREE_DEPTH} levels)\n```\n{}\n```\n\n",
            rc.tree
        ));
    }

    if !rc.key_files.is_empty() {
        out.push_str("### Key Files\n");
        let mut names: Vec<&String> = rc.key_files.keys().collect();
        names.sort();
        for name in names {
            out.push_str(&format!("\n**{name}**\n```\n{}\n```\n", rc.key_files[name]));
        }
    }

    out
}

fn build_tree_string(entries: &[TreeEntry]) -> String {
    let mut lines = Vec::new();
    for entry in entries {
        let depth = entry.path.matches('/').count();
        if depth >= MAX_TREE_DEPTH {
            continue;
        }
        let indent = "  ".repeat(depth);
        let name = entry.path.rsplit('/').next().unwrap_or(&entry.path);
        if entry.kind == "tree" {
            lines.push(format!("{indent}{name}/"));
        } else {
            lines.push(format!("{indent}{name}"));
        }
    }
    lines.join("\n")
}

fn truncate_lines(s: &str, n: usize) -> String {
    let mut lines: Vec<&str> = s.splitn(n + 1, '\n').collect();
    if lines.len() > n {
        lines.truncate(n);
        lines.push("... (truncated)");
    }
    lines.join("\n")
}
