// SPDX-FileCopyrightText: 2026 TeleCoder Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Tolerant JSON extraction from LLM responses.

use telecoder_core::types::SubTask;

/// Strips a leading/trailing markdown code fence, if present.
pub fn strip_fences(s: &str) -> &str {
    let s = s.trim();
    if !s.starts_with("```") {
        return s;
    }
    let s = match s.find('\n') {
        Some(idx) => &s[idx + 1..],
        None => s,
    };
    match s.rfind("```") {
        Some(idx) => s[..idx].trim(),
        None => s.trim(),
    }
}

/// Finds the first JSON array in the text, tolerating code fences and
/// surrounding prose. Returns `None` when no array is present.
pub fn extract_json_array(s: &str) -> Option<&str> {
    let s = strip_fences(s);
    let start = s.find('[')?;
    let end = s.rfind(']')?;
    if end <= start {
        return None;
    }
    Some(&s[start..=end])
}

/// Finds the first JSON object in the text, tolerating code fences and
/// surrounding prose.
pub fn extract_json_object(s: &str) -> Option<&str> {
    let s = strip_fences(s);
    let start = s.find('{')?;
    let end = s.rfind('}')?;
    if end <= start {
        return None;
    }
    Some(&s[start..=end])
}

/// Parses the decompose response into sub-tasks. Returns `None` when the
/// response carries no parseable, non-empty array.
pub fn parse_sub_tasks(response: &str) -> Option<Vec<SubTask>> {
    let json = extract_json_array(response)?;
    let tasks: Vec<SubTask> = serde_json::from_str(json).ok()?;
    if tasks.is_empty() {
        return None;
    }
    Some(tasks)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_fenced_array() {
        let raw = "```json\n[{\"title\":\"A\",\"description\":\"B\"}]\n```";
        let got = extract_json_array(raw).unwrap();
        assert!(got.starts_with('['));
        assert!(got.ends_with(']'));
    }

    #[test]
    fn extracts_array_with_surrounding_prose() {
        let raw = "Here you go:\n[{\"title\":\"T\",\"description\":\"D\"}]\nEnjoy.";
        let tasks = parse_sub_tasks(raw).unwrap();
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].title, "T");
    }

    #[test]
    fn rejects_text_without_array() {
        assert!(parse_sub_tasks("not json").is_none());
        assert!(parse_sub_tasks("").is_none());
    }

    #[test]
    fn rejects_empty_array() {
        assert!(parse_sub_tasks("[]").is_none());
    }

    #[test]
    fn extracts_fenced_object() {
        let raw = "```\n{\"action\":\"ignore\"}\n```";
        assert_eq!(extract_json_object(raw).unwrap(), "{\"action\":\"ignore\"}");
    }
}
