// [libs/domain/scan-engines/src/monitor/diff.rs]

//! Diff generation for a detected change (§4.4): a line-level unified
//! diff for short content, capped at the first 20 differing line pairs,
//! falling back to a length + keyword summary for long content.

use similar::{ChangeTag, TextDiff};
use std::collections::HashSet;

const SHORT_CONTENT_LIMIT: usize = 10_000;
const MAX_DIFF_LINES: usize = 20;

const COMMON_WORDS: &[&str] = &[
    "this", "that", "with", "from", "have", "your", "about", "which", "their", "will", "would",
    "there", "been", "were", "what", "when", "where", "page", "click", "more",
];

#[derive(Debug, Clone, serde::Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ContentDiff {
    Unified { lines: Vec<String>, truncated: bool },
    Summary { length_delta: i64, added_keywords: Vec<String>, removed_keywords: Vec<String> },
}

/// Builds the diff appropriate for the pair's size.
pub fn build_diff(old: &str, new: &str) -> ContentDiff {
    if old.len() <= SHORT_CONTENT_LIMIT && new.len() <= SHORT_CONTENT_LIMIT {
        unified_diff(old, new)
    } else {
        summary_diff(old, new)
    }
}

fn unified_diff(old: &str, new: &str) -> ContentDiff {
    let diff = TextDiff::from_lines(old, new);
    let mut lines = Vec::new();
    let mut differing = 0usize;
    let mut truncated = false;

    for change in diff.iter_all_changes() {
        let tag = match change.tag() {
            ChangeTag::Delete => Some('-'),
            ChangeTag::Insert => Some('+'),
            ChangeTag::Equal => None,
        };
        match tag {
            Some(prefix) => {
                if differing >= MAX_DIFF_LINES {
                    truncated = true;
                    break;
                }
                lines.push(format!("{prefix}{}", change.value().trim_end_matches('\n')));
                differing += 1;
            }
            None => continue,
        }
    }

    ContentDiff::Unified { lines, truncated }
}

fn summary_diff(old: &str, new: &str) -> ContentDiff {
    let length_delta = new.len() as i64 - old.len() as i64;
    let old_keywords = keyword_set(old);
    let new_keywords = keyword_set(new);

    let mut added: Vec<String> = new_keywords.difference(&old_keywords).cloned().collect();
    let mut removed: Vec<String> = old_keywords.difference(&new_keywords).cloned().collect();
    added.sort();
    removed.sort();

    ContentDiff::Summary { length_delta, added_keywords: added, removed_keywords: removed }
}

fn keyword_set(text: &str) -> HashSet<String> {
    let mut words = HashSet::new();
    let mut current = String::new();
    for ch in text.chars().chain(std::iter::once(' ')) {
        if ch.is_alphanumeric() {
            current.push(ch.to_ascii_lowercase());
        } else if !current.is_empty() {
            let word = std::mem::take(&mut current);
            if word.len() >= 4 && !COMMON_WORDS.contains(&word.as_str()) {
                words.insert(word);
            }
        }
    }
    words
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_content_produces_unified_lines() {
        let diff = build_diff("line one\nline two\n", "line one\nline three\n");
        match diff {
            ContentDiff::Unified { lines, truncated } => {
                assert!(!truncated);
                assert!(lines.iter().any(|l| l.starts_with('-')));
                assert!(lines.iter().any(|l| l.starts_with('+')));
            }
            ContentDiff::Summary { .. } => panic!("expected unified diff for short content"),
        }
    }

    #[test]
    fn long_content_produces_summary() {
        let old = "a".repeat(SHORT_CONTENT_LIMIT + 1);
        let new = format!("{old} extra unique keyword appended");
        match build_diff(&old, &new) {
            ContentDiff::Summary { length_delta, .. } => assert!(length_delta > 0),
            ContentDiff::Unified { .. } => panic!("expected summary diff for long content"),
        }
    }

    #[test]
    fn unified_diff_caps_at_twenty_lines() {
        let old: String = (0..50).map(|i| format!("old-{i}\n")).collect();
        let new: String = (0..50).map(|i| format!("new-{i}\n")).collect();
        match build_diff(&old, &new) {
            ContentDiff::Unified { lines, truncated } => {
                assert!(lines.len() <= MAX_DIFF_LINES);
                assert!(truncated);
            }
            ContentDiff::Summary { .. } => panic!("expected unified diff"),
        }
    }
}
