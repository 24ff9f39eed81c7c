// [libs/domain/scan-engines/src/monitor/preprocess.rs]

//! The five-step content normalization pipeline (§4.4) run before
//! similarity comparison: whitespace collapse, digit-run placeholders,
//! dynamic-substring stripping, user `ignore_patterns`, and HTML
//! attribute-quote normalization.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::errors::EngineError;

static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("static regex"));
static DIGIT_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d+").expect("static regex"));
static ATTR_QUOTES: Lazy<Regex> = Lazy::new(|| Regex::new(r#"=\s*'([^']*)'"#).expect("static regex"));

/// Timestamp-shaped and nonce-shaped substrings that vary every fetch
/// regardless of genuine content change, stripped before comparison.
const DYNAMIC_PATTERNS: &[&str] = &[
    r"\b\d{4}-\d{2}-\d{2}T\d{2}:\d{2}:\d{2}(\.\d+)?Z?\b",
    r#"csrf[-_]?token["']?\s*[:=]\s*["'][A-Za-z0-9+/=_-]{8,}["']"#,
    r#"nonce["']?\s*[:=]\s*["'][A-Za-z0-9+/=_-]{8,}["']"#,
];

static DYNAMIC_REGEXES: Lazy<Vec<Regex>> =
    Lazy::new(|| DYNAMIC_PATTERNS.iter().map(|p| Regex::new(p).expect("static dynamic regex")).collect());

/// Runs the full pipeline in order: whitespace normalization, digit-run
/// placeholders, dynamic-substring stripping, caller-supplied
/// `ignore_patterns`, then attribute-quote normalization.
pub fn preprocess(raw: &str, ignore_numbers: bool, ignore_patterns: &[String]) -> Result<String, EngineError> {
    let mut text = WHITESPACE.replace_all(raw.trim(), " ").into_owned();

    if ignore_numbers {
        text = DIGIT_RUN.replace_all(&text, "#").into_owned();
    }

    for pattern in DYNAMIC_REGEXES.iter() {
        text = pattern.replace_all(&text, "").into_owned();
    }

    for raw_pattern in ignore_patterns {
        let compiled = Regex::new(raw_pattern).map_err(|e| EngineError::Config(format!("bad ignore_pattern: {e}")))?;
        text = compiled.replace_all(&text, "").into_owned();
    }

    text = ATTR_QUOTES.replace_all(&text, "=\"$1\"").into_owned();
    Ok(text)
}

/// Extracts visible text from an HTML document, dropping script/style
/// content, ahead of [`preprocess`].
pub fn extract_text(html: &str) -> String {
    let document = scraper::Html::parse_document(html);
    let selector = scraper::Selector::parse("body").unwrap_or_else(|_| scraper::Selector::parse("*").unwrap());
    let root = document.select(&selector).next();
    let text: String = match root {
        Some(body) => body.text().collect::<Vec<_>>().join(" "),
        None => document.root_element().text().collect::<Vec<_>>().join(" "),
    };
    text
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn whitespace_collapses_to_single_spaces() {
        let out = preprocess("hello   \n\n  world\t!", false, &[]).unwrap();
        assert_eq!(out, "hello world !");
    }

    #[test]
    fn digit_runs_become_placeholders_when_enabled() {
        let out = preprocess("visitor count: 48213", true, &[]).unwrap();
        assert_eq!(out, "visitor count: #");
    }

    #[test]
    fn digit_runs_survive_when_disabled() {
        let out = preprocess("visitor count: 48213", false, &[]).unwrap();
        assert_eq!(out, "visitor count: 48213");
    }

    #[test]
    fn user_ignore_patterns_are_stripped() {
        let out = preprocess("build: abc123-SECRET", false, &["SECRET".to_string()]).unwrap();
        assert!(!out.contains("SECRET"));
    }

    #[test]
    fn attribute_quotes_normalize_to_double() {
        let out = preprocess("<div class='card'>x</div>", false, &[]).unwrap();
        assert!(out.contains("class=\"card\""));
    }

    #[test]
    fn html_extraction_drops_tags_and_scripts() {
        let html = "<html><body><script>evil()</script><p>Hello</p></body></html>";
        let text = extract_text(html);
        assert!(text.contains("Hello"));
        assert!(!text.contains("evil"));
    }
}
