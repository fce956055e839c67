//! Heuristic intent extraction from free-text requests.
//!
//! The keyword tables below are coarse domain heuristics. A request is scored
//! against each table by substring presence, so "reader" counts as "read".

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

/// Domain categories in declaration order. Ties resolve to the earliest entry.
const DOMAIN_KEYWORDS: &[(&str, &[&str])] = &[
    (
        "data-transform",
        &["convert", "transform", "parse", "extract", "process", "format"],
    ),
    (
        "monitoring",
        &["monitor", "watch", "track", "observe", "check", "alert"],
    ),
    (
        "automation",
        &["automate", "schedule", "trigger", "run", "execute"],
    ),
    (
        "communication",
        &["send", "email", "message", "notify", "post", "tweet"],
    ),
    (
        "file-handling",
        &["read", "write", "save", "load", "file", "document"],
    ),
    ("web", &["scrape", "fetch", "download", "crawl", "web", "http"]),
    ("ai", &["generate", "analyze", "predict", "classify", "summarize"]),
    ("system", &["command", "shell", "execute", "run", "script"]),
];

/// Verbs checked in order; the first one present wins.
const ACTION_VERBS: &[&str] = &[
    "read", "write", "convert", "parse", "send", "fetch", "monitor", "run", "create", "delete",
];

const FILE_FORMATS: &[&str] = &[
    "pdf", "csv", "json", "xml", "yaml", "excel", "docx", "txt", "md",
];

pub const DEFAULT_CATEGORY: &str = "general";
pub const DEFAULT_ACTION: &str = "process";

/// Minimum keyword length is exclusive: a token needs at least four characters.
const MIN_KEYWORD_CHARS: usize = 3;

#[allow(clippy::expect_used)]
static WORD_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\b\w+\b").expect("valid regex"));

/// Acronyms such as `PDF` or `AWS`.
#[allow(clippy::expect_used)]
static ACRONYM_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b([A-Z]{2,})\b").expect("valid regex"));

/// CamelCase product names such as `GitHub` or `PostgreSql`.
#[allow(clippy::expect_used)]
static CAMEL_CASE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b([A-Z][a-z]+(?:[A-Z][a-z]+)+)\b").expect("valid regex"));

/// Coarse summary of what a request asks for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Intent {
    pub category: String,
    pub action: String,
    /// File formats and proper nouns, de-duplicated in first-seen order.
    pub entities: Vec<String>,
    /// Lower-cased words longer than three characters, de-duplicated.
    pub keywords: Vec<String>,
}

/// Extract an [`Intent`] from a raw request. Pure function of its input.
pub fn extract_intent(request: &str) -> Intent {
    let lower = request.to_lowercase();

    let mut keywords = Vec::new();
    for word in WORD_RE.find_iter(&lower).map(|m| m.as_str()) {
        if word.chars().count() > MIN_KEYWORD_CHARS {
            push_unique(&mut keywords, word.to_string());
        }
    }

    Intent {
        category: detect_category(&lower).to_string(),
        action: detect_action(&lower).to_string(),
        entities: detect_entities(request, &lower),
        keywords,
    }
}

fn detect_category(lower: &str) -> &'static str {
    let mut best = DEFAULT_CATEGORY;
    let mut best_count = 0;

    for &(category, keywords) in DOMAIN_KEYWORDS {
        let count = keywords.iter().filter(|kw| lower.contains(**kw)).count();
        // Strict comparison keeps the first category reaching the maximum.
        if count > best_count {
            best = category;
            best_count = count;
        }
    }

    best
}

fn detect_action(lower: &str) -> &'static str {
    ACTION_VERBS
        .iter()
        .copied()
        .find(|verb| lower.contains(*verb))
        .unwrap_or(DEFAULT_ACTION)
}

fn detect_entities(original: &str, lower: &str) -> Vec<String> {
    let mut entities = Vec::new();

    for &format in FILE_FORMATS {
        if lower.contains(format) {
            push_unique(&mut entities, format.to_uppercase());
        }
    }

    for re in [&*ACRONYM_RE, &*CAMEL_CASE_RE] {
        for caps in re.captures_iter(original) {
            push_unique(&mut entities, caps[1].to_string());
        }
    }

    entities
}

fn push_unique(items: &mut Vec<String>, item: String) {
    if !items.contains(&item) {
        items.push(item);
    }
}
