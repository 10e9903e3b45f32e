//! Text cleanup and metadata heuristics for incoming documents.
//!
//! These are cheap, rule-based extractors: a title guess from the first
//! lines, the abstract block, declared keywords (or frequent terms when none
//! are declared) and the opening sentence.

mod extract;

pub use extract::{PlainTextExtractor, TextExtractor, is_supported};

use regex::Regex;
use std::collections::HashMap;
use std::sync::LazyLock;

/// Maximum characters kept from an abstract.
pub const ABSTRACT_LIMIT: usize = 1200;

/// Maximum keywords kept per document.
pub const KEYWORD_LIMIT: usize = 8;

/// Cleaned text shorter than this is rejected.
pub const MIN_TEXT_CHARS: usize = 50;

static HORIZONTAL_SPACE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^\S\r\n]+").expect("Invalid regex"));
static EXCESS_NEWLINES: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n{3,}").expect("Invalid regex"));
static ABSTRACT_MARKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(abstract|摘要)[:：]?\s*").expect("Invalid regex"));
static ABSTRACT_STOP: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\n\s*(introduction|1\s+introduction|关键词|keywords)[:：]?\s*")
        .expect("Invalid regex")
});
static KEYWORDS_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(keywords|关键词)[:：]\s*(.+)").expect("Invalid regex"));
static KEYWORD_SEPARATOR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[;,，、\n]").expect("Invalid regex"));
static SENTENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^.!?。！？]+[.!?。！？]").expect("Invalid regex"));
static WORD: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\b\w\w+\b").expect("Invalid regex"));

/// Normalize whitespace: NULs become spaces, horizontal runs collapse to one
/// space, three or more newlines collapse to two.
pub fn clean_text(text: &str) -> String {
    let text = text.replace('\0', " ");
    let text = HORIZONTAL_SPACE.replace_all(&text, " ");
    let text = EXCESS_NEWLINES.replace_all(&text, "\n\n");
    text.trim().to_string()
}

/// Filename without directories or a known document extension.
pub fn safe_stem(filename: &str) -> String {
    let name = filename.rsplit(['/', '\\']).next().unwrap_or(filename);
    let stem = [".pdf", ".txt", ".md"]
        .iter()
        .find_map(|ext| {
            let split = name.len().checked_sub(ext.len())?;
            name.get(split..)
                .filter(|tail| tail.eq_ignore_ascii_case(ext))
                .map(|_| &name[..split])
        })
        .unwrap_or(name);

    match stem.trim() {
        "" => "Untitled".to_string(),
        trimmed => trimmed.to_string(),
    }
}

/// Longest of the first 20 non-empty lines that is 8 to 200 characters long.
pub fn extract_title(text: &str, fallback: &str) -> String {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .take(20)
        .filter(|line| (8..=200).contains(&line.chars().count()))
        .fold(None::<&str>, |best, line| match best {
            Some(b) if b.chars().count() >= line.chars().count() => Some(b),
            _ => Some(line),
        })
        .map_or_else(|| fallback.to_string(), str::to_string)
}

/// Text following an "Abstract" marker, up to the next introduction or
/// keywords heading. Without a marker, the start of the text.
pub fn extract_abstract(text: &str) -> String {
    let Some(marker) = ABSTRACT_MARKER.find(text) else {
        return truncate_chars(text, ABSTRACT_LIMIT).trim().to_string();
    };

    let mut tail = &text[marker.end()..];
    if let Some(stop) = ABSTRACT_STOP.find(tail) {
        tail = &tail[..stop.start()];
    }
    truncate_chars(tail.trim(), ABSTRACT_LIMIT).to_string()
}

/// Keywords declared on a "Keywords:" line.
pub fn extract_keywords(text: &str) -> Vec<String> {
    let Some(captures) = KEYWORDS_LINE.captures(text) else {
        return Vec::new();
    };
    let raw = captures.get(2).map_or("", |m| m.as_str());

    KEYWORD_SEPARATOR
        .split(raw)
        .map(str::trim)
        .filter(|k| !k.is_empty())
        .take(KEYWORD_LIMIT)
        .map(str::to_string)
        .collect()
}

/// Most frequent unigrams and bigrams, ties broken alphabetically.
pub fn frequent_terms(text: &str, limit: usize) -> Vec<String> {
    let lowered = text.to_lowercase();
    let tokens: Vec<&str> = WORD.find_iter(&lowered).map(|m| m.as_str()).collect();

    let mut counts: HashMap<String, usize> = HashMap::new();
    for token in &tokens {
        *counts.entry((*token).to_string()).or_default() += 1;
    }
    for pair in tokens.windows(2) {
        *counts.entry(format!("{} {}", pair[0], pair[1])).or_default() += 1;
    }

    let mut terms: Vec<(String, usize)> = counts.into_iter().collect();
    terms.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    terms.into_iter().take(limit).map(|(term, _)| term).collect()
}

/// First sentence, or the first 100 characters followed by "...".
pub fn first_sentence(text: &str) -> String {
    if text.is_empty() {
        return String::new();
    }
    match SENTENCE.find(text) {
        Some(m) => m.as_str().trim().to_string(),
        None => format!("{}...", truncate_chars(text, 100).trim()),
    }
}

fn truncate_chars(text: &str, limit: usize) -> &str {
    match text.char_indices().nth(limit) {
        Some((index, _)) => &text[..index],
        None => text,
    }
}
