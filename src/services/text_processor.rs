// Text Processing Service
// Whitespace normalisation, sentence splitting and language sniffing

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::OnceLock;

fn horizontal_ws_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[ \t\x0C\x0B\u{3000}\u{00A0}]+").unwrap())
}

fn any_ws_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\s+").unwrap())
}

fn sentence_break_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"([.!?。！？])\s+").unwrap())
}

fn word_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[A-Za-z0-9_']+|[\u{4e00}-\u{9fff}]").unwrap())
}

/// Normalize punctuation and spacing (smart quotes, odd spaces, line endings)
pub fn normalize_punctuation(text: &str) -> String {
    if text.is_empty() {
        return String::new();
    }

    let s = text
        .replace(['\u{201c}', '\u{201d}'], "\"")
        .replace(['\u{2018}', '\u{2019}'], "'")
        .replace("\r\n", "\n")
        .replace('\r', "\n");

    let s = horizontal_ws_re().replace_all(&s, " ");

    s.lines()
        .map(|ln| ln.trim())
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string()
}

/// Collapse every whitespace run (newlines included) into a single space.
pub fn collapse_whitespace(text: &str) -> String {
    any_ws_re().replace_all(text.trim(), " ").to_string()
}

/// First `max_chars` characters of the whitespace-collapsed text.
pub fn excerpt(text: &str, max_chars: usize) -> String {
    collapse_whitespace(text).chars().take(max_chars).collect()
}

/// Split on sentence-final punctuation followed by whitespace.
/// The punctuation stays with its sentence.
pub fn split_sentences(text: &str) -> Vec<String> {
    if text.trim().is_empty() {
        return vec![];
    }

    let marked = sentence_break_re().replace_all(text.trim(), "$1\x00");
    marked
        .split('\x00')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
        .collect()
}

/// Word tokens (latin words or single CJK ideographs), lowercased.
pub fn word_tokens(text: &str) -> Vec<String> {
    word_re()
        .find_iter(text)
        .map(|m| m.as_str().to_lowercase())
        .collect()
}

/// Fraction of n-grams that repeat an earlier n-gram.
pub fn ngram_repeat_rate(tokens: &[String], n: usize) -> f64 {
    if n == 0 || tokens.len() < n + 1 {
        return 0.0;
    }
    let mut counts: HashMap<&[String], usize> = HashMap::new();
    let mut total = 0usize;
    for window in tokens.windows(n) {
        *counts.entry(window).or_insert(0) += 1;
        total += 1;
    }
    let repeats = counts.values().filter(|&&c| c >= 2).map(|&c| c - 1).sum::<usize>();
    repeats as f64 / total.max(1) as f64
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DetectedLanguage {
    #[default]
    English,
    Chinese,
}

impl DetectedLanguage {
    pub fn code(&self) -> &'static str {
        match self {
            Self::English => "en",
            Self::Chinese => "zh",
        }
    }
}

/// Character-class language sniffing: CJK-heavy text is Chinese, anything else English.
pub fn detect_language(text: &str) -> DetectedLanguage {
    let chinese_count = text
        .chars()
        .filter(|c| ('\u{4e00}'..='\u{9fff}').contains(c))
        .count();
    let total_chars = text.chars().filter(|c| !c.is_whitespace()).count();

    if total_chars > 0 && chinese_count as f64 / total_chars as f64 > 0.3 {
        DetectedLanguage::Chinese
    } else {
        DetectedLanguage::English
    }
}

/// Uppercase the first alphabetic character, leaving the rest untouched.
pub fn capitalize_first(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut done = false;
    for ch in s.chars() {
        if !done && ch.is_alphabetic() {
            out.extend(ch.to_uppercase());
            done = true;
        } else {
            out.push(ch);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_punctuation() {
        let input = "Hello\u{201c}World\u{201d}\r\n  it\u{2019}s  fine ";
        let output = normalize_punctuation(input);
        assert_eq!(output, "Hello\"World\"\nit's fine");
    }

    #[test]
    fn test_excerpt_collapses_and_truncates() {
        assert_eq!(excerpt("  a\n\n b\tc  ", 100), "a b c");
        assert_eq!(excerpt("abcdef", 3), "abc");
    }

    #[test]
    fn test_split_sentences() {
        let sentences = split_sentences("First one. Second one! Third? tail");
        assert_eq!(sentences, vec!["First one.", "Second one!", "Third?", "tail"]);
    }

    #[test]
    fn test_split_sentences_keeps_decimals() {
        let sentences = split_sentences("Pi is 3.14 roughly. Yes.");
        assert_eq!(sentences.len(), 2);
    }

    #[test]
    fn test_detect_language() {
        assert_eq!(detect_language("This is English."), DetectedLanguage::English);
        assert_eq!(detect_language("这是一个中文句子。"), DetectedLanguage::Chinese);
        assert_eq!(detect_language(""), DetectedLanguage::English);
    }

    #[test]
    fn test_ngram_repeat_rate() {
        let tokens = word_tokens("a b c a b c a b c");
        assert!(ngram_repeat_rate(&tokens, 3) > 0.5);
        assert_eq!(ngram_repeat_rate(&word_tokens("one two"), 3), 0.0);
    }

    #[test]
    fn test_capitalize_first() {
        assert_eq!(capitalize_first("\"so it goes"), "\"So it goes");
        assert_eq!(capitalize_first(""), "");
    }
}
