// Heuristic Scorer
// Offline AI-likeness estimate from surface statistics.
//
// Each signal fires independently and contributes a fixed weight. The sum is
// capped, a small random jitter is added so repeated runs do not produce the
// exact same number, and the result lands in [0, 99]. This is the
// always-available fallback, not a calibrated detector.

use rand::Rng;
use regex::Regex;
use std::sync::OnceLock;

use crate::models::{Confidence, DetectionPattern, DetectionResult};
use crate::services::text_processor::{ngram_repeat_rate, split_sentences, word_tokens};

const PRE_JITTER_CAP: i32 = 90;
const SCORE_CEILING: i32 = 99;
const DEFAULT_JITTER_MAX: i32 = 10;
const SHORT_TEXT_CHARS: usize = 200;
const SHORT_TEXT_FLOOR: i32 = 40;
const LONG_SENTENCE_WORDS: usize = 30;

const TRANSITION_WORDS: &[&str] = &[
    "furthermore",
    "moreover",
    "additionally",
    "consequently",
    "therefore",
    "thus",
    "hence",
    "nevertheless",
    "nonetheless",
    "in conclusion",
    "ultimately",
    "notably",
    "importantly",
    "in addition",
    "as a result",
];

const CASUAL_TOKENS: &[&str] = &[
    "lol", "gonna", "wanna", "kinda", "sorta", "yeah", "ok", "okay", "btw", "tbh", "imo", "um",
    "uh", "hmm", "dunno", "stuff", "pretty much", "anyway",
];

fn contraction_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)\b\w+'(t|s|re|ve|ll|d|m)\b").unwrap()
    })
}

fn comma_list_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    // Three or more short comma-separated items in a row: "speed, cost, safety, and scale"
    RE.get_or_init(|| Regex::new(r"(?:\b\w+(?:\s+\w+){0,2},\s+){3,}").unwrap())
}

fn transition_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        let alternatives = TRANSITION_WORDS.join("|");
        Regex::new(&format!(r"(?i)\b(?:{})\b", alternatives)).unwrap()
    })
}

fn casual_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        let alternatives = CASUAL_TOKENS.join("|");
        Regex::new(&format!(r"(?i)\b(?:{})\b", alternatives)).unwrap()
    })
}

/// One fired pattern signal.
#[derive(Debug, Clone, PartialEq)]
pub struct SignalHit {
    pub id: &'static str,
    pub weight: i32,
    pub description: String,
    pub examples: Vec<String>,
    pub advice: &'static str,
}

/// Deterministic part of a score: fired signals and their capped sum.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct HeuristicBreakdown {
    pub signals: Vec<SignalHit>,
    /// Sum of signal weights, capped at 90.
    pub base_score: i32,
    pub char_count: usize,
}

#[derive(Debug, Clone)]
pub struct HeuristicScorer {
    jitter_max: i32,
}

impl Default for HeuristicScorer {
    fn default() -> Self {
        Self {
            jitter_max: DEFAULT_JITTER_MAX,
        }
    }
}

impl HeuristicScorer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Scorer without the random jitter term; handy for reproducible output.
    pub fn without_jitter() -> Self {
        Self { jitter_max: 0 }
    }

    /// AI-likeness score in [0, 99]. Never fails.
    pub fn score(&self, text: &str) -> i32 {
        let breakdown = self.breakdown(text);
        let jitter = if self.jitter_max > 0 {
            rand::thread_rng().gen_range(0..=self.jitter_max)
        } else {
            0
        };
        finalize_score(breakdown.base_score, jitter, breakdown.char_count)
    }

    /// Run every signal and return those that fired.
    pub fn breakdown(&self, text: &str) -> HeuristicBreakdown {
        let char_count = text.chars().count();
        let tokens = word_tokens(text);
        let sentences = split_sentences(text);
        let mut signals = Vec::new();

        // Repeated phrases
        let repeat_rate = ngram_repeat_rate(&tokens, 3);
        if repeat_rate > 0.05 {
            signals.push(SignalHit {
                id: "repeated_phrases",
                weight: if repeat_rate > 0.15 { 15 } else { 8 },
                description: format!("{:.0}% of three-word phrases repeat", repeat_rate * 100.0),
                examples: vec![],
                advice: "Vary phrasing instead of reusing the same word sequences.",
            });
        }

        // Sentence openings: every sentence capitalized, one per terminal mark
        let terminal_count = text.chars().filter(|c| matches!(c, '.' | '!' | '?')).count();
        let capitalized = sentences
            .iter()
            .filter(|s| s.chars().find(|c| c.is_alphabetic()).map_or(false, |c| c.is_uppercase()))
            .count();
        if sentences.len() >= 3 && terminal_count > 0 {
            let regularity = capitalized as f64 / terminal_count as f64;
            if (0.9..=1.1).contains(&regularity) {
                signals.push(SignalHit {
                    id: "uniform_sentence_openings",
                    weight: 10,
                    description: "Every sentence opens and closes in textbook form".to_string(),
                    examples: vec![],
                    advice: "Mix in fragments, run-ons or lowercase asides.",
                });
            }
        }

        // Very long sentences
        let long_sentences: Vec<&String> = sentences
            .iter()
            .filter(|s| s.split_whitespace().count() > LONG_SENTENCE_WORDS)
            .collect();
        if !long_sentences.is_empty() {
            signals.push(SignalHit {
                id: "long_sentences",
                weight: (long_sentences.len() as i32 * 5).min(15),
                description: format!(
                    "{} sentence(s) longer than {} words",
                    long_sentences.len(),
                    LONG_SENTENCE_WORDS
                ),
                examples: long_sentences.iter().take(2).map(|s| preview(s, 80)).collect(),
                advice: "Break long sentences apart.",
            });
        }

        // Formal transitions
        let transitions: Vec<String> = transition_re()
            .find_iter(text)
            .map(|m| m.as_str().to_string())
            .collect();
        if !transitions.is_empty() {
            signals.push(SignalHit {
                id: "formal_transitions",
                weight: (transitions.len() as i32 * 4).min(20),
                description: format!("{} formal transition word(s)", transitions.len()),
                examples: transitions.iter().take(3).cloned().collect(),
                advice: "Replace formal connectors with plain ones like 'so' or 'but'.",
            });
        }

        // No contractions in a text long enough to expect some
        if tokens.len() > 50 && !contraction_re().is_match(text) {
            signals.push(SignalHit {
                id: "no_contractions",
                weight: 10,
                description: "No contractions in a long passage".to_string(),
                examples: vec![],
                advice: "Use contractions such as don't, it's, we're.",
            });
        }

        // Parallel comma lists
        let lists: Vec<String> = comma_list_re()
            .find_iter(text)
            .map(|m| preview(m.as_str(), 60))
            .collect();
        if !lists.is_empty() {
            signals.push(SignalHit {
                id: "parallel_lists",
                weight: (lists.len() as i32 * 5).min(10),
                description: format!("{} long comma-separated list(s)", lists.len()),
                examples: lists.into_iter().take(2).collect(),
                advice: "Cut lists down or spread them across sentences.",
            });
        }

        // Periods only, never an exclamation or question
        let periods = text.matches('.').count();
        let expressive = text.chars().filter(|c| matches!(c, '!' | '?')).count();
        if periods > 5 && expressive == 0 {
            signals.push(SignalHit {
                id: "flat_punctuation",
                weight: 8,
                description: format!("{} periods and no questions or exclamations", periods),
                examples: vec![],
                advice: "Ask a question or react to something.",
            });
        }

        // Perfectly balanced quotes
        let double_quotes = text.matches('"').count();
        let apostrophes = text.matches('\'').count();
        if double_quotes % 2 == 0 && (apostrophes == 0 || double_quotes > 0) {
            signals.push(SignalHit {
                id: "balanced_quotes",
                weight: 5,
                description: "Quotation marks are perfectly balanced".to_string(),
                examples: vec![],
                advice: "",
            });
        }

        // No casual or sloppy tokens
        if char_count > 100 && !casual_re().is_match(text) {
            signals.push(SignalHit {
                id: "no_casual_tokens",
                weight: 10,
                description: "No casual words or informal slips".to_string(),
                examples: vec![],
                advice: "Let a casual word or two slip in.",
            });
        }

        let base_score = signals
            .iter()
            .map(|s| s.weight)
            .sum::<i32>()
            .min(PRE_JITTER_CAP);

        HeuristicBreakdown {
            signals,
            base_score,
            char_count,
        }
    }

    /// Full detection result built from the signal breakdown.
    pub fn analyze(&self, text: &str) -> DetectionResult {
        let breakdown = self.breakdown(text);
        let jitter = if self.jitter_max > 0 {
            rand::thread_rng().gen_range(0..=self.jitter_max)
        } else {
            0
        };
        let score = finalize_score(breakdown.base_score, jitter, breakdown.char_count);

        // A heuristic never earns high confidence.
        let confidence = match Confidence::from_score(score) {
            Confidence::High => Confidence::Medium,
            other => other,
        };

        let patterns = breakdown
            .signals
            .iter()
            .map(|s| DetectionPattern {
                pattern: s.id.to_string(),
                description: s.description.clone(),
                examples: if s.examples.is_empty() {
                    None
                } else {
                    Some(s.examples.clone())
                },
            })
            .collect();

        let suggestions = breakdown
            .signals
            .iter()
            .filter(|s| !s.advice.is_empty())
            .map(|s| s.advice.to_string())
            .collect();

        DetectionResult {
            score,
            confidence,
            analysis: format!(
                "Local heuristic estimate from {} surface signal(s){}",
                breakdown.signals.len(),
                if breakdown.char_count < SHORT_TEXT_CHARS {
                    "; text is short, so the estimate is weak"
                } else {
                    ""
                }
            ),
            patterns,
            suggestions,
        }
    }
}

/// Add jitter, apply the short-text floor and clamp into [0, 99].
fn finalize_score(base: i32, jitter: i32, char_count: usize) -> i32 {
    let mut score = base.min(PRE_JITTER_CAP) + jitter.max(0);
    if char_count < SHORT_TEXT_CHARS {
        score = score.max(SHORT_TEXT_FLOOR);
    }
    score.clamp(0, SCORE_CEILING)
}

fn preview(s: &str, max_chars: usize) -> String {
    let mut out: String = s.chars().take(max_chars).collect();
    if s.chars().count() > max_chars {
        out.push_str("...");
    }
    out
}
