// Heuristic Rewriter
// Offline perturbation of text toward human-like surface statistics.
//
// Unconditional steps: negative contractions, formal-to-casual synonyms.
// Probabilistic steps (per sentence): clause split or comma splice, filler
// phrase, synthetic typo; plus an occasional duplicated function word.
// Output is intentionally not reproducible between runs.

use rand::seq::SliceRandom;
use rand::Rng;
use regex::{Captures, Regex};
use std::collections::HashMap;
use std::sync::OnceLock;

use crate::services::text_processor::{capitalize_first, split_sentences};

const CONTRACTIONS: &[(&str, &str)] = &[
    ("cannot", "can't"),
    ("can not", "can't"),
    ("do not", "don't"),
    ("does not", "doesn't"),
    ("did not", "didn't"),
    ("is not", "isn't"),
    ("are not", "aren't"),
    ("was not", "wasn't"),
    ("were not", "weren't"),
    ("will not", "won't"),
    ("would not", "wouldn't"),
    ("should not", "shouldn't"),
    ("could not", "couldn't"),
    ("must not", "mustn't"),
    ("have not", "haven't"),
    ("has not", "hasn't"),
    ("had not", "hadn't"),
    ("need not", "needn't"),
];

const CASUAL_SYNONYMS: &[(&str, &str)] = &[
    ("utilize", "use"),
    ("utilizes", "uses"),
    ("utilized", "used"),
    ("utilizing", "using"),
    ("utilization", "use"),
    ("therefore", "so"),
    ("thus", "so"),
    ("consequently", "so"),
    ("however", "but"),
    ("nevertheless", "still"),
    ("nonetheless", "still"),
    ("furthermore", "also"),
    ("additionally", "also"),
    ("moreover", "plus"),
    ("approximately", "about"),
    ("numerous", "lots of"),
    ("commence", "start"),
    ("commences", "starts"),
    ("facilitate", "help"),
    ("facilitates", "helps"),
    ("demonstrate", "show"),
    ("demonstrates", "shows"),
    ("obtain", "get"),
    ("obtains", "gets"),
    ("purchase", "buy"),
    ("sufficient", "enough"),
    ("assist", "help"),
    ("assists", "helps"),
    ("endeavor", "try"),
    ("subsequently", "later"),
    ("individuals", "people"),
    ("regarding", "about"),
    ("in order to", "to"),
    ("prior to", "before"),
    ("in addition", "also"),
    ("as a result", "so"),
    ("leverage", "use"),
    ("leverages", "uses"),
];

const FILLER_OPENERS: &[&str] = &[
    "Honestly,",
    "Well,",
    "Actually,",
    "Basically,",
    "You know,",
    "To be fair,",
    "I mean,",
];

const FILLER_INSERTS: &[&str] = &["you know,", "I think,", "kind of", "more or less,", "honestly,"];

const FUNCTION_WORDS: &[&str] = &["the", "a", "to", "and", "of", "in", "is", "it"];

// Sentence openers safe to lowercase after a filler. Anything else may be a name.
const LOWERCASE_OPENERS: &[&str] = &[
    "the", "a", "an", "this", "that", "these", "those", "it", "its", "we", "they", "there", "you",
    "he", "she", "our", "my", "your", "their", "in", "on", "at", "for", "with", "as", "when", "if",
    "but", "and", "so", "some", "many", "most", "all", "every", "each", "because", "after",
    "before", "while", "what", "how", "why", "not", "no", "one", "don", "doesn", "can",
    "isn", "aren", "wasn", "let",
];

fn build_alternation(pairs: &[(&str, &str)]) -> Regex {
    let mut keys: Vec<&str> = pairs.iter().map(|(k, _)| *k).collect();
    // Longest first so multi-word phrases win over their prefixes.
    keys.sort_by_key(|k| std::cmp::Reverse(k.len()));
    let alternatives = keys
        .iter()
        .map(|k| k.replace(' ', r"\s+"))
        .collect::<Vec<_>>()
        .join("|");
    Regex::new(&format!(r"(?i)\b(?:{})\b", alternatives)).unwrap()
}

fn contraction_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| build_alternation(CONTRACTIONS))
}

fn synonym_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| build_alternation(CASUAL_SYNONYMS))
}

fn lookup(pairs: &'static [(&'static str, &'static str)]) -> HashMap<&'static str, &'static str> {
    pairs.iter().copied().collect()
}

fn contraction_map() -> &'static HashMap<&'static str, &'static str> {
    static MAP: OnceLock<HashMap<&'static str, &'static str>> = OnceLock::new();
    MAP.get_or_init(|| lookup(CONTRACTIONS))
}

fn synonym_map() -> &'static HashMap<&'static str, &'static str> {
    static MAP: OnceLock<HashMap<&'static str, &'static str>> = OnceLock::new();
    MAP.get_or_init(|| lookup(CASUAL_SYNONYMS))
}

fn double_space_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r" {2,}").unwrap())
}

/// Carry the casing of `original` over to `replacement`.
fn match_case(original: &str, replacement: &str) -> String {
    let letters: Vec<char> = original.chars().filter(|c| c.is_alphabetic()).collect();
    if letters.len() > 1 && letters.iter().all(|c| c.is_uppercase()) {
        return replacement.to_uppercase();
    }
    if original.chars().next().map_or(false, |c| c.is_uppercase()) {
        return capitalize_first(replacement);
    }
    replacement.to_string()
}

fn replace_from(re: &Regex, map: &HashMap<&'static str, &'static str>, text: &str) -> String {
    re.replace_all(text, |caps: &Captures| {
        let matched = &caps[0];
        let key = matched
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
            .to_lowercase();
        match map.get(key.as_str()) {
            Some(replacement) => match_case(matched, replacement),
            None => matched.to_string(),
        }
    })
    .into_owned()
}

/// Contract negative auxiliaries ("cannot" -> "can't"). Unconditional.
pub fn apply_contractions(text: &str) -> String {
    replace_from(contraction_re(), contraction_map(), text)
}

/// Swap formal words for casual synonyms ("utilizes" -> "uses"). Unconditional.
pub fn apply_casual_synonyms(text: &str) -> String {
    replace_from(synonym_re(), synonym_map(), text)
}

/// Per-sentence odds of each probabilistic perturbation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RewriteProbabilities {
    pub split_long_sentence: f64,
    pub comma_splice: f64,
    pub filler: f64,
    pub typo: f64,
    pub duplicate_word: f64,
}

impl Default for RewriteProbabilities {
    fn default() -> Self {
        Self {
            split_long_sentence: 0.3,
            comma_splice: 0.15,
            filler: 0.2,
            typo: 0.05,
            duplicate_word: 0.05,
        }
    }
}

impl RewriteProbabilities {
    /// Only the unconditional substitutions run.
    pub fn none() -> Self {
        Self {
            split_long_sentence: 0.0,
            comma_splice: 0.0,
            filler: 0.0,
            typo: 0.0,
            duplicate_word: 0.0,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct HeuristicRewriter {
    probabilities: RewriteProbabilities,
}

impl HeuristicRewriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Out-of-range probabilities are clamped into [0, 1]; NaN counts as 0.
    pub fn with_probabilities(probabilities: RewriteProbabilities) -> Self {
        let clamp = |p: f64| if p.is_nan() { 0.0 } else { p.clamp(0.0, 1.0) };
        Self {
            probabilities: RewriteProbabilities {
                split_long_sentence: clamp(probabilities.split_long_sentence),
                comma_splice: clamp(probabilities.comma_splice),
                filler: clamp(probabilities.filler),
                typo: clamp(probabilities.typo),
                duplicate_word: clamp(probabilities.duplicate_word),
            },
        }
    }

    /// Rewrite with the thread-local RNG. Never fails.
    pub fn rewrite(&self, text: &str) -> String {
        self.rewrite_with_rng(text, &mut rand::thread_rng())
    }

    /// Rewrite paragraph by paragraph, keeping line structure intact.
    pub fn rewrite_with_rng<R: Rng + ?Sized>(&self, text: &str, rng: &mut R) -> String {
        text.split('\n')
            .map(|line| {
                if line.trim().is_empty() {
                    line.to_string()
                } else {
                    self.rewrite_paragraph(line, rng)
                }
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn rewrite_paragraph<R: Rng + ?Sized>(&self, paragraph: &str, rng: &mut R) -> String {
        let p = &self.probabilities;
        let mut sentences: Vec<String> = Vec::new();

        for sentence in split_sentences(paragraph) {
            let mut s = apply_contractions(&sentence);
            s = apply_casual_synonyms(&s);

            let word_count = s.split_whitespace().count();
            if word_count >= 16 && rng.gen_bool(p.split_long_sentence) {
                s = split_at_midpoint(&s);
            } else if word_count >= 8 && rng.gen_bool(p.comma_splice) {
                s = comma_splice_at_midpoint(&s);
            }

            if rng.gen_bool(p.filler) {
                s = add_filler(&s, rng);
            }

            if rng.gen_bool(p.typo) {
                s = add_typo(&s, rng);
            }

            sentences.push(s);
        }

        let mut joined = sentences.join(" ");
        if rng.gen_bool(p.duplicate_word) {
            joined = duplicate_function_word(&joined, rng);
        }
        double_space_re().replace_all(&joined, " ").into_owned()
    }
}

/// Word index nearest the middle that can take a boundary after it.
fn midpoint_index(words: &[&str]) -> Option<usize> {
    if words.len() < 4 {
        return None;
    }
    let mid = words.len() / 2;
    (0..words.len() - 2)
        .filter(|&i| i >= 1)
        .filter(|&i| !words[i].ends_with(|c: char| c.is_ascii_punctuation()))
        .min_by_key(|&i| (i as isize - mid as isize).abs())
}

fn split_at_midpoint(sentence: &str) -> String {
    let words: Vec<&str> = sentence.split_whitespace().collect();
    let Some(idx) = midpoint_index(&words) else {
        return sentence.to_string();
    };
    let first = words[..=idx].join(" ");
    let rest = words[idx + 1..].join(" ");
    format!("{}. {}", first, capitalize_first(&rest))
}

fn comma_splice_at_midpoint(sentence: &str) -> String {
    let words: Vec<&str> = sentence.split_whitespace().collect();
    let Some(idx) = midpoint_index(&words) else {
        return sentence.to_string();
    };
    let first = words[..=idx].join(" ");
    let rest = words[idx + 1..].join(" ");
    format!("{}, {}", first, rest)
}

fn lowercase_first_word(sentence: &str) -> String {
    let first_word = sentence.split_whitespace().next().unwrap_or_default();
    let bare = first_word.trim_matches(|c: char| !c.is_alphanumeric());
    let stem = bare.split('\'').next().unwrap_or_default().to_lowercase();
    if !LOWERCASE_OPENERS.contains(&stem.as_str()) {
        return sentence.to_string();
    }
    let mut chars = sentence.chars();
    match chars.next() {
        Some(c) => c.to_lowercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn add_filler<R: Rng + ?Sized>(sentence: &str, rng: &mut R) -> String {
    if let (true, Some(comma)) = (rng.gen_bool(0.5), sentence.find(", ")) {
        if let Some(insert) = FILLER_INSERTS.choose(rng) {
            let (head, tail) = sentence.split_at(comma + 2);
            return format!("{}{} {}", head, insert, tail);
        }
    }
    match FILLER_OPENERS.choose(rng) {
        Some(opener) => format!("{} {}", opener, lowercase_first_word(sentence)),
        None => sentence.to_string(),
    }
}

/// Swap, drop or double one character inside a word longer than three letters.
fn add_typo<R: Rng + ?Sized>(sentence: &str, rng: &mut R) -> String {
    let words: Vec<&str> = sentence.split(' ').collect();
    let candidates: Vec<usize> = words
        .iter()
        .enumerate()
        .filter(|(_, w)| w.chars().count() > 3 && w.chars().all(|c| c.is_alphabetic()))
        .map(|(i, _)| i)
        .collect();
    let Some(&target) = candidates.choose(rng) else {
        return sentence.to_string();
    };

    let mut chars: Vec<char> = words[target].chars().collect();
    // Never touch the first letter; keeps capitalization and readability.
    let pos = rng.gen_range(1..chars.len() - 1);
    match rng.gen_range(0..3) {
        0 if chars[pos] != chars[pos + 1] => chars.swap(pos, pos + 1),
        1 => {
            chars.remove(pos);
        }
        _ => {
            let doubled = chars[pos];
            chars.insert(pos, doubled);
        }
    }

    let mut out: Vec<String> = words.iter().map(|w| w.to_string()).collect();
    out[target] = chars.into_iter().collect();
    out.join(" ")
}

fn duplicate_function_word<R: Rng + ?Sized>(text: &str, rng: &mut R) -> String {
    let words: Vec<&str> = text.split(' ').collect();
    let candidates: Vec<usize> = words
        .iter()
        .enumerate()
        .filter(|(_, w)| FUNCTION_WORDS.contains(&w.to_lowercase().as_str()))
        .map(|(i, _)| i)
        .collect();
    let Some(&target) = candidates.choose(rng) else {
        return text.to_string();
    };
    let mut out: Vec<&str> = Vec::with_capacity(words.len() + 1);
    for (i, w) in words.iter().enumerate() {
        out.push(*w);
        if i == target {
            out.push(*w);
        }
    }
    out.join(" ")
}
