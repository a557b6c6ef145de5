// Remote Score Response Parsing
// Turns a raw score-service response into a DetectionResult.
// Structured JSON first, then regex extraction of the bare score, then a hard failure.

use regex::Regex;
use serde_json::Value;
use std::sync::OnceLock;
use tracing::warn;

use crate::models::{clamp_score, Confidence, DetectionPattern, DetectionResult};
use crate::services::error::{HumanizeError, HumanizeResult};

const SCORE_KEYS: &[&str] = &["score", "aiScore", "ai_score", "aiLikelihood", "ai_probability", "probability"];
const ANALYSIS_KEYS: &[&str] = &["analysis", "reasoning", "explanation", "summary"];

fn labelled_score_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"(?i)(?:ai[\s_-]*)?(score|probability|likelihood)["'\s]*[:=]?\s*(?:is\s+|of\s+)?(-?\d+(?:\.\d+)?)"#)
            .unwrap()
    })
}

fn percent_score_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(-?\d+(?:\.\d+)?)\s*(?:%|/\s*100\b)").unwrap())
}

/// Extract the outermost JSON object from response content
fn extract_json(content: &str) -> Option<&str> {
    let start = content.find('{')?;
    let end = content.rfind('}')?;
    if end > start {
        Some(&content[start..=end])
    } else {
        None
    }
}

fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().trim_end_matches('%').trim().parse::<f64>().ok(),
        _ => None,
    }
}

fn structured_score(obj: &serde_json::Map<String, Value>) -> Option<f64> {
    for key in SCORE_KEYS {
        if let Some(raw) = obj.get(*key).and_then(as_number) {
            // Probabilities arrive as 0..1 fractions.
            let scaled = if (*key == "probability" || *key == "ai_probability") && raw <= 1.0 {
                raw * 100.0
            } else {
                raw
            };
            return Some(scaled);
        }
    }
    None
}

fn structured_confidence(value: Option<&Value>, score: i32) -> Confidence {
    match value {
        Some(Value::String(s)) => Confidence::from_str(s).unwrap_or_else(|| Confidence::from_score(score)),
        Some(v) => match as_number(v) {
            Some(n) => {
                let n = if n <= 1.0 { n * 100.0 } else { n };
                if n >= 75.0 {
                    Confidence::High
                } else if n >= 45.0 {
                    Confidence::Medium
                } else {
                    Confidence::Low
                }
            }
            None => Confidence::from_score(score),
        },
        None => Confidence::from_score(score),
    }
}

fn structured_patterns(value: Option<&Value>) -> Vec<DetectionPattern> {
    let Some(Value::Array(items)) = value else {
        return vec![];
    };
    items
        .iter()
        .filter_map(|item| match item {
            Value::String(s) => Some(DetectionPattern {
                pattern: s.clone(),
                description: String::new(),
                examples: None,
            }),
            Value::Object(obj) => {
                let pattern = obj
                    .get("pattern")
                    .or_else(|| obj.get("name"))
                    .and_then(Value::as_str)?
                    .to_string();
                let description = obj
                    .get("description")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string();
                let examples = obj.get("examples").and_then(Value::as_array).map(|arr| {
                    arr.iter()
                        .filter_map(Value::as_str)
                        .map(|s| s.to_string())
                        .collect::<Vec<_>>()
                });
                Some(DetectionPattern {
                    pattern,
                    description,
                    examples,
                })
            }
            _ => None,
        })
        .collect()
}

fn structured_suggestions(value: Option<&Value>) -> Vec<String> {
    match value {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|v| match v {
                Value::String(s) => Some(s.clone()),
                Value::Object(obj) => obj
                    .get("suggestion")
                    .or_else(|| obj.get("text"))
                    .and_then(Value::as_str)
                    .map(|s| s.to_string()),
                _ => None,
            })
            .collect(),
        Some(Value::String(s)) if !s.trim().is_empty() => vec![s.clone()],
        _ => vec![],
    }
}

fn parse_structured(content: &str) -> Option<DetectionResult> {
    let json_str = extract_json(content)?;
    let value: Value = serde_json::from_str(json_str).ok()?;
    let obj = value.as_object()?;
    let score = clamp_score(structured_score(obj)?);

    let analysis = ANALYSIS_KEYS
        .iter()
        .find_map(|k| obj.get(*k).and_then(Value::as_str))
        .unwrap_or("No analysis provided")
        .to_string();

    Some(DetectionResult {
        score,
        confidence: structured_confidence(obj.get("confidence"), score),
        analysis,
        patterns: structured_patterns(obj.get("patterns")),
        suggestions: structured_suggestions(obj.get("suggestions")),
    })
}

fn parse_loose(content: &str) -> Option<DetectionResult> {
    let raw = if let Some(captured) = labelled_score_re().captures(content) {
        let value: f64 = captured.get(2)?.as_str().parse().ok()?;
        let fractional_label = !captured.get(1)?.as_str().eq_ignore_ascii_case("score");
        if fractional_label && value <= 1.0 {
            value * 100.0
        } else {
            value
        }
    } else {
        let captured = percent_score_re().captures(content)?;
        captured.get(1)?.as_str().parse::<f64>().ok()?
    };
    Some(DetectionResult {
        score: clamp_score(raw),
        confidence: Confidence::Low,
        analysis: "Score extracted from an unstructured response".to_string(),
        patterns: vec![],
        suggestions: vec![],
    })
}

/// Parse a raw score-service response. Never invents a score the content does not contain.
pub fn parse_detection_response(raw: &str) -> HumanizeResult<DetectionResult> {
    let content = raw.trim();
    if content.is_empty() {
        return Err(HumanizeError::RemoteEmptyResponse);
    }

    if let Some(result) = parse_structured(content) {
        return Ok(result);
    }

    if let Some(result) = parse_loose(content) {
        warn!("[DETECTION] structured parse failed, extracted score {} by pattern", result.score);
        return Ok(result);
    }

    let preview: String = content.chars().take(120).collect();
    Err(HumanizeError::RemoteMalformedResponse(preview))
}
