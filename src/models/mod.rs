// Humanizer Data Models
// Options, detection results and run history shared by every service

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ============ Scores ============

/// Highest value either score can take.
pub const SCORE_MAX: i32 = 100;

/// Clamp any numeric score into [0, 100], rounding to the nearest integer.
pub fn clamp_score(value: f64) -> i32 {
    if value.is_nan() {
        return 0;
    }
    (value.round() as i64).clamp(0, SCORE_MAX as i64) as i32
}

/// Convert an AI-likeness score into a human-likeness score.
pub fn human_score_from_ai(ai_score: i32) -> i32 {
    SCORE_MAX - ai_score.clamp(0, SCORE_MAX)
}

// ============ Humanization Options ============

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Approach {
    #[default]
    Standard,
    Aggressive,
    Ultra,
}

impl Approach {
    pub fn from_str(val: &str) -> Self {
        match val.trim().to_lowercase().as_str() {
            "aggressive" => Self::Aggressive,
            "ultra" => Self::Ultra,
            _ => Self::Standard,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Standard => "standard",
            Self::Aggressive => "aggressive",
            Self::Ultra => "ultra",
        }
    }

    /// Sampling temperature handed to the rewrite service.
    pub fn temperature(&self) -> f64 {
        match self {
            Self::Standard => 0.8,
            Self::Aggressive => 0.9,
            Self::Ultra => 1.0,
        }
    }
}

/// What to do when a remote step fails mid-run.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub enum FallbackPolicy {
    /// Abort the run and hand the error to the caller.
    #[default]
    Propagate,
    /// Redo the failed step with the local heuristics and keep going.
    LocalOnFailure,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HumanizationOptions {
    #[serde(default = "default_target_score")]
    pub target_score: i32,
    #[serde(default)]
    pub approach: Approach,
    #[serde(default = "default_style")]
    pub style: String,
    /// Total rewrite passes allowed for one run (initial pass included).
    #[serde(default = "default_iterations")]
    pub iterations: u32,
    /// Iteration number the current request represents; 1 is the initial pass.
    #[serde(default = "default_iteration_count")]
    pub iteration_count: u32,
    #[serde(default = "default_true")]
    pub auto_optimize: bool,
    #[serde(default)]
    pub fallback_policy: FallbackPolicy,
}

impl Default for HumanizationOptions {
    fn default() -> Self {
        Self {
            target_score: default_target_score(),
            approach: Approach::Standard,
            style: default_style(),
            iterations: default_iterations(),
            iteration_count: default_iteration_count(),
            auto_optimize: true,
            fallback_policy: FallbackPolicy::Propagate,
        }
    }
}

impl HumanizationOptions {
    /// Copy of these options stamped with a specific iteration number.
    pub fn at_iteration(&self, iteration: u32) -> Self {
        Self {
            iteration_count: iteration.max(1),
            ..self.clone()
        }
    }

    pub fn normalized_style(&self) -> String {
        let style = self.style.trim().to_lowercase();
        if style.is_empty() {
            default_style()
        } else {
            style
        }
    }
}

// ============ History ============

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OptimizationHistoryItem {
    /// Human-likeness score of `text`.
    pub score: i32,
    pub text: String,
    pub iteration: u32,
    pub timestamp: DateTime<Utc>,
}

// ============ Detection ============

#[derive(Debug, Copy, Clone, Eq, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    High,
    #[default]
    Medium,
    Low,
}

impl Confidence {
    pub fn from_str(val: &str) -> Option<Self> {
        match val.trim().to_lowercase().as_str() {
            "high" => Some(Self::High),
            "medium" | "moderate" => Some(Self::Medium),
            "low" => Some(Self::Low),
            _ => None,
        }
    }

    /// Tier implied by how far a score sits from the undecided midpoint.
    pub fn from_score(score: i32) -> Self {
        let distance = (score - 50).abs();
        if distance >= 35 {
            Self::High
        } else if distance >= 15 {
            Self::Medium
        } else {
            Self::Low
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct DetectionPattern {
    pub pattern: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub examples: Option<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct DetectionResult {
    /// AI-likeness score, 100 = certainly machine-generated.
    pub score: i32,
    pub confidence: Confidence,
    pub analysis: String,
    #[serde(default)]
    pub patterns: Vec<DetectionPattern>,
    #[serde(default)]
    pub suggestions: Vec<String>,
}

/// Detection result with both score semantics derived from the same call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectionReport {
    pub ai_score: i32,
    pub human_score: i32,
    pub result: DetectionResult,
}

impl DetectionReport {
    pub fn from_result(result: DetectionResult) -> Self {
        let ai_score = result.score.clamp(0, SCORE_MAX);
        Self {
            ai_score,
            human_score: human_score_from_ai(ai_score),
            result,
        }
    }
}

// ============ Orchestrator Results ============

#[derive(Debug, Copy, Clone, Eq, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunState {
    #[default]
    Init,
    ScoringInput,
    Rewriting,
    ScoringOutput,
    Iterating,
    Done,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HumanizeOutcome {
    pub humanized_text: String,
    pub human_score: i32,
    pub detected_ai_score: i32,
    pub iterations: u32,
    pub target_reached: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OptimizeOutcome {
    pub optimized_text: String,
    pub new_score: i32,
    pub iteration: u32,
}

/// Incremental progress surfaced while a run is in flight.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum HumanizeEvent {
    StateChanged { state: RunState },
    #[serde(rename_all = "camelCase")]
    InputScored { ai_score: i32 },
    PassCompleted { iteration: u32, score: i32, text: String },
    Finished { score: i32, iterations: u32 },
}

// ============ Adjacent Features ============

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationRequest {
    pub topic: String,
    #[serde(default = "default_style")]
    pub style: String,
    #[serde(default = "default_word_count")]
    pub word_count: u32,
}

// ============ Default Value Functions ============

fn default_true() -> bool { true }
fn default_target_score() -> i32 { 95 }
fn default_style() -> String { "general".to_string() }
fn default_iterations() -> u32 { 3 }
fn default_iteration_count() -> u32 { 1 }
fn default_word_count() -> u32 { 300 }
