//! Narrow interface to the remote text services.
//!
//! The pipeline only needs two things from a language-model provider: turn
//! an instruction into text, and score a text. Both are traits so callers can
//! plug in [`ProviderClient`](super::providers::ProviderClient), a mock, or
//! anything else that speaks "text in, text out".

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::error::HumanizeResult;

/// A fully built instruction plus generation parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RewriteRequest {
    pub prompt: String,
    pub temperature: f64,
    pub max_tokens: u32,
}

impl RewriteRequest {
    pub fn new(prompt: impl Into<String>, temperature: f64) -> Self {
        Self {
            prompt: prompt.into(),
            temperature,
            max_tokens: 4096,
        }
    }
}

/// Remote text generation: instruction in, raw text out.
#[async_trait]
pub trait RewriteService: Send + Sync {
    async fn rewrite(&self, request: &RewriteRequest) -> HumanizeResult<String>;

    /// Identifier used in logs.
    fn name(&self) -> &str {
        "remote"
    }
}

/// Remote AI-likeness scoring. Returns the raw response body; shape
/// tolerance (JSON, loose text) is handled by the detection layer.
#[async_trait]
pub trait ScoreService: Send + Sync {
    async fn score(&self, text: &str) -> HumanizeResult<String>;

    fn name(&self) -> &str {
        "remote"
    }
}
