// Content Assistant
// Generation and translation passed straight through to the rewrite service, cached by fingerprint

use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use crate::models::GenerationRequest;
use crate::services::cache::{fingerprint, FingerprintCache, DEFAULT_EXCERPT_CHARS, PREFIX_GENERATE, PREFIX_TRANSLATE};
use crate::services::cancel::{guard_remote, CancelToken};
use crate::services::detection::{DEFAULT_MAX_INPUT_CHARS, DEFAULT_REMOTE_TIMEOUT};
use crate::services::error::{validate_input, HumanizeError, HumanizeResult};
use crate::services::humanize::clean_rewrite_output;
use crate::services::remote::{RewriteRequest, RewriteService};

const GENERATE_TEMPERATURE: f64 = 0.7;
const TRANSLATE_TEMPERATURE: f64 = 0.3;

#[derive(Clone)]
pub struct ContentAssistant {
    remote: Arc<dyn RewriteService>,
    cache: FingerprintCache<String>,
    timeout: Duration,
    excerpt_chars: usize,
    max_input_chars: usize,
}

impl ContentAssistant {
    pub fn new(remote: Arc<dyn RewriteService>) -> Self {
        Self {
            remote,
            cache: FingerprintCache::default(),
            timeout: DEFAULT_REMOTE_TIMEOUT,
            excerpt_chars: DEFAULT_EXCERPT_CHARS,
            max_input_chars: DEFAULT_MAX_INPUT_CHARS,
        }
    }

    pub fn with_cache(mut self, cache: FingerprintCache<String>) -> Self {
        self.cache = cache;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_max_input_chars(mut self, max_input_chars: usize) -> Self {
        self.max_input_chars = max_input_chars;
        self
    }

    /// Write a fresh piece on `topic` in the requested style.
    pub async fn generate(&self, request: &GenerationRequest, cancel: &CancelToken) -> HumanizeResult<String> {
        validate_input(&request.topic, self.max_input_chars)?;
        let key = fingerprint(
            PREFIX_GENERATE,
            &request.topic,
            &(request.style.trim().to_lowercase(), request.word_count),
            self.excerpt_chars,
        );
        let prompt = format!(
            "Write about {} words on the following topic in a {} style. \
Sound like a real person: vary sentence length, use contractions, avoid stock transitions. \
Return only the text.\n\nTopic: {}",
            request.word_count,
            request.style.trim(),
            request.topic.trim()
        );
        self.run(key, prompt, &request.topic, GENERATE_TEMPERATURE, cancel).await
    }

    /// Translate `text` into `target_language`, keeping tone and formatting.
    pub async fn translate(&self, text: &str, target_language: &str, cancel: &CancelToken) -> HumanizeResult<String> {
        validate_input(text, self.max_input_chars)?;
        let target = target_language.trim();
        if target.is_empty() {
            return Err(HumanizeError::Config("target language is required".to_string()));
        }
        let key = fingerprint(PREFIX_TRANSLATE, text, &target.to_lowercase(), self.excerpt_chars);
        let prompt = format!(
            "Translate the text below into {}. Keep the meaning, tone and paragraph breaks. \
Return only the translation.\n\n{}",
            target, text
        );
        self.run(key, prompt, text, TRANSLATE_TEMPERATURE, cancel).await
    }

    async fn run(
        &self,
        key: String,
        prompt: String,
        source: &str,
        temperature: f64,
        cancel: &CancelToken,
    ) -> HumanizeResult<String> {
        if let Some(cached) = self.cache.get(&key) {
            return Ok(cached);
        }
        let request = RewriteRequest::new(prompt, temperature);
        let raw = guard_remote(self.remote.rewrite(&request), self.timeout, cancel).await?;
        let text = clean_rewrite_output(&raw, source).ok_or(HumanizeError::RemoteEmptyResponse)?;
        info!(
            "[ASSIST] {} produced {} chars (temperature {})",
            self.remote.name(),
            text.chars().count(),
            temperature
        );
        self.cache.set(key, text.clone());
        Ok(text)
    }
}
