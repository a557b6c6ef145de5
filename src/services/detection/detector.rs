// Detection Service
// Scores text for AI-likeness on the remote or local path.
// - Remote: throttled, timed-out score-service call, parsed and cached under `detect-`
// - Local: heuristic scorer; full analyses cached under `analyze-`

use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info};

use crate::models::{DetectionReport, DetectionResult};
use crate::services::cache::{content_digest, fingerprint, FingerprintCache, DEFAULT_EXCERPT_CHARS, PREFIX_ANALYZE, PREFIX_DETECT};
use crate::services::cancel::{guard_remote, CancelToken};
use crate::services::error::{validate_input, HumanizeError, HumanizeResult};
use crate::services::remote::ScoreService;

use super::heuristic_scorer::HeuristicScorer;
use super::response_parser::parse_detection_response;
use super::throttle::DetectionThrottle;

pub const DEFAULT_MAX_INPUT_CHARS: usize = 100_000;
pub const DEFAULT_REMOTE_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Clone)]
pub struct DetectionService {
    remote: Option<Arc<dyn ScoreService>>,
    local: HeuristicScorer,
    throttle: Arc<DetectionThrottle>,
    remote_cache: FingerprintCache<DetectionResult>,
    local_cache: FingerprintCache<DetectionResult>,
    timeout: Duration,
    excerpt_chars: usize,
    max_input_chars: usize,
}

impl DetectionService {
    /// Local-only service. Remote requests fail with `MissingCredential`.
    pub fn local_only() -> Self {
        Self {
            remote: None,
            local: HeuristicScorer::new(),
            throttle: Arc::new(DetectionThrottle::disabled()),
            remote_cache: FingerprintCache::default(),
            local_cache: FingerprintCache::default(),
            timeout: DEFAULT_REMOTE_TIMEOUT,
            excerpt_chars: DEFAULT_EXCERPT_CHARS,
            max_input_chars: DEFAULT_MAX_INPUT_CHARS,
        }
    }

    pub fn new(remote: Arc<dyn ScoreService>, throttle: Arc<DetectionThrottle>) -> Self {
        Self {
            remote: Some(remote),
            throttle,
            ..Self::local_only()
        }
    }

    pub fn with_scorer(mut self, scorer: HeuristicScorer) -> Self {
        self.local = scorer;
        self
    }

    pub fn with_caches(
        mut self,
        remote_cache: FingerprintCache<DetectionResult>,
        local_cache: FingerprintCache<DetectionResult>,
    ) -> Self {
        self.remote_cache = remote_cache;
        self.local_cache = local_cache;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_excerpt_chars(mut self, excerpt_chars: usize) -> Self {
        self.excerpt_chars = excerpt_chars.max(1);
        self
    }

    pub fn with_max_input_chars(mut self, max_input_chars: usize) -> Self {
        self.max_input_chars = max_input_chars;
        self
    }

    pub fn has_remote(&self) -> bool {
        self.remote.is_some()
    }

    pub fn throttle(&self) -> &Arc<DetectionThrottle> {
        &self.throttle
    }

    pub fn remote_cache(&self) -> &FingerprintCache<DetectionResult> {
        &self.remote_cache
    }

    pub fn scorer(&self) -> &HeuristicScorer {
        &self.local
    }

    /// Remote detection with caching, throttling, timeout and cancellation.
    pub async fn detect_remote(&self, text: &str, cancel: &CancelToken) -> HumanizeResult<DetectionResult> {
        validate_input(text, self.max_input_chars)?;
        let remote = self
            .remote
            .as_ref()
            .ok_or_else(|| HumanizeError::MissingCredential("no remote score service configured".to_string()))?;

        let key = fingerprint(PREFIX_DETECT, text, &(remote.name(), content_digest(text)), self.excerpt_chars);
        if let Some(cached) = self.remote_cache.get(&key) {
            debug!("[DETECTION] cached remote score {}", cached.score);
            return Ok(cached);
        }

        tokio::select! {
            _ = cancel.cancelled() => return Err(HumanizeError::Cancelled),
            _ = self.throttle.acquire() => {}
        }

        let started = Instant::now();
        let raw = guard_remote(remote.score(text), self.timeout, cancel).await?;
        let result = parse_detection_response(&raw)?;
        info!(
            "[DETECTION] remote score={} confidence={:?} service={} elapsed_ms={}",
            result.score,
            result.confidence,
            remote.name(),
            started.elapsed().as_millis()
        );

        self.remote_cache.set(key, result.clone());
        Ok(result)
    }

    /// Heuristic analysis with patterns and suggestions, cached for the TTL
    /// so repeated look-ups of the same text stay stable.
    pub fn analyze_local(&self, text: &str) -> DetectionResult {
        let key = fingerprint(PREFIX_ANALYZE, text, &content_digest(text), self.excerpt_chars);
        if let Some(cached) = self.local_cache.get(&key) {
            return cached;
        }
        let result = self.local.analyze(text);
        self.local_cache.set(key, result.clone());
        result
    }

    /// Fresh heuristic AI-likeness score (uncached).
    pub fn local_score(&self, text: &str) -> i32 {
        self.local.score(text)
    }

    /// Detection-only entry point: full result plus both score semantics.
    pub async fn detect(&self, text: &str, use_remote: bool, cancel: &CancelToken) -> HumanizeResult<DetectionReport> {
        let result = if use_remote {
            self.detect_remote(text, cancel).await?
        } else {
            self.analyze_local(text)
        };
        Ok(DetectionReport::from_result(result))
    }

    /// AI-likeness score used by the orchestrator.
    pub async fn ai_score(&self, text: &str, use_remote: bool, cancel: &CancelToken) -> HumanizeResult<i32> {
        if use_remote {
            Ok(self.detect_remote(text, cancel).await?.score)
        } else {
            Ok(self.local_score(text))
        }
    }
}
