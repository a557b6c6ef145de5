// Humanization Orchestrator
// Drives score -> rewrite -> score (-> repeat) for one run and records every pass.
//
// The remote/local choice is made once per call by `use_remote`. Remote failures
// propagate unless the caller opted into `FallbackPolicy::LocalOnFailure`, in which
// case only the failed step is redone locally.

use regex::Regex;
use serde::Serialize;
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::models::{
    human_score_from_ai, Approach, FallbackPolicy, HumanizationOptions, HumanizeEvent, HumanizeOutcome,
    OptimizationHistoryItem, OptimizeOutcome, RunState,
};
use crate::services::cache::{content_digest, fingerprint, FingerprintCache, DEFAULT_EXCERPT_CHARS, PREFIX_HUMANIZE, PREFIX_OPTIMIZE};
use crate::services::cancel::{guard_remote, CancelToken};
use crate::services::detection::{DetectionService, DEFAULT_MAX_INPUT_CHARS, DEFAULT_REMOTE_TIMEOUT};
use crate::services::error::{validate_input, ErrorCategory, HumanizeError, HumanizeResult};
use crate::services::remote::{RewriteRequest, RewriteService};

use super::heuristic_rewriter::HeuristicRewriter;
use super::prompt_builder::build_humanize_prompt;

/// Progress sink handed to `humanize` / `optimize`.
pub type EventSink<'a> = dyn FnMut(&HumanizeEvent) + Send + 'a;

// ============ Session ============

/// State of one humanization run plus any manual optimize passes that follow it.
#[derive(Debug, Clone)]
pub struct HumanizationSession {
    id: String,
    state: RunState,
    stage: u32,
    detected_ai_score: Option<i32>,
    history: Vec<OptimizationHistoryItem>,
}

impl Default for HumanizationSession {
    fn default() -> Self {
        Self::new()
    }
}

impl HumanizationSession {
    pub fn new() -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            state: RunState::Init,
            stage: 0,
            detected_ai_score: None,
            history: Vec::new(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    /// Number of re-optimization passes recorded since the initial pass.
    pub fn stage(&self) -> u32 {
        self.stage
    }

    pub fn detected_ai_score(&self) -> Option<i32> {
        self.detected_ai_score
    }

    pub fn history(&self) -> &[OptimizationHistoryItem] {
        &self.history
    }

    /// Latest (current best) entry.
    pub fn current(&self) -> Option<&OptimizationHistoryItem> {
        self.history.last()
    }

    /// Drop the most recent re-optimization pass. The initial pass is never removed.
    pub fn undo(&mut self) -> Option<OptimizationHistoryItem> {
        if self.history.len() <= 1 {
            return None;
        }
        self.stage = self.stage.saturating_sub(1);
        self.history.pop()
    }

    fn reset(&mut self) {
        self.state = RunState::Init;
        self.stage = 0;
        self.detected_ai_score = None;
        self.history.clear();
    }

    fn next_iteration(&self) -> u32 {
        self.history.len() as u32 + 1
    }

    fn record(&mut self, score: i32, text: &str) -> &OptimizationHistoryItem {
        let iteration = self.next_iteration();
        self.history.push(OptimizationHistoryItem {
            score,
            text: text.to_string(),
            iteration,
            timestamp: chrono::Utc::now(),
        });
        &self.history[self.history.len() - 1]
    }
}

// ============ Rewrite output cleanup ============

fn preamble_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?i)^\s*(?:(?:sure|okay|ok)[,!.]?\s*)?(?:here(?:'s| is| are)\s+(?:the\s+|your\s+|a\s+)?(?:rewritten|revised|humanized|updated|new)\s+(?:text|version|passage|content)[^:\n]*:|以下是(?:改写|修改|润色)后的(?:文本|内容)[:：])",
        )
        .unwrap()
    })
}

const QUOTE_PAIRS: &[(char, char)] = &[('"', '"'), ('\'', '\''), ('“', '”'), ('「', '」')];

/// A matched preamble is the model talking when the rewrite starts on a new
/// line or in quotes after it, or when `source` did not open the same way.
fn is_model_preamble(after: &str, source: &str) -> bool {
    let after = after.trim_start_matches([' ', '\t']);
    let starts_block = after.starts_with(['\n', '\r'])
        || QUOTE_PAIRS.iter().any(|(open, _)| after.starts_with(*open));
    starts_block || !preamble_regex().is_match(source.trim())
}

/// Strip chatty preambles and wrapping quotes from a remote rewrite of `source`.
/// Returns `None` when nothing usable is left.
pub fn clean_rewrite_output(raw: &str, source: &str) -> Option<String> {
    let trimmed = raw.trim();
    let mut text = match preamble_regex().find(trimmed) {
        Some(m) if is_model_preamble(&trimmed[m.end()..], source) => trimmed[m.end()..].trim().to_string(),
        _ => trimmed.to_string(),
    };

    for (open, close) in QUOTE_PAIRS {
        let inner_len = text.chars().count();
        if inner_len >= 2 && text.starts_with(*open) && text.ends_with(*close) {
            let inner: String = text.chars().skip(1).take(inner_len - 2).collect();
            // Only unwrap when the quotes enclose the whole text, not two separate quotations.
            if !inner.contains(*close) {
                text = inner.trim().to_string();
            }
            break;
        }
    }

    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}

/// Options that influence a cached remote rewrite.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RewriteFingerprint {
    target: i32,
    approach: Approach,
    style: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    previous_score: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stage: Option<u32>,
    digest: String,
}

// ============ Orchestrator ============

#[derive(Clone)]
pub struct Orchestrator {
    remote: Option<Arc<dyn RewriteService>>,
    detection: DetectionService,
    local: HeuristicRewriter,
    rewrite_cache: FingerprintCache<String>,
    timeout: Duration,
    excerpt_chars: usize,
    max_input_chars: usize,
}

impl Orchestrator {
    /// Orchestrator with no remote rewrite service; `use_remote` runs fail with `MissingCredential`.
    pub fn local_only() -> Self {
        Self {
            remote: None,
            detection: DetectionService::local_only(),
            local: HeuristicRewriter::new(),
            rewrite_cache: FingerprintCache::default(),
            timeout: DEFAULT_REMOTE_TIMEOUT,
            excerpt_chars: DEFAULT_EXCERPT_CHARS,
            max_input_chars: DEFAULT_MAX_INPUT_CHARS,
        }
    }

    pub fn new(remote: Arc<dyn RewriteService>, detection: DetectionService) -> Self {
        Self {
            remote: Some(remote),
            detection,
            ..Self::local_only()
        }
    }

    pub fn with_detection(mut self, detection: DetectionService) -> Self {
        self.detection = detection;
        self
    }

    pub fn with_local_rewriter(mut self, rewriter: HeuristicRewriter) -> Self {
        self.local = rewriter;
        self
    }

    pub fn with_rewrite_cache(mut self, cache: FingerprintCache<String>) -> Self {
        self.rewrite_cache = cache;
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

    pub fn detection(&self) -> &DetectionService {
        &self.detection
    }

    pub fn rewrite_cache(&self) -> &FingerprintCache<String> {
        &self.rewrite_cache
    }

    /// Full run: score the input, rewrite once, score the result, then keep
    /// re-optimizing while auto-optimize is on, the target is unmet and budget remains.
    ///
    /// `session` is reset first. On failure it is left in `RunState::Failed` with
    /// only the passes that fully completed.
    pub async fn humanize<F>(
        &self,
        session: &mut HumanizationSession,
        text: &str,
        use_remote: bool,
        options: &HumanizationOptions,
        cancel: &CancelToken,
        mut sink: F,
    ) -> HumanizeResult<HumanizeOutcome>
    where
        F: FnMut(&HumanizeEvent) + Send,
    {
        session.reset();
        info!(
            "[ORCHESTRATOR] humanize session={} remote={} target={} approach={} iterations={} auto={}",
            session.id,
            use_remote,
            options.target_score,
            options.approach.as_str(),
            options.iterations,
            options.auto_optimize
        );

        let result = self.run(session, text, use_remote, options, cancel, &mut sink).await;
        if let Err(err) = &result {
            warn!("[ORCHESTRATOR] session={} failed: {}", session.id, err);
            transition(session, RunState::Failed, &mut sink);
        }
        result
    }

    async fn run(
        &self,
        session: &mut HumanizationSession,
        text: &str,
        use_remote: bool,
        options: &HumanizationOptions,
        cancel: &CancelToken,
        sink: &mut EventSink<'_>,
    ) -> HumanizeResult<HumanizeOutcome> {
        validate_input(text, self.max_input_chars)?;
        let policy = options.fallback_policy;

        transition(session, RunState::ScoringInput, sink);
        let detected_ai_score = self.ai_score(text, use_remote, policy, cancel).await?;
        session.detected_ai_score = Some(detected_ai_score);
        sink(&HumanizeEvent::InputScored { ai_score: detected_ai_score });

        transition(session, RunState::Rewriting, sink);
        let mut current_text = self
            .rewrite_pass(text, use_remote, &options.at_iteration(1), None, cancel)
            .await?;

        transition(session, RunState::ScoringOutput, sink);
        let mut current_score = human_score_from_ai(self.ai_score(&current_text, use_remote, policy, cancel).await?);
        record_pass(session, current_score, &current_text, sink);

        let budget = options.iterations.max(1);
        if options.auto_optimize && current_score < options.target_score && budget > 1 {
            let mut remaining = budget - 1;
            while remaining > 0 && current_score < options.target_score {
                transition(session, RunState::Iterating, sink);
                let (next_text, next_score) = self
                    .optimize_step(session, &current_text, current_score, use_remote, options, cancel, sink)
                    .await?;
                current_text = next_text;
                current_score = next_score;
                remaining -= 1;
            }
        }

        let iterations = session.history.len() as u32;
        transition(session, RunState::Done, sink);
        sink(&HumanizeEvent::Finished {
            score: current_score,
            iterations,
        });
        info!(
            "[ORCHESTRATOR] session={} done score={} iterations={} target_reached={}",
            session.id,
            current_score,
            iterations,
            current_score >= options.target_score
        );

        Ok(HumanizeOutcome {
            humanized_text: current_text,
            human_score: current_score,
            detected_ai_score,
            iterations,
            target_reached: current_score >= options.target_score,
        })
    }

    /// One manual re-optimization pass on an already humanized text. Always runs,
    /// even when `current_score` already meets the target, and appends to `session`.
    pub async fn optimize<F>(
        &self,
        session: &mut HumanizationSession,
        text: &str,
        current_score: i32,
        use_remote: bool,
        options: &HumanizationOptions,
        cancel: &CancelToken,
        mut sink: F,
    ) -> HumanizeResult<OptimizeOutcome>
    where
        F: FnMut(&HumanizeEvent) + Send,
    {
        let result = self
            .optimize_once(session, text, current_score, use_remote, options, cancel, &mut sink)
            .await;
        if let Err(err) = &result {
            warn!("[ORCHESTRATOR] optimize session={} failed: {}", session.id, err);
            transition(session, RunState::Failed, &mut sink);
        }
        result
    }

    #[allow(clippy::too_many_arguments)]
    async fn optimize_once(
        &self,
        session: &mut HumanizationSession,
        text: &str,
        current_score: i32,
        use_remote: bool,
        options: &HumanizationOptions,
        cancel: &CancelToken,
        sink: &mut EventSink<'_>,
    ) -> HumanizeResult<OptimizeOutcome> {
        validate_input(text, self.max_input_chars)?;
        transition(session, RunState::Iterating, sink);
        let (optimized_text, new_score) = self
            .optimize_step(session, text, current_score, use_remote, options, cancel, sink)
            .await?;
        transition(session, RunState::Done, sink);
        Ok(OptimizeOutcome {
            optimized_text,
            new_score,
            iteration: session.history.len() as u32,
        })
    }

    /// Rewrite with score-gap guidance, rescore and record. Shared by the
    /// auto loop and manual re-entry.
    #[allow(clippy::too_many_arguments)]
    async fn optimize_step(
        &self,
        session: &mut HumanizationSession,
        text: &str,
        current_score: i32,
        use_remote: bool,
        options: &HumanizationOptions,
        cancel: &CancelToken,
        sink: &mut EventSink<'_>,
    ) -> HumanizeResult<(String, i32)> {
        cancel.check()?;
        let iteration = session.next_iteration();
        let stamped = options.at_iteration(iteration);
        debug!(
            "[ORCHESTRATOR] session={} optimize pass {} from score {}",
            session.id, iteration, current_score
        );

        transition(session, RunState::Rewriting, sink);
        let rewritten = self
            .rewrite_pass(text, use_remote, &stamped, Some(current_score), cancel)
            .await?;

        transition(session, RunState::ScoringOutput, sink);
        let ai = self.ai_score(&rewritten, use_remote, options.fallback_policy, cancel).await?;
        let score = human_score_from_ai(ai);

        session.stage += 1;
        record_pass(session, score, &rewritten, sink);
        Ok((rewritten, score))
    }

    async fn ai_score(
        &self,
        text: &str,
        use_remote: bool,
        policy: FallbackPolicy,
        cancel: &CancelToken,
    ) -> HumanizeResult<i32> {
        match self.detection.ai_score(text, use_remote, cancel).await {
            Ok(score) => Ok(score),
            Err(err) if use_remote && may_fall_back(policy, &err) => {
                warn!("[ORCHESTRATOR] remote score failed ({}); using local heuristic", err);
                Ok(self.detection.local_score(text))
            }
            Err(err) => Err(err),
        }
    }

    async fn rewrite_pass(
        &self,
        text: &str,
        use_remote: bool,
        options: &HumanizationOptions,
        previous_score: Option<i32>,
        cancel: &CancelToken,
    ) -> HumanizeResult<String> {
        if !use_remote {
            return Ok(self.local.rewrite(text));
        }
        match self.rewrite_remote(text, options, previous_score, cancel).await {
            Ok(rewritten) => Ok(rewritten),
            Err(err) if may_fall_back(options.fallback_policy, &err) => {
                warn!("[ORCHESTRATOR] remote rewrite failed ({}); using local heuristic", err);
                Ok(self.local.rewrite(text))
            }
            Err(err) => Err(err),
        }
    }

    async fn rewrite_remote(
        &self,
        text: &str,
        options: &HumanizationOptions,
        previous_score: Option<i32>,
        cancel: &CancelToken,
    ) -> HumanizeResult<String> {
        let remote = self
            .remote
            .as_ref()
            .ok_or_else(|| HumanizeError::MissingCredential("no remote rewrite service configured".to_string()))?;

        let prefix = if previous_score.is_some() { PREFIX_OPTIMIZE } else { PREFIX_HUMANIZE };
        let key_options = RewriteFingerprint {
            target: options.target_score,
            approach: options.approach,
            style: options.normalized_style(),
            previous_score,
            stage: previous_score.map(|_| options.iteration_count),
            digest: content_digest(text),
        };
        let key = fingerprint(prefix, text, &key_options, self.excerpt_chars);
        if let Some(cached) = self.rewrite_cache.get(&key) {
            debug!("[ORCHESTRATOR] cached {} rewrite", prefix);
            return Ok(cached);
        }

        let prompt = build_humanize_prompt(text, options, previous_score);
        let request = RewriteRequest::new(prompt, options.approach.temperature());
        let raw = guard_remote(remote.rewrite(&request), self.timeout, cancel).await?;
        let cleaned = clean_rewrite_output(&raw, text).ok_or(HumanizeError::RemoteEmptyResponse)?;
        info!(
            "[ORCHESTRATOR] remote rewrite service={} iteration={} chars_in={} chars_out={}",
            remote.name(),
            options.iteration_count,
            text.chars().count(),
            cleaned.chars().count()
        );

        self.rewrite_cache.set(key, cleaned.clone());
        Ok(cleaned)
    }
}

fn may_fall_back(policy: FallbackPolicy, err: &HumanizeError) -> bool {
    policy == FallbackPolicy::LocalOnFailure
        && err.category() == ErrorCategory::Service
        && *err != HumanizeError::Cancelled
}

fn transition(session: &mut HumanizationSession, state: RunState, sink: &mut EventSink<'_>) {
    session.state = state;
    sink(&HumanizeEvent::StateChanged { state });
}

fn record_pass(session: &mut HumanizationSession, score: i32, text: &str, sink: &mut EventSink<'_>) {
    let iteration = session.record(score, text).iteration;
    info!("[ORCHESTRATOR] session={} pass {} score={}", session.id, iteration, score);
    let event = HumanizeEvent::PassCompleted {
        iteration,
        score,
        text: text.to_string(),
    };
    sink(&event);
}
