//! End-to-end orchestrator scenarios against in-memory rewrite/score services.
//!
//! The mocks count calls so cache behavior and loop bounds can be asserted
//! without any network.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use humanizer_lib::services::detection::{DetectionService, DetectionThrottle};
use humanizer_lib::services::humanize::{HeuristicRewriter, RewriteProbabilities};
use humanizer_lib::services::{RewriteRequest, RewriteService, ScoreService};
use humanizer_lib::{
    CancelToken, FallbackPolicy, HumanizationOptions, HumanizationSession, HumanizeError, HumanizeEvent,
    HumanizeResult, Orchestrator, RunState,
};

const INPUT: &str = "Furthermore, the proposed framework utilizes a comprehensive methodology. \
Moreover, it is important to note that the results demonstrate significant improvements.";

// ============ Mocks ============

#[derive(Default)]
struct MockRewriter {
    calls: AtomicUsize,
    requests: Mutex<Vec<RewriteRequest>>,
    fail_with: Option<HumanizeError>,
    delay: Option<Duration>,
}

impl MockRewriter {
    fn ok() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn failing(err: HumanizeError) -> Arc<Self> {
        Arc::new(Self {
            fail_with: Some(err),
            ..Default::default()
        })
    }

    fn slow(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            delay: Some(delay),
            ..Default::default()
        })
    }

    fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn prompts(&self) -> Vec<String> {
        self.requests.lock().unwrap().iter().map(|r| r.prompt.clone()).collect()
    }
}

#[async_trait]
impl RewriteService for MockRewriter {
    async fn rewrite(&self, request: &RewriteRequest) -> HumanizeResult<String> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        self.requests.lock().unwrap().push(request.clone());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(err) = &self.fail_with {
            return Err(err.clone());
        }
        Ok(format!("Here is the rewritten text:\n\"Take {} on it: the framework's method works, and it's a lot better now.\"", n))
    }

    fn name(&self) -> &str {
        "mock-rewriter"
    }
}

/// Keeps the input verbatim and tacks a casual sentence onto the end.
#[derive(Default)]
struct ExtendingRewriter {
    calls: AtomicUsize,
}

#[async_trait]
impl RewriteService for ExtendingRewriter {
    async fn rewrite(&self, _request: &RewriteRequest) -> HumanizeResult<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(format!("{} Anyway, that's the gist of it.", INPUT))
    }
}

/// Replays scripted AI-likeness scores, then repeats `fallback`.
struct MockScorer {
    calls: AtomicUsize,
    scripted: Mutex<VecDeque<i32>>,
    fallback: i32,
}

impl MockScorer {
    fn new(scripted: &[i32], fallback: i32) -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            scripted: Mutex::new(scripted.iter().copied().collect()),
            fallback,
        })
    }

    fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ScoreService for MockScorer {
    async fn score(&self, _text: &str) -> HumanizeResult<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let score = self.scripted.lock().unwrap().pop_front().unwrap_or(self.fallback);
        Ok(format!(r#"{{"score": {}, "confidence": "high", "analysis": "mock"}}"#, score))
    }
}

fn orchestrator(rewriter: Arc<MockRewriter>, scorer: Arc<MockScorer>) -> Orchestrator {
    let detection = DetectionService::new(scorer, Arc::new(DetectionThrottle::disabled()));
    Orchestrator::new(rewriter, detection)
}

fn options(target: i32, iterations: u32) -> HumanizationOptions {
    HumanizationOptions {
        target_score: target,
        iterations,
        ..Default::default()
    }
}

fn quiet(_: &HumanizeEvent) {}

// ============ Scenarios ============

#[tokio::test]
async fn test_target_met_on_first_pass_records_single_entry() {
    let rewriter = MockRewriter::ok();
    let scorer = MockScorer::new(&[80, 2], 50);
    let orch = orchestrator(rewriter.clone(), scorer.clone());
    let mut session = HumanizationSession::new();

    let outcome = orch
        .humanize(&mut session, INPUT, true, &options(95, 3), &CancelToken::new(), quiet)
        .await
        .unwrap();

    assert_eq!(outcome.detected_ai_score, 80);
    assert_eq!(outcome.human_score, 98);
    assert_eq!(outcome.iterations, 1);
    assert!(outcome.target_reached);
    assert_eq!(session.history().len(), 1);
    assert_eq!(session.history()[0].iteration, 1);
    assert_eq!(rewriter.call_count(), 1);
    assert_eq!(scorer.call_count(), 2);
    assert_eq!(session.state(), RunState::Done);
    assert_eq!(session.detected_ai_score(), Some(80));
}

#[tokio::test]
async fn test_rewrite_output_is_cleaned() {
    let orch = orchestrator(MockRewriter::ok(), MockScorer::new(&[80, 2], 50));
    let mut session = HumanizationSession::new();
    let outcome = orch
        .humanize(&mut session, INPUT, true, &options(95, 1), &CancelToken::new(), quiet)
        .await
        .unwrap();
    assert!(outcome.humanized_text.starts_with("Take 1 on it"));
    assert!(!outcome.humanized_text.ends_with('"'));
}

#[tokio::test]
async fn test_quota_error_propagates_without_history() {
    let rewriter = MockRewriter::failing(HumanizeError::RemoteQuotaExceeded("429".into()));
    let orch = orchestrator(rewriter.clone(), MockScorer::new(&[], 60));
    let mut session = HumanizationSession::new();

    let err = orch
        .humanize(&mut session, INPUT, true, &options(95, 3), &CancelToken::new(), quiet)
        .await
        .unwrap_err();

    assert_eq!(err, HumanizeError::RemoteQuotaExceeded("429".into()));
    assert!(session.history().is_empty());
    assert_eq!(session.state(), RunState::Failed);
    assert_eq!(rewriter.call_count(), 1);
}

#[tokio::test]
async fn test_loop_stops_at_iteration_budget() {
    let rewriter = MockRewriter::ok();
    let scorer = MockScorer::new(&[], 70);
    let orch = orchestrator(rewriter.clone(), scorer.clone());
    let mut session = HumanizationSession::new();

    let outcome = orch
        .humanize(&mut session, INPUT, true, &options(95, 4), &CancelToken::new(), quiet)
        .await
        .unwrap();

    assert_eq!(outcome.iterations, 4);
    assert_eq!(outcome.human_score, 30);
    assert!(!outcome.target_reached);
    assert_eq!(rewriter.call_count(), 4);
    assert_eq!(session.stage(), 3);

    let iterations: Vec<u32> = session.history().iter().map(|h| h.iteration).collect();
    assert_eq!(iterations, vec![1, 2, 3, 4]);
    assert!(session.history().windows(2).all(|w| w[0].timestamp <= w[1].timestamp));
}

#[tokio::test]
async fn test_rewrite_sharing_the_input_opening_is_scored_fresh() {
    let rewriter = Arc::new(ExtendingRewriter::default());
    let scorer = MockScorer::new(&[90, 2], 50);
    let detection = DetectionService::new(scorer.clone(), Arc::new(DetectionThrottle::disabled()));
    let orch = Orchestrator::new(rewriter.clone(), detection);
    let mut session = HumanizationSession::new();

    let outcome = orch
        .humanize(&mut session, INPUT, true, &options(95, 4), &CancelToken::new(), quiet)
        .await
        .unwrap();

    assert_eq!(scorer.call_count(), 2);
    assert_eq!(outcome.detected_ai_score, 90);
    assert_eq!(outcome.human_score, 98);
    assert!(outcome.target_reached);
    assert_eq!(rewriter.calls.load(Ordering::SeqCst), 1);
    let scores: Vec<i32> = session.history().iter().map(|h| h.score).collect();
    assert_eq!(scores, vec![98]);
}

#[tokio::test]
async fn test_later_passes_carry_score_guidance() {
    let rewriter = MockRewriter::ok();
    let orch = orchestrator(rewriter.clone(), MockScorer::new(&[], 70));
    let mut session = HumanizationSession::new();

    orch.humanize(&mut session, INPUT, true, &options(95, 2), &CancelToken::new(), quiet)
        .await
        .unwrap();

    let prompts = rewriter.prompts();
    assert_eq!(prompts.len(), 2);
    assert!(!prompts[0].contains("previous version"));
    assert!(prompts[1].contains("scored 30/100"));
    assert!(prompts[1].contains("iteration 2"));
    assert!(prompts[1].contains("Take 1 on it"));
}

#[tokio::test]
async fn test_loop_stops_once_target_reached() {
    // input 90, pass1 60 -> human 40, pass2 3 -> human 97
    let rewriter = MockRewriter::ok();
    let orch = orchestrator(rewriter.clone(), MockScorer::new(&[90, 60, 3], 50));
    let mut session = HumanizationSession::new();

    let outcome = orch
        .humanize(&mut session, INPUT, true, &options(95, 5), &CancelToken::new(), quiet)
        .await
        .unwrap();

    assert_eq!(outcome.iterations, 2);
    assert!(outcome.target_reached);
    assert_eq!(rewriter.call_count(), 2);
    let scores: Vec<i32> = session.history().iter().map(|h| h.score).collect();
    assert_eq!(scores, vec![40, 97]);
}

#[tokio::test]
async fn test_no_auto_optimize_means_single_pass() {
    let rewriter = MockRewriter::ok();
    let orch = orchestrator(rewriter.clone(), MockScorer::new(&[], 70));
    let mut session = HumanizationSession::new();
    let opts = HumanizationOptions {
        auto_optimize: false,
        ..options(95, 5)
    };

    let outcome = orch
        .humanize(&mut session, INPUT, true, &opts, &CancelToken::new(), quiet)
        .await
        .unwrap();
    assert_eq!(outcome.iterations, 1);
    assert_eq!(rewriter.call_count(), 1);
}

#[tokio::test]
async fn test_optimize_appends_to_same_history_and_undo() {
    let rewriter = MockRewriter::ok();
    let orch = orchestrator(rewriter.clone(), MockScorer::new(&[80, 2, 1], 50));
    let mut session = HumanizationSession::new();
    let opts = options(95, 3);
    let token = CancelToken::new();

    let first = orch
        .humanize(&mut session, INPUT, true, &opts, &token, quiet)
        .await
        .unwrap();
    let nudged = orch
        .optimize(&mut session, &first.humanized_text, first.human_score, true, &opts, &token, quiet)
        .await
        .unwrap();

    assert_eq!(nudged.iteration, 2);
    assert_eq!(nudged.new_score, 99);
    assert_eq!(session.history().len(), 2);
    assert_eq!(session.current().map(|h| h.text.clone()), Some(nudged.optimized_text.clone()));
    assert_eq!(rewriter.call_count(), 2);

    assert!(session.undo().is_some());
    assert!(session.undo().is_none());
    assert_eq!(session.history().len(), 1);
}

#[tokio::test]
async fn test_repeat_run_is_served_from_cache() {
    let rewriter = MockRewriter::ok();
    let scorer = MockScorer::new(&[80, 2], 50);
    let orch = orchestrator(rewriter.clone(), scorer.clone());
    let token = CancelToken::new();

    let mut first_session = HumanizationSession::new();
    let first = orch
        .humanize(&mut first_session, INPUT, true, &options(95, 3), &token, quiet)
        .await
        .unwrap();
    let mut second_session = HumanizationSession::new();
    let second = orch
        .humanize(&mut second_session, INPUT, true, &options(95, 3), &token, quiet)
        .await
        .unwrap();

    assert_eq!(first, second);
    assert_eq!(rewriter.call_count(), 1);
    assert_eq!(scorer.call_count(), 2);
}

#[tokio::test]
async fn test_different_options_miss_the_cache() {
    let rewriter = MockRewriter::ok();
    let orch = orchestrator(rewriter.clone(), MockScorer::new(&[], 2));
    let token = CancelToken::new();
    let mut session = HumanizationSession::new();

    orch.humanize(&mut session, INPUT, true, &options(95, 1), &token, quiet)
        .await
        .unwrap();
    let casual = HumanizationOptions {
        style: "casual".to_string(),
        ..options(95, 1)
    };
    orch.humanize(&mut session, INPUT, true, &casual, &token, quiet)
        .await
        .unwrap();

    assert_eq!(rewriter.call_count(), 2);
}

#[tokio::test]
async fn test_local_on_failure_policy_falls_back() {
    let rewriter = MockRewriter::failing(HumanizeError::RemoteNetworkError("connection reset".into()));
    let orch = orchestrator(rewriter.clone(), MockScorer::new(&[], 70))
        .with_local_rewriter(HeuristicRewriter::with_probabilities(RewriteProbabilities::none()));
    let mut session = HumanizationSession::new();
    let opts = HumanizationOptions {
        fallback_policy: FallbackPolicy::LocalOnFailure,
        auto_optimize: false,
        ..options(95, 1)
    };

    let outcome = orch
        .humanize(&mut session, INPUT, true, &opts, &CancelToken::new(), quiet)
        .await
        .unwrap();

    assert_eq!(rewriter.call_count(), 1);
    assert!(outcome.humanized_text.contains("uses"));
    assert_eq!(session.history().len(), 1);
}

#[tokio::test]
async fn test_local_on_failure_does_not_swallow_input_errors() {
    let orch = orchestrator(MockRewriter::ok(), MockScorer::new(&[], 70)).with_max_input_chars(10);
    let mut session = HumanizationSession::new();
    let opts = HumanizationOptions {
        fallback_policy: FallbackPolicy::LocalOnFailure,
        ..options(95, 1)
    };
    let err = orch
        .humanize(&mut session, INPUT, true, &opts, &CancelToken::new(), quiet)
        .await
        .unwrap_err();
    assert!(matches!(err, HumanizeError::InputTooLong { max: 10, .. }));
}

#[tokio::test]
async fn test_local_path_applies_unconditional_substitutions() {
    let orch = Orchestrator::local_only()
        .with_local_rewriter(HeuristicRewriter::with_probabilities(RewriteProbabilities::none()));
    let mut session = HumanizationSession::new();
    let opts = HumanizationOptions {
        auto_optimize: false,
        ..Default::default()
    };

    let outcome = orch
        .humanize(
            &mut session,
            "The implementation utilizes advanced algorithms. Therefore, performance is optimal. I cannot do that.",
            false,
            &opts,
            &CancelToken::new(),
            quiet,
        )
        .await
        .unwrap();

    assert!(outcome.humanized_text.contains("uses"));
    assert!(!outcome.humanized_text.contains("utilizes"));
    assert!(outcome.humanized_text.contains("So,"));
    assert!(outcome.humanized_text.contains("I can't do that."));
    assert!((0..=100).contains(&outcome.human_score));
    assert_eq!(session.history()[0].score, outcome.human_score);
}

#[tokio::test]
async fn test_events_arrive_in_order() {
    let orch = orchestrator(MockRewriter::ok(), MockScorer::new(&[], 70));
    let mut session = HumanizationSession::new();
    let mut events: Vec<HumanizeEvent> = Vec::new();

    orch.humanize(
        &mut session,
        INPUT,
        true,
        &options(95, 2),
        &CancelToken::new(),
        |e: &HumanizeEvent| events.push(e.clone()),
    )
    .await
    .unwrap();

    assert_eq!(events.first(), Some(&HumanizeEvent::StateChanged { state: RunState::ScoringInput }));
    assert_eq!(events.get(1), Some(&HumanizeEvent::InputScored { ai_score: 70 }));
    let passes: Vec<u32> = events
        .iter()
        .filter_map(|e| match e {
            HumanizeEvent::PassCompleted { iteration, .. } => Some(*iteration),
            _ => None,
        })
        .collect();
    assert_eq!(passes, vec![1, 2]);
    assert!(events.contains(&HumanizeEvent::StateChanged { state: RunState::Iterating }));
    assert_eq!(events.last(), Some(&HumanizeEvent::Finished { score: 30, iterations: 2 }));
}

#[tokio::test]
async fn test_cancelled_before_start() {
    let rewriter = MockRewriter::ok();
    let scorer = MockScorer::new(&[], 70);
    let orch = orchestrator(rewriter.clone(), scorer.clone());
    let token = CancelToken::new();
    token.cancel();
    let mut session = HumanizationSession::new();

    let err = orch
        .humanize(&mut session, INPUT, true, &options(95, 3), &token, quiet)
        .await
        .unwrap_err();

    assert_eq!(err, HumanizeError::Cancelled);
    assert_eq!(scorer.call_count(), 0);
    assert_eq!(rewriter.call_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_slow_rewrite_times_out() {
    let rewriter = MockRewriter::slow(Duration::from_secs(30));
    let orch = orchestrator(rewriter, MockScorer::new(&[], 70)).with_timeout(Duration::from_secs(5));
    let mut session = HumanizationSession::new();

    let err = orch
        .humanize(&mut session, INPUT, true, &options(95, 3), &CancelToken::new(), quiet)
        .await
        .unwrap_err();

    assert_eq!(err, HumanizeError::Timeout(Duration::from_secs(5)));
    assert!(session.history().is_empty());
}
