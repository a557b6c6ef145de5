// Humanize Module
// Rewriting side of the pipeline:
// - heuristic_rewriter: offline rule-based rewrite (contractions, casual synonyms, rhythm noise)
// - prompt_builder: adaptive instruction for the remote rewrite service
// - orchestrator: score/rewrite loop, session history and manual re-optimization

pub mod heuristic_rewriter;
pub mod prompt_builder;
pub mod orchestrator;

pub use heuristic_rewriter::{apply_casual_synonyms, apply_contractions, HeuristicRewriter, RewriteProbabilities};
pub use prompt_builder::{build_humanize_prompt, FAR_BELOW_TARGET};
pub use orchestrator::{clean_rewrite_output, EventSink, HumanizationSession, Orchestrator};
