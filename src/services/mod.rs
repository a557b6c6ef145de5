// Humanizer Core Services

pub mod error;
pub mod cancel;
pub mod text_processor;
pub mod cache;
pub mod config_store;
pub mod remote;
pub mod providers;
pub mod detection;
pub mod humanize;
pub mod assist;
pub mod pipeline;

pub use error::*;
pub use cancel::{guard_remote, CancelToken};
pub use cache::{fingerprint, CacheStats, FingerprintCache};
pub use config_store::*;
pub use remote::{RewriteRequest, RewriteService, ScoreService};
pub use providers::{get_api_key, parse_provider, ProviderClient, ProviderError};
pub use assist::ContentAssistant;
pub use pipeline::Pipeline;

// Re-export pipeline entry points
pub use detection::{
    parse_detection_response,
    DetectionService,
    DetectionThrottle,
    HeuristicScorer,
};
pub use humanize::{
    build_humanize_prompt,
    HeuristicRewriter,
    HumanizationSession,
    Orchestrator,
};
