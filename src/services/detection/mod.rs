// Detection Module
// AI-likeness scoring organized into specialized submodules:
// - heuristic_scorer: offline surface-statistics scorer (always available)
// - response_parser: tolerant parsing of remote score responses
// - throttle: shared minimum spacing between remote score requests
// - detector: remote/local scoring front door with caching

pub mod heuristic_scorer;
pub mod response_parser;
pub mod throttle;
pub mod detector;

pub use heuristic_scorer::{HeuristicBreakdown, HeuristicScorer, SignalHit};
pub use response_parser::parse_detection_response;
pub use throttle::DetectionThrottle;
pub use detector::{DetectionService, DEFAULT_MAX_INPUT_CHARS, DEFAULT_REMOTE_TIMEOUT};
