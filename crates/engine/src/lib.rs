pub mod batch;
pub mod ensemble;
pub mod error;
pub mod heuristic;
pub mod pattern;
pub mod pipeline;
pub(crate) mod util;

pub use batch::{
    default_workers, BatchConfig, BatchFailureMode, BatchItemResult, BatchOrchestrator,
    BatchOutcome, FALLBACK_CONFIDENCE,
};
pub use ensemble::{EnsembleCombiner, Fusion, ScoredAlternative, SourceScores};
pub use error::{CategorizeError, ScoringError};
pub use heuristic::{HeuristicScorer, ProbabilityScorer, HEURISTIC_MODEL_ID};
pub use pattern::{PatternMatch, PatternMatcher, PatternRule, RuleError, DEFAULT_RULES};
pub use pipeline::{CategorizationResult, Categorizer};
