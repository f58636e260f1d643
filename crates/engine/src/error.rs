use fincat_core::{ProbabilityError, ValidationError};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ScoringError {
    #[error("Scorer backend error: {0}")]
    Backend(String),
    #[error("Invalid probability vector: {0}")]
    InvalidVector(#[from] ProbabilityError),
}

#[derive(Debug, Error)]
pub enum CategorizeError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Scoring(#[from] ScoringError),
    #[error("Transaction {index}: {source}")]
    BatchItem {
        index: usize,
        #[source]
        source: Box<CategorizeError>,
    },
    #[error("Batch worker failed: {0}")]
    Worker(String),
    #[error("Batch timed out after {0:?}")]
    Timeout(Duration),
    #[error("Batch cancelled")]
    Cancelled,
}

impl CategorizeError {
    /// True when the caller sent bad input, as opposed to a failure while scoring.
    pub fn is_validation(&self) -> bool {
        matches!(self, CategorizeError::Validation(_))
    }
}
