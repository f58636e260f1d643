use fincat_core::{CategorizationRequest, CategoryCatalog, CategoryId};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;

use crate::ensemble::{EnsembleCombiner, ScoredAlternative, SourceScores};
use crate::error::{CategorizeError, ScoringError};
use crate::heuristic::{HeuristicScorer, ProbabilityScorer};
use crate::pattern::PatternMatcher;
use crate::util::{round_to, whole_millis};

/// Final prediction for a single transaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategorizationResult {
    pub category_id: CategoryId,
    pub category_name: String,
    /// Fused probability of the winner, rounded to 3 places.
    pub confidence_score: f64,
    pub alternatives: Vec<ScoredAlternative>,
    /// Milliseconds spent on pattern match, scoring and fusion.
    pub inference_time: u64,
    pub model: String,
    pub sources: SourceScores,
}

/// Orchestrates: pattern match → learned score → ensemble fusion.
pub struct Categorizer<S: ProbabilityScorer = HeuristicScorer> {
    catalog: Arc<CategoryCatalog>,
    matcher: PatternMatcher,
    scorer: S,
    combiner: EnsembleCombiner,
}

impl Default for Categorizer<HeuristicScorer> {
    fn default() -> Self {
        Self::new(
            Arc::new(CategoryCatalog::default()),
            PatternMatcher::default(),
            HeuristicScorer,
        )
    }
}

impl<S: ProbabilityScorer> Categorizer<S> {
    pub fn new(catalog: Arc<CategoryCatalog>, matcher: PatternMatcher, scorer: S) -> Self {
        let combiner = EnsembleCombiner::new(Arc::clone(&catalog));
        Self {
            catalog,
            matcher,
            scorer,
            combiner,
        }
    }

    pub fn catalog(&self) -> &CategoryCatalog {
        &self.catalog
    }

    pub fn matcher(&self) -> &PatternMatcher {
        &self.matcher
    }

    pub fn scorer(&self) -> &S {
        &self.scorer
    }

    pub fn model_id(&self) -> &str {
        self.scorer.model_id()
    }

    pub fn categorize(
        &self,
        request: &CategorizationRequest,
    ) -> Result<CategorizationResult, CategorizeError> {
        let started = Instant::now();

        let pattern = self.matcher.match_merchant(&request.merchant);
        let heuristic = self.scorer.score(request)?;
        heuristic.validate().map_err(ScoringError::from)?;
        let fusion = self.combiner.combine(&pattern.probabilities, &heuristic);

        let inference_time = whole_millis(started.elapsed());

        tracing::debug!(
            merchant = %request.merchant,
            pattern_category = %pattern.category_id,
            pattern_confidence = pattern.confidence,
            matched_pattern = pattern.matched_pattern.as_deref().unwrap_or("-"),
            category = %fusion.category_id,
            score = fusion.score,
            "categorized transaction"
        );

        Ok(CategorizationResult {
            category_id: fusion.category_id,
            category_name: fusion.category_name,
            confidence_score: round_to(fusion.score, 3),
            alternatives: fusion.alternatives,
            inference_time,
            model: self.scorer.model_id().to_string(),
            sources: fusion.sources,
        })
    }
}
