use fincat_core::{CategoryCatalog, CategoryId, ProbabilityVector, CATEGORY_COUNT};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::util::round_to;

pub const HEURISTIC_WEIGHT: f64 = 0.7;
pub const PATTERN_WEIGHT: f64 = 0.3;
pub const ALTERNATIVE_COUNT: usize = 3;
const SCORE_DECIMALS: i32 = 3;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredAlternative {
    pub category_id: CategoryId,
    pub category_name: String,
    pub score: f64,
}

/// Each scorer's probability for the winning category.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SourceScores {
    pub heuristic: f64,
    pub pattern: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Fusion {
    pub category_id: CategoryId,
    pub category_name: String,
    /// Fused probability of the winner, unrounded.
    pub score: f64,
    pub probabilities: ProbabilityVector,
    pub alternatives: Vec<ScoredAlternative>,
    pub sources: SourceScores,
}

/// Fixed-weight linear blend of the heuristic and pattern vectors.
pub struct EnsembleCombiner {
    catalog: Arc<CategoryCatalog>,
}

impl EnsembleCombiner {
    pub fn new(catalog: Arc<CategoryCatalog>) -> Self {
        Self { catalog }
    }

    pub fn combine(&self, pattern: &ProbabilityVector, heuristic: &ProbabilityVector) -> Fusion {
        let mut fused = [0.0; CATEGORY_COUNT];
        for (slot, (h, p)) in fused
            .iter_mut()
            .zip(heuristic.as_slice().iter().zip(pattern.as_slice()))
        {
            *slot = HEURISTIC_WEIGHT * h + PATTERN_WEIGHT * p;
        }
        let probabilities = ProbabilityVector::from_raw(fused);

        let (winner, score) = first_max(&probabilities);
        let alternatives = self.rank_alternatives(&probabilities, winner);

        Fusion {
            category_id: winner,
            category_name: self.catalog.name(winner).to_string(),
            score,
            probabilities,
            alternatives,
            sources: SourceScores {
                heuristic: round_to(heuristic.get(winner), SCORE_DECIMALS),
                pattern: round_to(pattern.get(winner), SCORE_DECIMALS),
            },
        }
    }

    /// Runners-up by descending score; ties resolve to the lower id.
    fn rank_alternatives(
        &self,
        probabilities: &ProbabilityVector,
        winner: CategoryId,
    ) -> Vec<ScoredAlternative> {
        let mut ranked: Vec<(CategoryId, f64)> = probabilities.iter().collect();
        // Stable sort keeps ascending id order among equal scores.
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1));
        ranked
            .into_iter()
            .filter(|(id, _)| *id != winner)
            .take(ALTERNATIVE_COUNT)
            .map(|(id, score)| ScoredAlternative {
                category_id: id,
                category_name: self.catalog.name(id).to_string(),
                score: round_to(score, SCORE_DECIMALS),
            })
            .collect()
    }
}

/// Highest entry; the lowest index wins ties.
fn first_max(probabilities: &ProbabilityVector) -> (CategoryId, f64) {
    let mut best = (CategoryId(1), f64::NEG_INFINITY);
    for (id, p) in probabilities.iter() {
        if p > best.1 {
            best = (id, p);
        }
    }
    best
}
