use fincat_core::{CategorizationRequest, CategoryId, ProbabilityVector, CATEGORY_COUNT};

use crate::error::ScoringError;

/// Abstraction over the learned half of the ensemble.
/// Implementations turn a request into a probability per category.
pub trait ProbabilityScorer: Send + Sync {
    /// Identifier reported alongside every prediction.
    fn model_id(&self) -> &str;

    fn score(&self, request: &CategorizationRequest) -> Result<ProbabilityVector, ScoringError>;
}

// ── Keyword heuristic (stands in for a trained model) ─────────────────────────

pub const HEURISTIC_MODEL_ID: &str = "distilbert-financial-v1";

const BASELINE_WEIGHT: f64 = 0.05;
const DEFAULT_WEIGHT: f64 = 0.65;

#[derive(Debug, Clone, Copy)]
pub struct KeywordGroup {
    pub keywords: &'static [&'static str],
    pub category_id: CategoryId,
    pub weight: f64,
}

impl KeywordGroup {
    fn matches(&self, merchant: &str) -> bool {
        self.keywords.iter().any(|k| merchant.contains(k))
    }
}

/// Checked in order; the first group with a keyword inside the merchant wins.
pub const KEYWORD_GROUPS: &[KeywordGroup] = &[
    KeywordGroup {
        keywords: &["food", "restaurant", "cafe", "pizza", "burger"],
        category_id: CategoryId(1),
        weight: 0.85,
    },
    KeywordGroup {
        keywords: &["grocery", "supermarket", "mart"],
        category_id: CategoryId(2),
        weight: 0.82,
    },
    KeywordGroup {
        keywords: &["cab", "taxi", "bus", "metro", "train"],
        category_id: CategoryId(3),
        weight: 0.88,
    },
    KeywordGroup {
        keywords: &["shop", "store", "fashion", "clothing"],
        category_id: CategoryId(4),
        weight: 0.80,
    },
];

/// Deterministic keyword scorer. Amount and recent-category context are
/// accepted through [`ProbabilityScorer::score`] but do not affect the output.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeuristicScorer;

impl HeuristicScorer {
    /// Category and raw weight picked for `merchant` before normalisation.
    pub fn pick(&self, merchant: &str) -> (CategoryId, f64) {
        let text = merchant.to_lowercase();
        KEYWORD_GROUPS
            .iter()
            .find(|g| g.matches(&text))
            .map(|g| (g.category_id, g.weight))
            .unwrap_or((CategoryId::OTHERS, DEFAULT_WEIGHT))
    }

    pub fn score_merchant(&self, merchant: &str) -> Result<ProbabilityVector, ScoringError> {
        let (category_id, weight) = self.pick(merchant);
        let mut weights = [BASELINE_WEIGHT; CATEGORY_COUNT];
        if let Some(i) = category_id.index() {
            weights[i] = weight;
        }
        Ok(ProbabilityVector::normalized(weights)?)
    }
}

impl ProbabilityScorer for HeuristicScorer {
    fn model_id(&self) -> &str {
        HEURISTIC_MODEL_ID
    }

    fn score(&self, request: &CategorizationRequest) -> Result<ProbabilityVector, ScoringError> {
        self.score_merchant(&request.merchant)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fincat_core::{Decimal, RecentCategory};

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-3
    }

    #[test]
    fn cafe_scores_food() {
        let v = HeuristicScorer.score_merchant("local cafe").unwrap();
        assert!(close(v.get(CategoryId(1)), 0.548));
        assert!(close(v.get(CategoryId(2)), 0.032));
        assert!(v.validate().is_ok());
    }

    #[test]
    fn unknown_merchant_defaults_to_others() {
        let v = HeuristicScorer.score_merchant("swiggy bangalore").unwrap();
        assert!(close(v.get(CategoryId::OTHERS), 0.481));
        assert!(close(v.get(CategoryId(1)), 0.037));
        assert!(v.validate().is_ok());
    }

    #[test]
    fn groups_are_checked_in_priority_order() {
        // "food" (group 1) beats "mart" (group 2).
        assert_eq!(HeuristicScorer.pick("food mart").0, CategoryId(1));
        // "supermarket" (group 2) beats "store" (group 4).
        assert_eq!(HeuristicScorer.pick("supermarket store").0, CategoryId(2));
        assert_eq!(HeuristicScorer.pick("city taxi").0, CategoryId(3));
        assert_eq!(HeuristicScorer.pick("fashion hub").0, CategoryId(4));
    }

    #[test]
    fn keywords_match_as_substrings() {
        // "bus" inside "business"
        assert_eq!(HeuristicScorer.pick("business lounge"), (CategoryId(3), 0.88));
        assert_eq!(HeuristicScorer.pick("walmart"), (CategoryId(2), 0.82));
    }

    #[test]
    fn matched_weight_replaces_baseline() {
        let v = HeuristicScorer.score_merchant("burger king").unwrap();
        let total = 0.85 + 14.0 * 0.05;
        assert!((v.get(CategoryId(1)) - 0.85 / total).abs() < 1e-12);
        assert!((v.get(CategoryId(9)) - 0.05 / total).abs() < 1e-12);
    }

    #[test]
    fn context_and_amount_do_not_change_score() {
        let plain = CategorizationRequest::new("pizza express", Decimal::from(10)).unwrap();
        let mut with_context =
            CategorizationRequest::new("pizza express", Decimal::from(99_999)).unwrap();
        with_context.recent = vec![RecentCategory {
            category_id: 8,
            category_name: "Travel".to_string(),
        }];
        let a = HeuristicScorer.score(&plain).unwrap();
        let b = HeuristicScorer.score(&with_context).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn model_id_is_fixed() {
        assert_eq!(HeuristicScorer.model_id(), "distilbert-financial-v1");
    }
}
