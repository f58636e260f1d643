use fincat_core::{CategoryCatalog, CategoryId, ProbabilityVector, CATEGORY_COUNT};
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Confidence reported when no rule matches.
pub const NO_MATCH_CONFIDENCE: f64 = 0.50;
const NO_MATCH_SPREAD: f64 = 0.07;
const NO_MATCH_OTHERS: f64 = 0.02;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PatternRule {
    /// Lowercase substring; surrounding whitespace is part of the pattern.
    pub pattern: String,
    pub category_id: CategoryId,
    pub confidence: f64,
}

#[derive(Debug, Error)]
pub enum RuleError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse rule table: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Rule {index} has an empty pattern")]
    EmptyPattern { index: usize },
    #[error("Rule {index} ('{pattern}') targets unknown category {category_id}")]
    UnknownCategory {
        index: usize,
        pattern: String,
        category_id: CategoryId,
    },
    #[error("Rule {index} ('{pattern}') has confidence {confidence} outside (0, 1]")]
    InvalidConfidence {
        index: usize,
        pattern: String,
        confidence: f64,
    },
}

/// Built-in merchant table. Evaluation order matters for equal confidences.
pub const DEFAULT_RULES: &[(&str, u8, f64)] = &[
    // Food & Dining
    ("swiggy", 1, 0.98),
    ("zomato", 1, 0.98),
    ("dominos", 1, 0.95),
    ("mcdonald", 1, 0.95),
    ("kfc", 1, 0.95),
    ("starbucks", 1, 0.92),
    ("pizza hut", 1, 0.95),
    // Groceries
    ("zepto", 2, 0.98),
    ("blinkit", 2, 0.98),
    ("bigbasket", 2, 0.98),
    ("dmart", 2, 0.97),
    ("reliance fresh", 2, 0.97),
    // Transportation
    ("uber", 3, 0.98),
    ("ola", 3, 0.98),
    ("rapido", 3, 0.97),
    ("bmtc", 3, 0.99),
    ("metro", 3, 0.95),
    ("irctc", 3, 0.98),
    // Shopping
    ("amazon", 4, 0.90),
    ("flipkart", 4, 0.95),
    ("myntra", 4, 0.98),
    ("ajio", 4, 0.98),
    // Entertainment
    ("bookmyshow", 5, 0.99),
    ("pvr", 5, 0.99),
    ("inox", 5, 0.99),
    // Bills & Utilities
    ("electricity", 7, 0.99),
    ("water bill", 7, 0.99),
    ("paytm", 7, 0.85),
    ("phonepe", 7, 0.85),
    // Subscriptions
    ("netflix", 12, 0.99),
    ("prime", 12, 0.98),
    ("spotify", 12, 0.99),
    ("hotstar", 12, 0.99),
    // Fuel
    ("petrol", 13, 0.98),
    ("diesel", 13, 0.98),
    ("indian oil", 13, 0.98),
    ("hp ", 13, 0.97),
];

#[derive(Debug, Deserialize)]
struct RuleTable {
    rules: Vec<PatternRule>,
}

/// Outcome of scanning a merchant against the rule table.
#[derive(Debug, Clone, PartialEq)]
pub struct PatternMatch {
    pub category_id: CategoryId,
    pub confidence: f64,
    pub probabilities: ProbabilityVector,
    /// Pattern of the winning rule, `None` when nothing matched.
    pub matched_pattern: Option<String>,
}

pub struct PatternMatcher {
    rules: Vec<PatternRule>,
}

impl Default for PatternMatcher {
    fn default() -> Self {
        let rules = DEFAULT_RULES
            .iter()
            .map(|(pattern, id, confidence)| PatternRule {
                pattern: pattern.to_string(),
                category_id: CategoryId(*id),
                confidence: *confidence,
            })
            .collect();
        Self { rules }
    }
}

impl PatternMatcher {
    /// Checks every rule against `catalog` and lowercases patterns.
    /// Declaration order is kept.
    pub fn new(rules: Vec<PatternRule>, catalog: &CategoryCatalog) -> Result<Self, RuleError> {
        let rules = rules
            .into_iter()
            .enumerate()
            .map(|(index, rule)| validate_rule(index, rule, catalog))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { rules })
    }

    /// Parses a table of `[[rules]]` entries.
    pub fn from_toml(toml_content: &str, catalog: &CategoryCatalog) -> Result<Self, RuleError> {
        let table: RuleTable = toml::from_str(toml_content)?;
        Self::new(table.rules, catalog)
    }

    pub fn from_file(path: &Path, catalog: &CategoryCatalog) -> Result<Self, RuleError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content, catalog)
    }

    pub fn rules(&self) -> &[PatternRule] {
        &self.rules
    }

    /// Highest-confidence rule contained in `merchant`. Among equal
    /// confidences the earliest rule wins.
    pub fn find_best_rule(&self, merchant: &str) -> Option<&PatternRule> {
        let text = merchant.to_lowercase();
        let mut best: Option<&PatternRule> = None;
        for rule in &self.rules {
            if !text.contains(&rule.pattern) {
                continue;
            }
            if best.map_or(true, |b| rule.confidence > b.confidence) {
                best = Some(rule);
            }
        }
        best
    }

    pub fn match_merchant(&self, merchant: &str) -> PatternMatch {
        match self.find_best_rule(merchant) {
            Some(rule) => PatternMatch {
                category_id: rule.category_id,
                confidence: rule.confidence,
                probabilities: ProbabilityVector::concentrated(rule.category_id, rule.confidence),
                matched_pattern: Some(rule.pattern.clone()),
            },
            None => {
                // The reported confidence (0.50) intentionally differs from
                // the vector entry for Others (0.02).
                let mut values = [NO_MATCH_SPREAD; CATEGORY_COUNT];
                // Others is the last slot.
                values[CATEGORY_COUNT - 1] = NO_MATCH_OTHERS;
                PatternMatch {
                    category_id: CategoryId::OTHERS,
                    confidence: NO_MATCH_CONFIDENCE,
                    probabilities: ProbabilityVector::from_raw(values),
                    matched_pattern: None,
                }
            }
        }
    }
}

fn validate_rule(
    index: usize,
    rule: PatternRule,
    catalog: &CategoryCatalog,
) -> Result<PatternRule, RuleError> {
    if rule.pattern.is_empty() {
        return Err(RuleError::EmptyPattern { index });
    }
    if !catalog.contains(rule.category_id) {
        return Err(RuleError::UnknownCategory {
            index,
            pattern: rule.pattern,
            category_id: rule.category_id,
        });
    }
    if !(rule.confidence > 0.0 && rule.confidence <= 1.0) {
        return Err(RuleError::InvalidConfidence {
            index,
            pattern: rule.pattern,
            confidence: rule.confidence,
        });
    }
    Ok(PatternRule {
        pattern: rule.pattern.to_lowercase(),
        ..rule
    })
}
