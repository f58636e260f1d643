use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::amount::{Amount, CurrencyCode};

pub const MAX_MERCHANT_LEN: usize = 255;
pub const MAX_BATCH_SIZE: usize = 1000;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("Merchant must not be empty")]
    EmptyMerchant,
    #[error("Merchant is {0} characters, at most 255 allowed")]
    MerchantTooLong(usize),
    #[error("Amount must be greater than zero, got {0}")]
    NonPositiveAmount(String),
    #[error("Currency must be a three-letter code, got '{0}'")]
    InvalidCurrency(String),
    #[error("Batch size cannot exceed {max} transactions (got {size})")]
    BatchTooLarge { size: usize, max: usize },
    #[error("Transaction {index}: {source}")]
    BatchItem {
        index: usize,
        #[source]
        source: Box<ValidationError>,
    },
}

/// A previously categorised transaction passed along as context.
/// Carried as supplied; the id is not checked against the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecentCategory {
    pub category_id: i64,
    pub category_name: String,
}

/// Request as it arrives from a caller, before any checks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnvalidatedRequest {
    pub merchant_normalized: String,
    pub amount: Decimal,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub user_id: Option<i64>,
    #[serde(default)]
    pub last_transactions: Option<Vec<RecentCategory>>,
}

impl UnvalidatedRequest {
    pub fn new(merchant: impl Into<String>, amount: Decimal) -> Self {
        UnvalidatedRequest {
            merchant_normalized: merchant.into(),
            amount,
            currency: None,
            user_id: None,
            last_transactions: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CategorizationRequest {
    /// Lowercased and trimmed merchant description.
    pub merchant: String,
    pub amount: Amount,
    pub currency: CurrencyCode,
    pub user_id: Option<i64>,
    /// Most recent first, as supplied. Not used for scoring.
    pub recent: Vec<RecentCategory>,
}

impl CategorizationRequest {
    pub fn validate(raw: UnvalidatedRequest) -> Result<CategorizationRequest, ValidationError> {
        // Length limits apply to the text as submitted.
        let len = raw.merchant_normalized.chars().count();
        if len == 0 {
            return Err(ValidationError::EmptyMerchant);
        }
        if len > MAX_MERCHANT_LEN {
            return Err(ValidationError::MerchantTooLong(len));
        }

        let amount = Amount::new(raw.amount)?;
        let currency = match raw.currency {
            Some(code) => code.parse()?,
            None => CurrencyCode::default(),
        };

        Ok(CategorizationRequest {
            merchant: raw.merchant_normalized.to_lowercase().trim().to_string(),
            amount,
            currency,
            user_id: raw.user_id,
            recent: raw.last_transactions.unwrap_or_default(),
        })
    }

    pub fn new(merchant: &str, amount: Decimal) -> Result<CategorizationRequest, ValidationError> {
        Self::validate(UnvalidatedRequest::new(merchant, amount))
    }
}

pub fn check_batch_size(size: usize, max: usize) -> Result<(), ValidationError> {
    if size > max {
        return Err(ValidationError::BatchTooLarge { size, max });
    }
    Ok(())
}

/// Validates every entry of a batch, checking the size cap first.
pub fn validate_batch(
    raw: Vec<UnvalidatedRequest>,
    max: usize,
) -> Result<Vec<CategorizationRequest>, ValidationError> {
    check_batch_size(raw.len(), max)?;
    raw.into_iter()
        .enumerate()
        .map(|(index, r)| {
            CategorizationRequest::validate(r).map_err(|e| ValidationError::BatchItem {
                index,
                source: Box::new(e),
            })
        })
        .collect()
}
