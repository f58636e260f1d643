pub mod amount;
pub mod category;
pub mod probability;
pub mod request;

pub use amount::{Amount, CurrencyCode, DEFAULT_CURRENCY};
pub use category::{Category, CategoryCatalog, CategoryId, CATEGORY_COUNT, DEFAULT_CATEGORIES};
pub use probability::{ProbabilityError, ProbabilityVector, SUM_TOLERANCE};
pub use request::{
    check_batch_size, validate_batch, CategorizationRequest, RecentCategory, UnvalidatedRequest,
    ValidationError, MAX_BATCH_SIZE, MAX_MERCHANT_LEN,
};
pub use rust_decimal::Decimal;
