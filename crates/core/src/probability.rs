use serde::{Serialize, Serializer};
use thiserror::Error;

use crate::category::{CategoryId, CATEGORY_COUNT};

/// Allowed drift of a vector's sum away from 1.0.
pub const SUM_TOLERANCE: f64 = 1e-6;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ProbabilityError {
    #[error("Probability at index {index} is not a finite non-negative number: {value}")]
    InvalidEntry { index: usize, value: f64 },
    #[error("Probabilities sum to {0}, expected 1.0")]
    BadSum(f64),
    #[error("Cannot normalise weights summing to {0}")]
    ZeroMass(f64),
}

/// One probability per category, indexed by `category_id - 1`.
///
/// The length is fixed by the type. Each scorer builds its own vector; no
/// component mutates a vector it received from another.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProbabilityVector([f64; CATEGORY_COUNT]);

impl ProbabilityVector {
    /// Wraps raw probabilities without checking them. Pair with [`validate`].
    ///
    /// [`validate`]: ProbabilityVector::validate
    pub fn from_raw(values: [f64; CATEGORY_COUNT]) -> Self {
        Self(values)
    }

    /// Divides every weight by the total so the result sums to one.
    pub fn normalized(weights: [f64; CATEGORY_COUNT]) -> Result<Self, ProbabilityError> {
        let total: f64 = weights.iter().sum();
        if !total.is_finite() || total <= 0.0 {
            return Err(ProbabilityError::ZeroMass(total));
        }
        Ok(Self(weights.map(|w| w / total)))
    }

    /// `winner` gets `mass`; the remainder is spread evenly over the rest.
    /// An invalid `winner` leaves every entry at the shared remainder.
    pub fn concentrated(winner: CategoryId, mass: f64) -> Self {
        let share = (1.0 - mass) / (CATEGORY_COUNT - 1) as f64;
        let mut values = [share; CATEGORY_COUNT];
        if let Some(i) = winner.index() {
            values[i] = mass;
        }
        Self(values)
    }

    pub fn get(&self, id: CategoryId) -> f64 {
        id.index().and_then(|i| self.0.get(i)).copied().unwrap_or(0.0)
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }

    pub fn iter(&self) -> impl Iterator<Item = (CategoryId, f64)> + '_ {
        self.0
            .iter()
            .enumerate()
            .filter_map(|(i, p)| CategoryId::from_index(i).map(|id| (id, *p)))
    }

    pub fn sum(&self) -> f64 {
        self.0.iter().sum()
    }

    /// Checks every entry is finite and non-negative and the total is one.
    pub fn validate(&self) -> Result<(), ProbabilityError> {
        if let Some((index, value)) = self
            .0
            .iter()
            .copied()
            .enumerate()
            .find(|(_, p)| !p.is_finite() || *p < 0.0)
        {
            return Err(ProbabilityError::InvalidEntry { index, value });
        }
        let sum = self.sum();
        if (sum - 1.0).abs() > SUM_TOLERANCE {
            return Err(ProbabilityError::BadSum(sum));
        }
        Ok(())
    }
}

impl Serialize for ProbabilityVector {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.0.as_slice().serialize(serializer)
    }
}
