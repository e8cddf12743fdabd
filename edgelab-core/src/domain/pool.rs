//! R-multiple distribution pool.
//!
//! The pool is the only input the simulators sample from. Draws are independent
//! and with replacement, so only the multiset of values and its size matter;
//! the order is kept for display.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// One row of manual frequency entry: "this R-multiple happened `count` times".
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FrequencyRow {
    pub r_multiple: f64,
    pub count: u32,
}

impl FrequencyRow {
    pub fn new(r_multiple: f64, count: u32) -> Self {
        Self { r_multiple, count }
    }
}

/// Errors raised while building a pool.
#[derive(Debug, Error, PartialEq)]
pub enum PoolError {
    #[error("distribution pool is empty")]
    Empty,

    #[error("no frequency rows with a positive count")]
    EmptyFrequencyRows,

    #[error("non-finite R-multiple at position {index}")]
    NonFinite { index: usize },
}

/// Immutable, non-empty sequence of R-multiples.
///
/// Deserialization goes through [`RPool::from_values`], so a decoded pool
/// upholds the same invariants as a constructed one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<f64>", into = "Vec<f64>")]
pub struct RPool {
    values: Vec<f64>,
}

impl RPool {
    /// Build a pool from raw R-multiples.
    pub fn from_values(values: Vec<f64>) -> Result<Self, PoolError> {
        if values.is_empty() {
            return Err(PoolError::Empty);
        }
        if let Some(index) = values.iter().position(|v| !v.is_finite()) {
            return Err(PoolError::NonFinite { index });
        }
        Ok(Self { values })
    }

    /// Expand frequency rows into a pool, row by row in the given order.
    ///
    /// Rows with a zero count contribute nothing; if every row is empty the
    /// pool cannot be built.
    pub fn from_frequencies(rows: &[FrequencyRow]) -> Result<Self, PoolError> {
        let total: usize = rows.iter().map(|r| r.count as usize).sum();
        if total == 0 {
            return Err(PoolError::EmptyFrequencyRows);
        }
        let mut values = Vec::with_capacity(total);
        for row in rows {
            values.extend(std::iter::repeat(row.r_multiple).take(row.count as usize));
        }
        Self::from_values(values)
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Always false for a constructed pool; kept for slice-like ergonomics.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn into_values(self) -> Vec<f64> {
        self.values
    }

    pub fn has_losses(&self) -> bool {
        self.values.iter().any(|&v| v < 0.0)
    }
}

impl AsRef<[f64]> for RPool {
    fn as_ref(&self) -> &[f64] {
        &self.values
    }
}

impl TryFrom<Vec<f64>> for RPool {
    type Error = PoolError;

    fn try_from(values: Vec<f64>) -> Result<Self, PoolError> {
        Self::from_values(values)
    }
}

impl From<RPool> for Vec<f64> {
    fn from(pool: RPool) -> Self {
        pool.values
    }
}
