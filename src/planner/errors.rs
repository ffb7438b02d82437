//! Planner error types
//!
//! Error codes:
//! - QUERY_RANGE_INVALID

use thiserror::Error;

use crate::storage::Key;

/// A bounded key range whose lower bound sorts after its upper bound.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("lower bound {low} is greater than upper bound {high}")]
pub struct RangeError {
    pub low: Key,
    pub high: Key,
}

impl RangeError {
    pub fn new(low: Key, high: Key) -> Self {
        Self { low, high }
    }

    /// Returns the stable error code
    pub fn code(&self) -> &'static str {
        "QUERY_RANGE_INVALID"
    }
}
