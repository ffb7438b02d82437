//! Scan directions
//!
//! Four orders over the entries matching a range: ascending or descending,
//! each either visiting every entry or collapsing entries that share a key.
//! Collapsing only matters on index scans, where many records can carry the
//! same index key; primary keys are unique already.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Iteration order of a cursor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    /// Ascending, every entry
    #[default]
    Forward,
    /// Ascending, one entry per distinct key
    ForwardUnique,
    /// Descending, every entry
    Backward,
    /// Descending, one entry per distinct key
    BackwardUnique,
}

impl Direction {
    /// Map the two caller-facing switches onto a direction
    pub fn resolve(descending: bool, collapse_duplicates: bool) -> Self {
        match (descending, collapse_duplicates) {
            (false, false) => Direction::Forward,
            (false, true) => Direction::ForwardUnique,
            (true, false) => Direction::Backward,
            (true, true) => Direction::BackwardUnique,
        }
    }

    pub fn is_descending(&self) -> bool {
        matches!(self, Direction::Backward | Direction::BackwardUnique)
    }

    pub fn collapses_duplicates(&self) -> bool {
        matches!(self, Direction::ForwardUnique | Direction::BackwardUnique)
    }

    /// Same duplicate handling, opposite order
    pub fn reversed(&self) -> Self {
        Direction::resolve(!self.is_descending(), self.collapses_duplicates())
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Forward => "next",
            Direction::ForwardUnique => "nextunique",
            Direction::Backward => "prev",
            Direction::BackwardUnique => "prevunique",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
