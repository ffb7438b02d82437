//! Key ranges and their construction from partial bounds
//!
//! A [`KeyRange`] describes which keys a scan may visit. Callers rarely hold
//! a complete range up front; [`KeyRangeBuilder`] collects whatever bounds are
//! known and folds them into one range. When both a start and an end are
//! given the result is always [`KeyRange::Bounded`], never a one-sided range.

use std::cmp::Ordering;
use std::fmt;
use std::ops::Bound;

use serde::{Deserialize, Serialize};

use super::errors::RangeError;
use crate::storage::Key;

/// Set of keys a scan may visit
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum KeyRange {
    /// Every key
    #[default]
    Unbounded,
    /// Exactly one key
    Exact { key: Key },
    /// Keys at or above `key` (above when exclusive)
    LowerBound { key: Key, exclusive: bool },
    /// Keys at or below `key` (below when exclusive)
    UpperBound { key: Key, exclusive: bool },
    /// Keys between `low` and `high`
    Bounded {
        low: Key,
        high: Key,
        low_exclusive: bool,
        high_exclusive: bool,
    },
}

impl KeyRange {
    pub fn only(key: Key) -> Self {
        KeyRange::Exact { key }
    }

    pub fn lower_bound(key: Key, exclusive: bool) -> Self {
        KeyRange::LowerBound { key, exclusive }
    }

    pub fn upper_bound(key: Key, exclusive: bool) -> Self {
        KeyRange::UpperBound { key, exclusive }
    }

    pub fn bound(low: Key, high: Key, low_exclusive: bool, high_exclusive: bool) -> Self {
        KeyRange::Bounded {
            low,
            high,
            low_exclusive,
            high_exclusive,
        }
    }

    /// Reject a bounded range whose low end sorts after its high end.
    ///
    /// `low == high` with an exclusive side is valid and simply empty.
    pub fn validate(&self) -> Result<(), RangeError> {
        match self {
            KeyRange::Bounded { low, high, .. } if low > high => {
                Err(RangeError::new(low.clone(), high.clone()))
            }
            _ => Ok(()),
        }
    }

    /// Whether no key can ever match
    pub fn is_empty(&self) -> bool {
        match self {
            KeyRange::Bounded {
                low,
                high,
                low_exclusive,
                high_exclusive,
            } => match low.cmp(high) {
                Ordering::Greater => true,
                Ordering::Equal => *low_exclusive || *high_exclusive,
                Ordering::Less => false,
            },
            _ => false,
        }
    }

    /// Whether `key` falls inside the range
    pub fn contains(&self, key: &Key) -> bool {
        match self {
            KeyRange::Unbounded => true,
            KeyRange::Exact { key: k } => key == k,
            KeyRange::LowerBound { key: k, exclusive } => above(key, k, *exclusive),
            KeyRange::UpperBound { key: k, exclusive } => below(key, k, *exclusive),
            KeyRange::Bounded {
                low,
                high,
                low_exclusive,
                high_exclusive,
            } => above(key, low, *low_exclusive) && below(key, high, *high_exclusive),
        }
    }

    /// Bounds for an ordered-map range scan.
    ///
    /// Returns `None` for an empty range, so callers never hand an ordered map
    /// a start that sorts after its end.
    pub fn bounds(&self) -> Option<(Bound<&Key>, Bound<&Key>)> {
        if self.is_empty() {
            return None;
        }
        let bounds = match self {
            KeyRange::Unbounded => (Bound::Unbounded, Bound::Unbounded),
            KeyRange::Exact { key } => (Bound::Included(key), Bound::Included(key)),
            KeyRange::LowerBound { key, exclusive } => (edge(key, *exclusive), Bound::Unbounded),
            KeyRange::UpperBound { key, exclusive } => (Bound::Unbounded, edge(key, *exclusive)),
            KeyRange::Bounded {
                low,
                high,
                low_exclusive,
                high_exclusive,
            } => (edge(low, *low_exclusive), edge(high, *high_exclusive)),
        };
        Some(bounds)
    }
}

fn edge(key: &Key, exclusive: bool) -> Bound<&Key> {
    if exclusive {
        Bound::Excluded(key)
    } else {
        Bound::Included(key)
    }
}

fn above(key: &Key, low: &Key, exclusive: bool) -> bool {
    if exclusive {
        key > low
    } else {
        key >= low
    }
}

fn below(key: &Key, high: &Key, exclusive: bool) -> bool {
    if exclusive {
        key < high
    } else {
        key <= high
    }
}

impl fmt::Display for KeyRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let open = |exclusive: bool| if exclusive { '(' } else { '[' };
        let close = |exclusive: bool| if exclusive { ')' } else { ']' };
        match self {
            KeyRange::Unbounded => write!(f, "(-inf, +inf)"),
            KeyRange::Exact { key } => write!(f, "[{}]", key),
            KeyRange::LowerBound { key, exclusive } => {
                write!(f, "{}{}, +inf)", open(*exclusive), key)
            }
            KeyRange::UpperBound { key, exclusive } => {
                write!(f, "(-inf, {}{}", key, close(*exclusive))
            }
            KeyRange::Bounded {
                low,
                high,
                low_exclusive,
                high_exclusive,
            } => write!(
                f,
                "{}{}, {}{}",
                open(*low_exclusive),
                low,
                high,
                close(*high_exclusive)
            ),
        }
    }
}

/// Collects partial bounds and folds them into a [`KeyRange`].
///
/// An exact value wins over every bound. Otherwise the range is bounded on
/// whichever sides were supplied.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyRangeBuilder {
    value: Option<Key>,
    start: Option<Key>,
    start_exclusive: bool,
    end: Option<Key>,
    end_exclusive: bool,
}

impl KeyRangeBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder from the raw optional parameters
    pub fn from_parts(
        value: Option<Key>,
        start: Option<Key>,
        start_exclusive: bool,
        end: Option<Key>,
        end_exclusive: bool,
    ) -> Self {
        Self {
            value,
            start,
            start_exclusive,
            end,
            end_exclusive,
        }
    }

    pub fn value(mut self, key: Key) -> Self {
        self.value = Some(key);
        self
    }

    pub fn start(mut self, key: Key, exclusive: bool) -> Self {
        self.start = Some(key);
        self.start_exclusive = exclusive;
        self
    }

    pub fn end(mut self, key: Key, exclusive: bool) -> Self {
        self.end = Some(key);
        self.end_exclusive = exclusive;
        self
    }

    pub fn build(self) -> KeyRange {
        if let Some(key) = self.value {
            return KeyRange::only(key);
        }
        match (self.start, self.end) {
            (Some(low), Some(high)) => {
                KeyRange::bound(low, high, self.start_exclusive, self.end_exclusive)
            }
            (Some(key), None) => KeyRange::lower_bound(key, self.start_exclusive),
            (None, Some(key)) => KeyRange::upper_bound(key, self.end_exclusive),
            (None, None) => KeyRange::Unbounded,
        }
    }
}
