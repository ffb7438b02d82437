//! Query specifications
//!
//! A [`QuerySpec`] names the store (and optionally an index) to scan, the
//! key range and direction, and the skip/limit/filter/map stages applied to
//! the cursor. Specs are immutable once built and can be executed repeatedly.

use std::fmt;
use std::sync::Arc;

use super::direction::Direction;
use super::range::KeyRange;
use crate::executor::TransformError;
use crate::storage::{Entry, ScanTarget, ScopeMode};

/// Predicate deciding whether an entry is accepted
pub type EntryFilter = Arc<dyn Fn(&Entry) -> Result<bool, TransformError> + Send + Sync>;

/// Projection applied to every emitted entry
pub type EntryMap<T> = Arc<dyn Fn(&Entry) -> Result<T, TransformError> + Send + Sync>;

/// Caller-supplied description of one range query.
///
/// The type parameter is what the query emits: [`Entry`] until a map stage
/// is attached.
pub struct QuerySpec<T = Entry> {
    store: String,
    index: Option<String>,
    range: KeyRange,
    direction: Direction,
    skip: u64,
    limit: Option<u64>,
    mode: ScopeMode,
    filter: Option<EntryFilter>,
    map: EntryMap<T>,
    mapped: bool,
}

impl QuerySpec<Entry> {
    /// Scan `store` in primary key order over every key
    pub fn new(store: impl Into<String>) -> Self {
        Self {
            store: store.into(),
            index: None,
            range: KeyRange::Unbounded,
            direction: Direction::Forward,
            skip: 0,
            limit: None,
            mode: ScopeMode::ReadOnly,
            filter: None,
            map: Arc::new(|entry: &Entry| Ok::<_, TransformError>(entry.clone())),
            mapped: false,
        }
    }
}

impl<T> QuerySpec<T> {
    /// Scan a secondary index instead of the primary key order
    pub fn with_index(mut self, index: impl Into<String>) -> Self {
        self.index = Some(index.into());
        self
    }

    pub fn with_range(mut self, range: KeyRange) -> Self {
        self.range = range;
        self
    }

    pub fn with_direction(mut self, direction: Direction) -> Self {
        self.direction = direction;
        self
    }

    /// Number of accepted entries to pass over before emitting
    pub fn with_skip(mut self, skip: u64) -> Self {
        self.skip = skip;
        self
    }

    /// Maximum number of entries to emit
    pub fn with_limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Declare intent to mutate; the scope is opened read-write
    pub fn read_write(mut self) -> Self {
        self.mode = ScopeMode::ReadWrite;
        self
    }

    /// Only accept entries for which `predicate` holds
    pub fn with_filter<F>(self, predicate: F) -> Self
    where
        F: Fn(&Entry) -> bool + Send + Sync + 'static,
    {
        self.with_try_filter(move |entry| Ok(predicate(entry)))
    }

    /// Like [`with_filter`](Self::with_filter), but the predicate may fail
    pub fn with_try_filter<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&Entry) -> Result<bool, TransformError> + Send + Sync + 'static,
    {
        self.filter = Some(Arc::new(predicate));
        self
    }

    /// Emit `f(entry)` instead of the entry
    pub fn with_map<U, F>(self, f: F) -> QuerySpec<U>
    where
        F: Fn(&Entry) -> U + Send + Sync + 'static,
    {
        self.with_try_map(move |entry| Ok(f(entry)))
    }

    /// Like [`with_map`](Self::with_map), but the projection may fail
    pub fn with_try_map<U, F>(self, f: F) -> QuerySpec<U>
    where
        F: Fn(&Entry) -> Result<U, TransformError> + Send + Sync + 'static,
    {
        QuerySpec {
            store: self.store,
            index: self.index,
            range: self.range,
            direction: self.direction,
            skip: self.skip,
            limit: self.limit,
            mode: self.mode,
            filter: self.filter,
            map: Arc::new(f),
            mapped: true,
        }
    }

    pub fn store(&self) -> &str {
        &self.store
    }

    pub fn index(&self) -> Option<&str> {
        self.index.as_deref()
    }

    pub fn target(&self) -> ScanTarget {
        match &self.index {
            Some(name) => ScanTarget::index(name.as_str()),
            None => ScanTarget::Store,
        }
    }

    pub fn range(&self) -> &KeyRange {
        &self.range
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn skip(&self) -> u64 {
        self.skip
    }

    pub fn limit(&self) -> Option<u64> {
        self.limit
    }

    pub fn mode(&self) -> ScopeMode {
        self.mode
    }

    pub fn filter(&self) -> Option<&EntryFilter> {
        self.filter.as_ref()
    }

    pub fn map(&self) -> &EntryMap<T> {
        &self.map
    }

    pub fn has_filter(&self) -> bool {
        self.filter.is_some()
    }

    /// Whether a map stage replaces the emitted entries
    pub fn is_mapped(&self) -> bool {
        self.mapped
    }
}

impl<T> Clone for QuerySpec<T> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            index: self.index.clone(),
            range: self.range.clone(),
            direction: self.direction,
            skip: self.skip,
            limit: self.limit,
            mode: self.mode,
            filter: self.filter.clone(),
            map: Arc::clone(&self.map),
            mapped: self.mapped,
        }
    }
}

impl<T> fmt::Debug for QuerySpec<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QuerySpec")
            .field("store", &self.store)
            .field("index", &self.index)
            .field("range", &self.range)
            .field("direction", &self.direction)
            .field("skip", &self.skip)
            .field("limit", &self.limit)
            .field("mode", &self.mode)
            .field("filtered", &self.filter.is_some())
            .field("mapped", &self.mapped)
            .finish()
    }
}
