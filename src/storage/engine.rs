//! Engine collaborator traits
//!
//! The query layer never touches storage structures directly. It opens a
//! [`Scope`] on a store through an [`Engine`], asks the scope for a [`Cursor`]
//! over a key range, and advances that cursor one awaited step at a time.
//!
//! Every method that may need to reach the backing engine returns a boxed
//! future, so disk-backed engines can suspend between entries.

use std::fmt;
use std::future::Future;
use std::pin::Pin;

use serde::{Deserialize, Serialize};

use super::entry::Entry;
use super::errors::StorageResult;
use crate::planner::{Direction, KeyRange};

/// Boxed future returned by engine operations
pub type StorageFuture<'a, T> = Pin<Box<dyn Future<Output = StorageResult<T>> + Send + 'a>>;

/// Access mode of a scope
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScopeMode {
    #[default]
    ReadOnly,
    ReadWrite,
}

impl ScopeMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScopeMode::ReadOnly => "readonly",
            ScopeMode::ReadWrite => "readwrite",
        }
    }
}

impl fmt::Display for ScopeMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a scan walks: the store in primary key order, or one of its indexes
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanTarget {
    #[default]
    Store,
    Index(String),
}

impl ScanTarget {
    pub fn index(name: impl Into<String>) -> Self {
        ScanTarget::Index(name.into())
    }

    pub fn index_name(&self) -> Option<&str> {
        match self {
            ScanTarget::Store => None,
            ScanTarget::Index(name) => Some(name),
        }
    }

    /// `store` or `store.index`, for logs and errors
    pub fn qualified(&self, store: &str) -> String {
        match self {
            ScanTarget::Store => store.to_string(),
            ScanTarget::Index(name) => format!("{}.{}", store, name),
        }
    }
}

/// Entry point into an engine
pub trait Engine: Send + Sync + 'static {
    /// Scope type handed out by this engine
    type Scope: Scope;

    /// Open a scope on a store.
    ///
    /// Fails with `StoreNotFound` if the store does not exist.
    fn open_scope<'a>(&'a self, store: &'a str, mode: ScopeMode) -> StorageFuture<'a, Self::Scope>;
}

/// A bounded access context on one store.
///
/// Cursors opened from a scope own their position and must not outlive the
/// scope's release; the executor guarantees this ordering.
pub trait Scope: Send + 'static {
    /// Cursor type opened by this scope
    type Cursor: Cursor;

    /// Name of the store this scope covers
    fn store(&self) -> &str;

    /// Access mode the scope was opened with
    fn mode(&self) -> ScopeMode;

    /// Open a cursor over `range` in `direction`.
    ///
    /// Resolves to `None` when nothing matches. The returned cursor is
    /// positioned on the first matching entry.
    fn open_cursor<'a>(
        &'a self,
        target: &'a ScanTarget,
        range: &'a KeyRange,
        direction: Direction,
    ) -> StorageFuture<'a, Option<Self::Cursor>>;

    /// Read matching entries in ascending order, at most `limit` of them
    fn bulk_read<'a>(
        &'a self,
        target: &'a ScanTarget,
        range: &'a KeyRange,
        limit: Option<u64>,
    ) -> StorageFuture<'a, Vec<Entry>>;

    /// Count matching entries
    fn bulk_count<'a>(&'a self, target: &'a ScanTarget, range: &'a KeyRange)
        -> StorageFuture<'a, u64>;

    /// Release the scope. Must be idempotent.
    fn release(&mut self);
}

/// A positioned scan handle.
///
/// A cursor is either positioned on an entry or exhausted. Advancing is the
/// only mutation, and once exhausted it stays exhausted.
pub trait Cursor: Send + 'static {
    /// Entry under the cursor, or `None` when exhausted
    fn current(&self) -> Option<&Entry>;

    /// Move forward by `count` positions in the cursor's direction.
    ///
    /// `count` is at least 1. Advancing past the last entry exhausts the cursor.
    fn advance(&mut self, count: u64) -> StorageFuture<'_, ()>;
}
