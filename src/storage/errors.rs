//! # Storage Errors
//!
//! Errors reported by an engine behind the collaborator traits.

use thiserror::Error;

/// Result type for engine operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Engine errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StorageError {
    // ==================
    // Open Errors
    // ==================
    /// Store does not exist
    #[error("Store not found: {0}")]
    StoreNotFound(String),

    /// Index does not exist on the store
    #[error("Index not found: {store}.{index}")]
    IndexNotFound { store: String, index: String },

    // ==================
    // Scope Errors
    // ==================
    /// Scope was aborted while a scan was in flight
    #[error("Scope aborted")]
    ScopeAborted,

    /// Scope was used after release
    #[error("Scope already released")]
    ScopeReleased,

    /// Write attempted in a read-only scope
    #[error("Scope is read-only")]
    ReadOnly,

    // ==================
    // Internal Errors
    // ==================
    /// Backend failure
    #[error("Backend error: {0}")]
    Backend(String),
}

impl StorageError {
    /// Returns the stable error code
    pub fn code(&self) -> &'static str {
        match self {
            StorageError::StoreNotFound(_) => "STORAGE_STORE_NOT_FOUND",
            StorageError::IndexNotFound { .. } => "STORAGE_INDEX_NOT_FOUND",
            StorageError::ScopeAborted => "STORAGE_SCOPE_ABORTED",
            StorageError::ScopeReleased => "STORAGE_SCOPE_RELEASED",
            StorageError::ReadOnly => "STORAGE_READ_ONLY",
            StorageError::Backend(_) => "STORAGE_BACKEND",
        }
    }

    /// Whether the error means the scan target could not be opened at all
    pub fn is_open_failure(&self) -> bool {
        matches!(
            self,
            StorageError::StoreNotFound(_) | StorageError::IndexNotFound { .. }
        )
    }
}
