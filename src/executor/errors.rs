//! Executor error types
//!
//! Error codes:
//! - QUERY_RANGE_INVALID (rejected before any scope opens)
//! - QUERY_CURSOR_OPEN_FAILED
//! - QUERY_ITERATION_FAILED
//! - QUERY_TRANSFORM_FAILED
//! - QUERY_UNSUPPORTED (rejected before any scope opens)
//!
//! None of these are retried inside the executor. Running out of entries
//! before the limit is reached is not an error.

use thiserror::Error;

use crate::planner::RangeError;
use crate::storage::StorageError;

/// Result type for executor operations
pub type QueryResult<T> = Result<T, QueryError>;

/// Failure raised by a caller-supplied filter or map
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct TransformError {
    message: String,
}

impl TransformError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<serde_json::Error> for TransformError {
    fn from(err: serde_json::Error) -> Self {
        TransformError::new(format!("JSON error: {}", err))
    }
}

/// Query failures
#[derive(Debug, Error)]
pub enum QueryError {
    /// Bounded range with low after high
    #[error("Invalid key range: {0}")]
    Range(#[from] RangeError),

    /// Scope or cursor could not be opened
    #[error("Failed to open cursor on {target}: {source}")]
    CursorOpen {
        target: String,
        #[source]
        source: StorageError,
    },

    /// Engine failed mid-scan
    #[error("Iteration failed after {visited} entries: {source}")]
    Iteration {
        visited: u64,
        #[source]
        source: StorageError,
    },

    /// Filter or map failed
    #[error("Transform failed: {0}")]
    Transform(#[from] TransformError),

    /// Bulk operation given a stage it does not run
    #[error("Bulk {operation} does not support {stage}")]
    Unsupported {
        operation: &'static str,
        stage: &'static str,
    },
}

impl QueryError {
    pub fn cursor_open(target: impl Into<String>, source: StorageError) -> Self {
        QueryError::CursorOpen {
            target: target.into(),
            source,
        }
    }

    pub fn iteration(visited: u64, source: StorageError) -> Self {
        QueryError::Iteration { visited, source }
    }

    /// Classify an error from a bulk primitive: a missing target is an open
    /// failure, anything else happened while reading.
    pub fn from_bulk(target: impl Into<String>, source: StorageError) -> Self {
        if source.is_open_failure() {
            QueryError::cursor_open(target, source)
        } else {
            QueryError::iteration(0, source)
        }
    }

    pub fn unsupported(operation: &'static str, stage: &'static str) -> Self {
        QueryError::Unsupported { operation, stage }
    }

    /// Returns the stable error code
    pub fn code(&self) -> &'static str {
        match self {
            QueryError::Range(_) => "QUERY_RANGE_INVALID",
            QueryError::CursorOpen { .. } => "QUERY_CURSOR_OPEN_FAILED",
            QueryError::Iteration { .. } => "QUERY_ITERATION_FAILED",
            QueryError::Transform(_) => "QUERY_TRANSFORM_FAILED",
            QueryError::Unsupported { .. } => "QUERY_UNSUPPORTED",
        }
    }

    /// Whether the query was refused before the engine was touched
    pub fn is_rejection(&self) -> bool {
        matches!(self, QueryError::Range(_) | QueryError::Unsupported { .. })
    }

    /// Underlying engine error, if any
    pub fn storage_error(&self) -> Option<&StorageError> {
        match self {
            QueryError::CursorOpen { source, .. } | QueryError::Iteration { source, .. } => {
                Some(source)
            }
            _ => None,
        }
    }
}
