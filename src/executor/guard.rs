//! Scope release guard
//!
//! Wraps an open [`Scope`] so it is released exactly once on every exit path:
//! explicit release after the pipeline finishes, or drop when a query future
//! or stream is abandoned mid-flight.

use std::sync::Arc;

use crate::observability::{Logger, MetricsRegistry};
use crate::storage::Scope;

/// Owns an open scope until release
pub struct ScopeGuard<S: Scope> {
    scope: S,
    released: bool,
    metrics: Arc<MetricsRegistry>,
    query_id: String,
}

impl<S: Scope> ScopeGuard<S> {
    pub fn new(scope: S, metrics: Arc<MetricsRegistry>, query_id: impl Into<String>) -> Self {
        let query_id = query_id.into();
        metrics.increment_scopes_opened();
        Logger::trace(
            "SCOPE_OPENED",
            &[
                ("mode", scope.mode().as_str()),
                ("query_id", query_id.as_str()),
                ("store", scope.store()),
            ],
        );
        Self {
            scope,
            released: false,
            metrics,
            query_id,
        }
    }

    pub fn scope(&self) -> &S {
        &self.scope
    }

    pub fn is_released(&self) -> bool {
        self.released
    }

    /// Release now. Cursors from this scope must already be dropped.
    pub fn release(mut self) {
        self.release_once("finished");
    }

    fn release_once(&mut self, reason: &str) {
        if self.released {
            return;
        }
        self.released = true;
        self.scope.release();
        self.metrics.increment_scopes_released();
        Logger::trace(
            "SCOPE_RELEASED",
            &[
                ("query_id", self.query_id.as_str()),
                ("reason", reason),
                ("store", self.scope.store()),
            ],
        );
    }
}

impl<S: Scope> Drop for ScopeGuard<S> {
    fn drop(&mut self) {
        self.release_once("dropped");
    }
}
