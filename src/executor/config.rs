//! Executor configuration

use serde::{Deserialize, Serialize};

/// Tuning knobs for [`QueryExecutor`](super::QueryExecutor).
///
/// Deserializable with every field optional, so a host can embed it in its
/// own configuration file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutorConfig {
    /// Satisfy an unfiltered skip with one positional cursor advance.
    pub bulk_skip: bool,
    /// Limit applied to queries that do not set one.
    pub default_limit: Option<u64>,
    /// Emit QUERY_BEGIN / QUERY_COMPLETE log lines.
    pub log_queries: bool,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            bulk_skip: true,
            default_limit: None,
            log_queries: true,
        }
    }
}

impl ExecutorConfig {
    /// Count every skipped entry individually, even without a filter.
    pub fn per_entry_skip() -> Self {
        Self {
            bulk_skip: false,
            ..Self::default()
        }
    }

    /// No per-query log lines.
    pub fn quiet() -> Self {
        Self {
            log_queries: false,
            ..Self::default()
        }
    }

    pub fn with_default_limit(mut self, limit: u64) -> Self {
        self.default_limit = Some(limit);
        self
    }

    /// Limit in effect for a query that asked for `requested`
    pub fn effective_limit(&self, requested: Option<u64>) -> Option<u64> {
        requested.or(self.default_limit)
    }
}
