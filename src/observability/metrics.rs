//! Query metrics
//!
//! - Counters only, monotonic
//! - Atomic increments with relaxed ordering
//! - Shared between executors through an `Arc`

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

use crate::executor::PipelineStats;

/// Operational counters for range queries
#[derive(Debug, Default)]
pub struct MetricsRegistry {
    /// Queries that finished successfully
    queries_executed: AtomicU64,
    /// Queries refused before any scope opened
    queries_rejected: AtomicU64,
    /// Queries that failed after reaching the engine
    queries_failed: AtomicU64,
    /// Streams dropped before exhaustion
    queries_abandoned: AtomicU64,
    entries_visited: AtomicU64,
    entries_emitted: AtomicU64,
    cursor_advances: AtomicU64,
    scopes_opened: AtomicU64,
    scopes_released: AtomicU64,
}

impl MetricsRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn increment_queries_executed(&self) {
        self.queries_executed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_queries_rejected(&self) {
        self.queries_rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_queries_failed(&self) {
        self.queries_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_queries_abandoned(&self) {
        self.queries_abandoned.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_scopes_opened(&self) {
        self.scopes_opened.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_scopes_released(&self) {
        self.scopes_released.fetch_add(1, Ordering::Relaxed);
    }

    /// Fold one pipeline run into the entry counters
    pub fn record_pipeline(&self, stats: &PipelineStats) {
        self.entries_visited.fetch_add(stats.visited, Ordering::Relaxed);
        self.entries_emitted.fetch_add(stats.emitted, Ordering::Relaxed);
        self.cursor_advances.fetch_add(stats.advances, Ordering::Relaxed);
    }

    /// Entries produced by a bulk primitive count as visited and emitted
    pub fn record_bulk(&self, entries: u64) {
        self.entries_visited.fetch_add(entries, Ordering::Relaxed);
        self.entries_emitted.fetch_add(entries, Ordering::Relaxed);
    }

    pub fn queries_executed(&self) -> u64 {
        self.queries_executed.load(Ordering::Relaxed)
    }

    pub fn queries_rejected(&self) -> u64 {
        self.queries_rejected.load(Ordering::Relaxed)
    }

    /// Scopes opened minus scopes released
    pub fn scopes_outstanding(&self) -> u64 {
        let opened = self.scopes_opened.load(Ordering::Relaxed);
        opened.saturating_sub(self.scopes_released.load(Ordering::Relaxed))
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            queries_executed: self.queries_executed.load(Ordering::Relaxed),
            queries_rejected: self.queries_rejected.load(Ordering::Relaxed),
            queries_failed: self.queries_failed.load(Ordering::Relaxed),
            queries_abandoned: self.queries_abandoned.load(Ordering::Relaxed),
            entries_visited: self.entries_visited.load(Ordering::Relaxed),
            entries_emitted: self.entries_emitted.load(Ordering::Relaxed),
            cursor_advances: self.cursor_advances.load(Ordering::Relaxed),
            scopes_opened: self.scopes_opened.load(Ordering::Relaxed),
            scopes_released: self.scopes_released.load(Ordering::Relaxed),
        }
    }

    /// Current values as one JSON object
    pub fn to_json(&self) -> String {
        serde_json::to_string(&self.snapshot()).unwrap_or_else(|_| "{}".to_string())
    }
}

/// Point-in-time copy of every counter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct MetricsSnapshot {
    pub queries_executed: u64,
    pub queries_rejected: u64,
    pub queries_failed: u64,
    pub queries_abandoned: u64,
    pub entries_visited: u64,
    pub entries_emitted: u64,
    pub cursor_advances: u64,
    pub scopes_opened: u64,
    pub scopes_released: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_starts_at_zero() {
        assert_eq!(MetricsRegistry::new().snapshot(), MetricsSnapshot::default());
    }

    #[test]
    fn test_counters() {
        let metrics = MetricsRegistry::new();
        metrics.increment_queries_executed();
        metrics.increment_queries_rejected();
        metrics.increment_queries_rejected();
        metrics.increment_scopes_opened();

        assert_eq!(metrics.queries_executed(), 1);
        assert_eq!(metrics.queries_rejected(), 2);
        assert_eq!(metrics.scopes_outstanding(), 1);
        metrics.increment_scopes_released();
        assert_eq!(metrics.scopes_outstanding(), 0);
    }

    #[test]
    fn test_record_pipeline() {
        let metrics = MetricsRegistry::new();
        let stats = PipelineStats {
            visited: 5,
            emitted: 2,
            advances: 4,
            ..PipelineStats::default()
        };
        metrics.record_pipeline(&stats);
        metrics.record_bulk(3);

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.entries_visited, 8);
        assert_eq!(snapshot.entries_emitted, 5);
        assert_eq!(snapshot.cursor_advances, 4);
    }

    #[test]
    fn test_to_json() {
        let metrics = MetricsRegistry::new();
        metrics.increment_queries_failed();
        let parsed: serde_json::Value = serde_json::from_str(&metrics.to_json()).unwrap();
        assert_eq!(parsed["queries_failed"], 1);
        assert_eq!(parsed["scopes_opened"], 0);
    }
}
