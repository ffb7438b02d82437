//! Explain output for range queries
//!
//! Describes how a [`QuerySpec`] would be executed without opening a scope:
//! which target is scanned, over which range, in which order, and how the
//! skip is satisfied.

use std::fmt;

use serde::Serialize;

use super::query::QuerySpec;

/// How the pipeline satisfies `skip`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipStrategy {
    /// Nothing to skip
    None,
    /// One positional advance of the whole skip count
    Bulk,
    /// Counted one accepted entry at a time
    PerEntry,
}

impl SkipStrategy {
    /// Bulk skipping is only sound when no filter can hide entries from the count
    pub fn choose(skip: u64, filtered: bool, bulk_enabled: bool) -> Self {
        if skip == 0 {
            SkipStrategy::None
        } else if bulk_enabled && !filtered {
            SkipStrategy::Bulk
        } else {
            SkipStrategy::PerEntry
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SkipStrategy::None => "NONE",
            SkipStrategy::Bulk => "BULK",
            SkipStrategy::PerEntry => "PER_ENTRY",
        }
    }
}

/// Explain plan output
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExplainPlan {
    /// `store` or `store.index`
    pub target: String,
    pub range: String,
    pub direction: String,
    pub mode: String,
    pub skip: u64,
    pub skip_strategy: SkipStrategy,
    pub limit: Option<u64>,
    pub filtered: bool,
    pub mapped: bool,
    /// Whether the query is known to emit nothing before any entry is visited
    pub short_circuit: bool,
}

impl ExplainPlan {
    pub fn from_spec<T>(spec: &QuerySpec<T>, limit: Option<u64>, bulk_skip: bool) -> Self {
        Self {
            target: spec.target().qualified(spec.store()),
            range: spec.range().to_string(),
            direction: spec.direction().to_string(),
            mode: spec.mode().to_string(),
            skip: spec.skip(),
            skip_strategy: SkipStrategy::choose(spec.skip(), spec.has_filter(), bulk_skip),
            limit,
            filtered: spec.has_filter(),
            mapped: spec.is_mapped(),
            short_circuit: limit == Some(0) || spec.range().is_empty(),
        }
    }
}

impl fmt::Display for ExplainPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== EXPLAIN RANGE QUERY ===")?;
        writeln!(f, "Target: {}", self.target)?;
        writeln!(f, "Range: {}", self.range)?;
        writeln!(f, "Direction: {}", self.direction)?;
        writeln!(f, "Scope: {}", self.mode)?;
        if self.filtered {
            writeln!(f, "Filter: yes")?;
        }
        if self.skip > 0 {
            writeln!(f, "Skip: {} ({})", self.skip, self.skip_strategy.as_str())?;
        }
        match self.limit {
            Some(limit) => writeln!(f, "Limit: {}", limit)?,
            None => writeln!(f, "Limit: none")?,
        }
        if self.mapped {
            writeln!(f, "Map: yes")?;
        }
        if self.short_circuit {
            writeln!(f, "Short-circuit: no entries can match")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::planner::{Direction, KeyRange};
    use crate::storage::Key;

    #[test]
    fn test_skip_strategy() {
        assert_eq!(SkipStrategy::choose(0, false, true), SkipStrategy::None);
        assert_eq!(SkipStrategy::choose(3, false, true), SkipStrategy::Bulk);
        assert_eq!(SkipStrategy::choose(3, true, true), SkipStrategy::PerEntry);
        assert_eq!(SkipStrategy::choose(3, false, false), SkipStrategy::PerEntry);
    }

    #[test]
    fn test_explain_index_scan() {
        let spec = QuerySpec::new("users")
            .with_index("by_age")
            .with_range(KeyRange::bound(Key::from_int(18), Key::from_int(30), false, true))
            .with_direction(Direction::BackwardUnique)
            .with_skip(10)
            .with_limit(5);

        let plan = ExplainPlan::from_spec(&spec, spec.limit(), true);
        assert_eq!(plan.target, "users.by_age");
        assert_eq!(plan.range, "[18, 30)");
        assert_eq!(plan.direction, "prevunique");
        assert_eq!(plan.skip_strategy, SkipStrategy::Bulk);
        assert!(!plan.short_circuit);

        let output = plan.to_string();
        assert!(output.contains("Skip: 10 (BULK)"));
        assert!(output.contains("Limit: 5"));
    }

    #[test]
    fn test_explain_filtered_uses_per_entry_skip() {
        let spec = QuerySpec::new("users").with_skip(1).with_filter(|_| true);
        let plan = ExplainPlan::from_spec(&spec, None, true);
        assert_eq!(plan.skip_strategy, SkipStrategy::PerEntry);
        assert!(plan.to_string().contains("Limit: none"));
    }

    #[test]
    fn test_explain_short_circuit() {
        let spec = QuerySpec::new("users").with_limit(0);
        assert!(ExplainPlan::from_spec(&spec, spec.limit(), true).short_circuit);
    }

    #[test]
    fn test_explain_deterministic() {
        let spec = QuerySpec::new("users").with_limit(3);
        let a = ExplainPlan::from_spec(&spec, spec.limit(), true).to_string();
        let b = ExplainPlan::from_spec(&spec, spec.limit(), true).to_string();
        assert_eq!(a, b);
    }
}
