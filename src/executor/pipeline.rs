//! Cursor pipeline
//!
//! Drives one cursor through filter → skip → limit → map.
//!
//! The pipeline is a step machine: every call to [`CursorPipeline::step`]
//! inspects the entry under the cursor and performs at most one awaited
//! cursor advance. Nothing assumes the next entry is available without
//! suspending, so the same pipeline runs over in-memory and disk-backed
//! engines.
//!
//! # Stage rules
//!
//! - An entry rejected by the filter counts toward neither skip nor limit.
//! - Skip consumes accepted entries only. Without a filter every entry is
//!   accepted, so the whole skip is one positional advance.
//! - Reaching the limit stops the pipeline without advancing again.
//! - A filter or map failure stops the pipeline; nothing partial is returned.

use serde::Serialize;

use super::errors::{QueryError, QueryResult, TransformError};
use crate::planner::{EntryFilter, EntryMap, QuerySpec};
use crate::storage::{Cursor, Entry};

/// Counters describing one pipeline run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct PipelineStats {
    /// Entries inspected
    pub visited: u64,
    /// Entries the filter rejected
    pub rejected: u64,
    /// Accepted entries skipped one at a time
    pub skipped: u64,
    /// Positions passed over by a bulk advance
    pub bulk_skipped: u64,
    /// Entries emitted
    pub emitted: u64,
    /// Cursor advance calls
    pub advances: u64,
}

/// Outcome of one pipeline step
#[derive(Debug, Clone, PartialEq)]
pub enum Step<T> {
    Emitted(T),
    Skipped,
    Rejected,
    Finished,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Start,
    Scanning,
    Finished,
}

enum Verdict<T> {
    Rejected,
    Skip,
    Emit(T),
}

/// Lazy skip/filter/limit/map over an exclusively owned cursor
pub struct CursorPipeline<C, T> {
    cursor: Option<C>,
    phase: Phase,
    skip: u64,
    remaining: Option<u64>,
    bulk_skip: bool,
    filter: Option<EntryFilter>,
    map: EntryMap<T>,
    stats: PipelineStats,
}

impl<C: Cursor, T> CursorPipeline<C, T> {
    /// Build a pipeline over `cursor`. `None` means nothing matched.
    pub fn new(
        cursor: Option<C>,
        skip: u64,
        limit: Option<u64>,
        filter: Option<EntryFilter>,
        map: EntryMap<T>,
    ) -> Self {
        Self {
            cursor,
            phase: Phase::Start,
            skip,
            remaining: limit,
            bulk_skip: true,
            filter,
            map,
            stats: PipelineStats::default(),
        }
    }

    /// Pipeline running the stages of `spec` with the given effective limit
    pub fn from_spec(cursor: Option<C>, spec: &QuerySpec<T>, limit: Option<u64>) -> Self {
        Self::new(
            cursor,
            spec.skip(),
            limit,
            spec.filter().cloned(),
            spec.map().clone(),
        )
    }

    /// Allow or forbid satisfying an unfiltered skip with one advance
    pub fn with_bulk_skip(mut self, enabled: bool) -> Self {
        self.bulk_skip = enabled;
        self
    }

    pub fn stats(&self) -> PipelineStats {
        self.stats
    }

    pub fn is_finished(&self) -> bool {
        self.phase == Phase::Finished
    }

    /// Run one step, suspending on at most one cursor advance.
    pub async fn step(&mut self) -> QueryResult<Step<T>> {
        match self.phase {
            Phase::Finished => return Ok(Step::Finished),
            Phase::Start => {
                self.phase = Phase::Scanning;
                if self.remaining == Some(0) || self.cursor.is_none() {
                    return Ok(self.finish());
                }
                if self.bulk_skip && self.filter.is_none() && self.skip > 0 {
                    let count = std::mem::take(&mut self.skip);
                    self.advance(count).await?;
                    self.stats.bulk_skipped = count;
                    return Ok(Step::Skipped);
                }
            }
            Phase::Scanning => {}
        }

        let verdict = match self.cursor.as_ref().and_then(|c| c.current()) {
            Some(entry) => self.evaluate(entry),
            None => return Ok(self.finish()),
        };
        self.stats.visited += 1;

        let verdict = match verdict {
            Ok(verdict) => verdict,
            Err(err) => {
                self.finish();
                return Err(QueryError::Transform(err));
            }
        };

        match verdict {
            Verdict::Rejected => {
                self.stats.rejected += 1;
                self.advance(1).await?;
                Ok(Step::Rejected)
            }
            Verdict::Skip => {
                self.skip -= 1;
                self.stats.skipped += 1;
                self.advance(1).await?;
                Ok(Step::Skipped)
            }
            Verdict::Emit(item) => {
                self.stats.emitted += 1;
                if let Some(remaining) = self.remaining.as_mut() {
                    *remaining -= 1;
                    if *remaining == 0 {
                        self.finish();
                        return Ok(Step::Emitted(item));
                    }
                }
                self.advance(1).await?;
                Ok(Step::Emitted(item))
            }
        }
    }

    /// Step until the next emitted item, or `None` once finished
    pub async fn next(&mut self) -> QueryResult<Option<T>> {
        loop {
            match self.step().await? {
                Step::Emitted(item) => return Ok(Some(item)),
                Step::Finished => return Ok(None),
                Step::Skipped | Step::Rejected => {}
            }
        }
    }

    /// Drive to completion and collect every emitted item
    pub async fn collect(mut self) -> QueryResult<Vec<T>> {
        let mut items = Vec::new();
        while let Some(item) = self.next().await? {
            items.push(item);
        }
        Ok(items)
    }

    fn evaluate(&self, entry: &Entry) -> Result<Verdict<T>, TransformError> {
        if let Some(filter) = &self.filter {
            if !filter(entry)? {
                return Ok(Verdict::Rejected);
            }
        }
        if self.skip > 0 {
            return Ok(Verdict::Skip);
        }
        (self.map)(entry).map(Verdict::Emit)
    }

    async fn advance(&mut self, count: u64) -> QueryResult<()> {
        let Some(cursor) = self.cursor.as_mut() else {
            return Ok(());
        };
        self.stats.advances += 1;
        if let Err(source) = cursor.advance(count).await {
            self.finish();
            return Err(QueryError::iteration(self.stats.visited, source));
        }
        Ok(())
    }

    /// Drop the cursor and refuse further steps
    fn finish(&mut self) -> Step<T> {
        self.phase = Phase::Finished;
        self.cursor = None;
        Step::Finished
    }
}
