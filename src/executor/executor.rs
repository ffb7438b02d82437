//! Query executor
//!
//! Execution flow (strict order):
//! 1. Validate the key range; a bad range never reaches the engine
//! 2. Resolve the effective limit; a zero limit returns without a scope
//! 3. Open a scope on the store (read-only unless the query declares otherwise)
//! 4. Open a cursor on the store or index
//! 5. Drive the cursor pipeline
//! 6. Release the scope on every exit path
//!
//! The bulk path (`count`, `fetch_all`) replaces steps 4-5 with one call to
//! the engine's bulk primitives and refuses specs it cannot honor.

use std::sync::Arc;

use futures_util::stream::{self, BoxStream, StreamExt};
use uuid::Uuid;

use super::config::ExecutorConfig;
use super::errors::{QueryError, QueryResult};
use super::guard::ScopeGuard;
use super::pipeline::{CursorPipeline, PipelineStats};
use crate::observability::{Logger, MetricsRegistry, ObservationScope};
use crate::planner::{Direction, ExplainPlan, QuerySpec};
use crate::storage::{Engine, Entry, Scope};

/// Lazily evaluated query results. Dropping it releases the scope.
pub type QueryStream<T> = BoxStream<'static, QueryResult<T>>;

type PipelineFor<E, T> = CursorPipeline<<<E as Engine>::Scope as Scope>::Cursor, T>;

/// Runs [`QuerySpec`]s against an engine
pub struct QueryExecutor<E: Engine> {
    engine: Arc<E>,
    config: ExecutorConfig,
    metrics: Arc<MetricsRegistry>,
}

impl<E: Engine> QueryExecutor<E> {
    pub fn new(engine: Arc<E>) -> Self {
        Self {
            engine,
            config: ExecutorConfig::default(),
            metrics: Arc::new(MetricsRegistry::new()),
        }
    }

    pub fn with_config(mut self, config: ExecutorConfig) -> Self {
        self.config = config;
        self
    }

    /// Share a registry with other executors
    pub fn with_metrics(mut self, metrics: Arc<MetricsRegistry>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn engine(&self) -> &Arc<E> {
        &self.engine
    }

    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    pub fn metrics(&self) -> &Arc<MetricsRegistry> {
        &self.metrics
    }

    /// Describe how `spec` would run. Never touches the engine.
    pub fn explain<T>(&self, spec: &QuerySpec<T>) -> ExplainPlan {
        ExplainPlan::from_spec(
            spec,
            self.config.effective_limit(spec.limit()),
            self.config.bulk_skip,
        )
    }

    /// Run the full pipeline and collect every emitted item.
    ///
    /// Any failure discards what was accumulated.
    pub async fn execute<T: Send + 'static>(&self, spec: &QuerySpec<T>) -> QueryResult<Vec<T>> {
        self.admit(spec, "execute")?;
        let limit = self.config.effective_limit(spec.limit());
        let query_id = Uuid::new_v4().to_string();
        let observation = self.observe("execute", spec, limit, &query_id);

        if limit == Some(0) {
            self.metrics.increment_queries_executed();
            observation.complete(&[("emitted", "0".to_string())]);
            return Ok(Vec::new());
        }

        let (guard, mut pipeline) = match self.open(spec, limit, &query_id).await {
            Ok(opened) => opened,
            Err(err) => return Err(self.fail_early(observation, err)),
        };

        let mut items = Vec::new();
        let outcome = loop {
            match pipeline.next().await {
                Ok(Some(item)) => items.push(item),
                Ok(None) => break Ok(()),
                Err(err) => break Err(err),
            }
        };

        let stats = pipeline.stats();
        drop(pipeline);
        conclude(&self.metrics, guard, observation, stats, outcome)?;
        Ok(items)
    }

    /// Run the pipeline lazily.
    ///
    /// Range, scope and cursor failures surface here, before any item is
    /// produced. The stream ends after the first error it yields.
    pub async fn stream<T: Send + 'static>(
        &self,
        spec: &QuerySpec<T>,
    ) -> QueryResult<QueryStream<T>> {
        self.admit(spec, "stream")?;
        let limit = self.config.effective_limit(spec.limit());
        let query_id = Uuid::new_v4().to_string();
        let observation = self.observe("stream", spec, limit, &query_id);

        if limit == Some(0) {
            self.metrics.increment_queries_executed();
            observation.complete(&[("emitted", "0".to_string())]);
            return Ok(stream::empty().boxed());
        }

        let (guard, pipeline) = match self.open(spec, limit, &query_id).await {
            Ok(opened) => opened,
            Err(err) => return Err(self.fail_early(observation, err)),
        };

        let state: StreamState<E::Scope, T> = StreamState {
            pipeline,
            guard: Some(guard),
            observation: Some(observation),
            metrics: Arc::clone(&self.metrics),
            done: false,
        };

        let items = stream::unfold(state, |mut state| async move {
            if state.done {
                None
            } else {
                match state.pipeline.next().await {
                    Ok(Some(item)) => Some((Ok(item), state)),
                    Ok(None) => match state.conclude(Ok(())) {
                        Ok(()) => None,
                        Err(err) => Some((Err(err), state)),
                    },
                    Err(err) => match state.conclude(Err(err)) {
                        Err(err) => Some((Err(err), state)),
                        Ok(()) => None,
                    },
                }
            }
        });
        Ok(items.boxed())
    }

    /// Count matching entries with the engine's bulk primitive
    pub async fn count<T>(&self, spec: &QuerySpec<T>) -> QueryResult<u64> {
        self.admit(spec, "count")?;
        self.ensure_bulk_compatible(spec, "count")?;
        let query_id = Uuid::new_v4().to_string();
        let observation = self.observe("count", spec, None, &query_id);

        let guard = match self.open_scope(spec, &query_id).await {
            Ok(guard) => guard,
            Err(err) => return Err(self.fail_early(observation, err)),
        };
        let target = spec.target();
        let outcome = guard
            .scope()
            .bulk_count(&target, spec.range())
            .await
            .map_err(|source| QueryError::from_bulk(target.qualified(spec.store()), source));

        guard.release();
        match outcome {
            Ok(count) => {
                self.metrics.record_bulk(count);
                self.metrics.increment_queries_executed();
                observation.complete(&[("count", count.to_string())]);
                Ok(count)
            }
            Err(err) => Err(self.fail_early(observation, err)),
        }
    }

    /// Read matching entries in ascending order with the engine's bulk
    /// primitive, honoring the limit
    pub async fn fetch_all<T>(&self, spec: &QuerySpec<T>) -> QueryResult<Vec<Entry>> {
        self.admit(spec, "fetch_all")?;
        self.ensure_bulk_compatible(spec, "fetch_all")?;
        let limit = self.config.effective_limit(spec.limit());
        let query_id = Uuid::new_v4().to_string();
        let observation = self.observe("fetch_all", spec, limit, &query_id);

        if limit == Some(0) {
            self.metrics.increment_queries_executed();
            observation.complete(&[("emitted", "0".to_string())]);
            return Ok(Vec::new());
        }

        let guard = match self.open_scope(spec, &query_id).await {
            Ok(guard) => guard,
            Err(err) => return Err(self.fail_early(observation, err)),
        };
        let target = spec.target();
        let outcome = guard
            .scope()
            .bulk_read(&target, spec.range(), limit)
            .await
            .map_err(|source| QueryError::from_bulk(target.qualified(spec.store()), source));

        guard.release();
        match outcome {
            Ok(entries) => {
                self.metrics.record_bulk(entries.len() as u64);
                self.metrics.increment_queries_executed();
                observation.complete(&[("emitted", entries.len().to_string())]);
                Ok(entries)
            }
            Err(err) => Err(self.fail_early(observation, err)),
        }
    }

    fn admit<T>(&self, spec: &QuerySpec<T>, operation: &'static str) -> QueryResult<()> {
        spec.range()
            .validate()
            .map_err(|err| self.reject(operation, err.into()))
    }

    /// Bulk primitives only read a range in ascending order
    fn ensure_bulk_compatible<T>(
        &self,
        spec: &QuerySpec<T>,
        operation: &'static str,
    ) -> QueryResult<()> {
        let stage = if spec.has_filter() {
            Some("filter")
        } else if spec.is_mapped() {
            Some("map")
        } else if spec.skip() > 0 {
            Some("skip")
        } else if spec.direction() != Direction::Forward {
            Some("direction")
        } else if operation == "count" && spec.limit().is_some() {
            Some("limit")
        } else {
            None
        };
        match stage {
            Some(stage) => Err(self.reject(operation, QueryError::unsupported(operation, stage))),
            None => Ok(()),
        }
    }

    fn reject(&self, operation: &'static str, err: QueryError) -> QueryError {
        self.metrics.increment_queries_rejected();
        if self.config.log_queries {
            let reason = err.to_string();
            Logger::warn(
                "QUERY_REJECTED",
                &[
                    ("code", err.code()),
                    ("operation", operation),
                    ("reason", reason.as_str()),
                ],
            );
        }
        err
    }

    fn observe<T>(
        &self,
        operation: &'static str,
        spec: &QuerySpec<T>,
        limit: Option<u64>,
        query_id: &str,
    ) -> ObservationScope {
        if !self.config.log_queries {
            return ObservationScope::silent("QUERY");
        }
        ObservationScope::begin(
            "QUERY",
            vec![
                ("direction", spec.direction().to_string()),
                ("limit", limit.map_or_else(|| "none".to_string(), |l| l.to_string())),
                ("mode", spec.mode().to_string()),
                ("operation", operation.to_string()),
                ("query_id", query_id.to_string()),
                ("range", spec.range().to_string()),
                ("skip", spec.skip().to_string()),
                ("target", spec.target().qualified(spec.store())),
            ],
        )
    }

    fn fail_early(&self, observation: ObservationScope, err: QueryError) -> QueryError {
        self.metrics.increment_queries_failed();
        observation.fail(err.code(), &err.to_string());
        err
    }

    async fn open_scope<T>(
        &self,
        spec: &QuerySpec<T>,
        query_id: &str,
    ) -> QueryResult<ScopeGuard<E::Scope>> {
        let scope = self
            .engine
            .open_scope(spec.store(), spec.mode())
            .await
            .map_err(|source| QueryError::cursor_open(spec.target().qualified(spec.store()), source))?;
        Ok(ScopeGuard::new(scope, Arc::clone(&self.metrics), query_id))
    }

    async fn open<T>(
        &self,
        spec: &QuerySpec<T>,
        limit: Option<u64>,
        query_id: &str,
    ) -> QueryResult<(ScopeGuard<E::Scope>, PipelineFor<E, T>)> {
        let guard = self.open_scope(spec, query_id).await?;
        let target = spec.target();
        let cursor = guard
            .scope()
            .open_cursor(&target, spec.range(), spec.direction())
            .await
            .map_err(|source| QueryError::cursor_open(target.qualified(spec.store()), source))?;

        let pipeline =
            CursorPipeline::from_spec(cursor, spec, limit).with_bulk_skip(self.config.bulk_skip);
        Ok((guard, pipeline))
    }
}

/// Release the scope and record the outcome of a finished pipeline
fn conclude<S: Scope>(
    metrics: &MetricsRegistry,
    guard: ScopeGuard<S>,
    observation: ObservationScope,
    stats: PipelineStats,
    outcome: QueryResult<()>,
) -> QueryResult<()> {
    guard.release();
    metrics.record_pipeline(&stats);
    match outcome {
        Ok(()) => {
            metrics.increment_queries_executed();
            observation.complete(&[
                ("emitted", stats.emitted.to_string()),
                ("rejected", stats.rejected.to_string()),
                ("skipped", (stats.skipped + stats.bulk_skipped).to_string()),
                ("visited", stats.visited.to_string()),
            ]);
            Ok(())
        }
        Err(err) => {
            metrics.increment_queries_failed();
            observation.fail(err.code(), &err.to_string());
            Err(err)
        }
    }
}

/// State carried by a [`QueryStream`]. Fields drop in order, so the cursor
/// goes before the scope is released.
struct StreamState<S: Scope, T> {
    pipeline: CursorPipeline<S::Cursor, T>,
    guard: Option<ScopeGuard<S>>,
    observation: Option<ObservationScope>,
    metrics: Arc<MetricsRegistry>,
    done: bool,
}

impl<S: Scope, T> StreamState<S, T> {
    /// Finish the stream. The pipeline has already dropped its cursor.
    fn conclude(&mut self, outcome: QueryResult<()>) -> QueryResult<()> {
        self.done = true;
        match (self.guard.take(), self.observation.take()) {
            (Some(guard), Some(observation)) => conclude(
                &self.metrics,
                guard,
                observation,
                self.pipeline.stats(),
                outcome,
            ),
            _ => outcome,
        }
    }
}

impl<S: Scope, T> Drop for StreamState<S, T> {
    fn drop(&mut self) {
        if !self.done {
            self.metrics.increment_queries_abandoned();
            self.metrics.record_pipeline(&self.pipeline.stats());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::planner::KeyRange;
    use crate::storage::{Key, MemoryEngine};
    use serde_json::json;

    fn executor(keys: &[i64]) -> QueryExecutor<MemoryEngine> {
        let engine = MemoryEngine::new();
        engine.create_store("numbers").unwrap();
        for k in keys {
            engine.put("numbers", Key::from_int(*k), json!({ "n": k })).unwrap();
        }
        QueryExecutor::new(Arc::new(engine)).with_config(ExecutorConfig::quiet())
    }

    fn ints(entries: &[Entry]) -> Vec<i64> {
        entries.iter().filter_map(|e| e.key.as_int()).collect()
    }

    #[tokio::test]
    async fn test_execute_releases_scope() {
        let executor = executor(&[1, 2, 3]);
        let out = executor.execute(&QuerySpec::new("numbers")).await.unwrap();
        assert_eq!(ints(&out), vec![1, 2, 3]);
        assert_eq!(executor.engine().open_scopes(), 0);

        let snapshot = executor.metrics().snapshot();
        assert_eq!(snapshot.queries_executed, 1);
        assert_eq!(snapshot.scopes_opened, 1);
        assert_eq!(snapshot.scopes_released, 1);
        assert_eq!(snapshot.entries_emitted, 3);
    }

    #[tokio::test]
    async fn test_invalid_range_never_opens_scope() {
        let executor = executor(&[1, 2, 3]);
        let spec = QuerySpec::new("numbers").with_range(KeyRange::bound(
            Key::from_int(10),
            Key::from_int(5),
            false,
            false,
        ));
        let err = executor.execute(&spec).await.unwrap_err();
        assert_eq!(err.code(), "QUERY_RANGE_INVALID");
        assert_eq!(executor.engine().scopes_opened(), 0);
        assert_eq!(executor.metrics().queries_rejected(), 1);
    }

    #[tokio::test]
    async fn test_zero_limit_skips_engine() {
        let executor = executor(&[1, 2, 3]);
        let out = executor
            .execute(&QuerySpec::new("numbers").with_limit(0))
            .await
            .unwrap();
        assert!(out.is_empty());
        assert_eq!(executor.engine().scopes_opened(), 0);
    }

    #[tokio::test]
    async fn test_default_limit_applies() {
        let executor = executor(&[1, 2, 3]);
        let executor = executor.with_config(ExecutorConfig::quiet().with_default_limit(2));
        let out = executor.execute(&QuerySpec::new("numbers")).await.unwrap();
        assert_eq!(ints(&out), vec![1, 2]);
        let out = executor
            .execute(&QuerySpec::new("numbers").with_limit(3))
            .await
            .unwrap();
        assert_eq!(out.len(), 3);
    }

    #[tokio::test]
    async fn test_missing_store_is_cursor_open_failure() {
        let executor = executor(&[]);
        let err = executor.execute(&QuerySpec::new("ghosts")).await.unwrap_err();
        assert_eq!(err.code(), "QUERY_CURSOR_OPEN_FAILED");
        assert_eq!(executor.metrics().snapshot().queries_failed, 1);
    }

    #[test]
    fn test_explain_uses_config() {
        let executor = executor(&[]).with_config(ExecutorConfig::per_entry_skip());
        let plan = executor.explain(&QuerySpec::new("numbers").with_skip(3));
        assert_eq!(plan.skip_strategy, crate::planner::SkipStrategy::PerEntry);
        assert_eq!(executor.engine().scopes_opened(), 0);
    }

    #[tokio::test]
    async fn test_stream_yields_lazily() {
        let executor = executor(&[1, 2, 3, 4]);
        let mut items = executor
            .stream(&QuerySpec::new("numbers").with_skip(1))
            .await
            .unwrap();
        let first = items.next().await.unwrap().unwrap();
        assert_eq!(first.key, Key::from_int(2));
        assert_eq!(executor.engine().open_scopes(), 1);

        drop(items);
        assert_eq!(executor.engine().open_scopes(), 0);
        assert_eq!(executor.metrics().snapshot().queries_abandoned, 1);
    }

    #[tokio::test]
    async fn test_exhausted_stream_records_success() {
        let executor = executor(&[1, 2, 3]);
        let mut items = executor.stream(&QuerySpec::new("numbers")).await.unwrap();
        let mut seen = Vec::new();
        while let Some(item) = items.next().await {
            seen.push(item.unwrap());
        }
        assert_eq!(ints(&seen), vec![1, 2, 3]);
        assert_eq!(executor.engine().open_scopes(), 0);

        drop(items);
        let snapshot = executor.metrics().snapshot();
        assert_eq!(snapshot.queries_executed, 1);
        assert_eq!(snapshot.queries_failed, 0);
        assert_eq!(snapshot.queries_abandoned, 0);
        assert_eq!(snapshot.scopes_released, 1);
    }
}
