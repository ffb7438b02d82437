//! rangequery - range queries and lazy cursor pipelines over ordered
//! key-value stores with secondary indexes
//!
//! - [`planner`]: key ranges, scan directions, query specs, explain output
//! - [`executor`]: the cursor pipeline and the query executor
//! - [`storage`]: engine collaborator traits and an in-memory engine
//! - [`observability`]: structured logs and metrics
//!
//! ```ignore
//! use std::sync::Arc;
//! use rangequery::{Direction, KeyRangeBuilder, Key, MemoryEngine, QueryExecutor, QuerySpec};
//!
//! let engine = MemoryEngine::new();
//! engine.create_store("users")?;
//! engine.create_index("users", "by_age", "age")?;
//!
//! let range = KeyRangeBuilder::new()
//!     .start(Key::from_int(18), false)
//!     .end(Key::from_int(30), true)
//!     .build();
//! let spec = QuerySpec::new("users")
//!     .with_index("by_age")
//!     .with_range(range)
//!     .with_direction(Direction::resolve(true, false))
//!     .with_limit(10);
//!
//! let executor = QueryExecutor::new(Arc::new(engine));
//! let users = executor.execute(&spec).await?;
//! ```

pub mod executor;
pub mod observability;
pub mod planner;
pub mod storage;

pub use executor::{ExecutorConfig, QueryError, QueryExecutor, QueryResult, QueryStream, TransformError};
pub use planner::{Direction, KeyRange, KeyRangeBuilder, QuerySpec, RangeError};
pub use storage::{Entry, Key, MemoryEngine};
