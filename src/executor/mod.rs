//! Query execution for rangequery
//!
//! # Execution flow
//!
//! 1. Validate the range (rejections never open a scope)
//! 2. Open a scope and a cursor through the [`Engine`](crate::storage::Engine)
//! 3. Drive the [`CursorPipeline`]: filter → skip → limit → map
//! 4. Release the scope on completion, failure, or abandonment
//!
//! The bulk path (`count`, `fetch_all`) hands the range straight to the
//! engine's bulk primitives.

mod config;
mod errors;
mod executor;
mod guard;
mod pipeline;

pub use config::ExecutorConfig;
pub use errors::{QueryError, QueryResult, TransformError};
pub use executor::{QueryExecutor, QueryStream};
pub use guard::ScopeGuard;
pub use pipeline::{CursorPipeline, PipelineStats, Step};
