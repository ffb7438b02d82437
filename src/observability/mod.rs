//! Observability for rangequery
//!
//! - Structured JSON logging ([`Logger`])
//! - Lifecycle logging around one query ([`ObservationScope`])
//! - Atomic counters ([`MetricsRegistry`])
//!
//! Observability is read-only: nothing here changes what a query returns.
//!
//! ```ignore
//! use rangequery::observability::{Logger, Severity};
//!
//! Logger::set_min_severity(Severity::Warn);
//! Logger::info("QUERY_COMPLETE", &[("emitted", "42")]);
//! ```

mod logger;
mod metrics;
mod scope;

pub use logger::{Logger, Severity};
pub use metrics::{MetricsRegistry, MetricsSnapshot};
pub use scope::ObservationScope;
