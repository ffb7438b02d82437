//! Query planning for rangequery
//!
//! Turns caller input into the pieces a scan needs:
//!
//! 1. Partial bounds fold into a [`KeyRange`] via [`KeyRangeBuilder`]
//! 2. Descending/collapse switches resolve to a [`Direction`]
//! 3. Both, plus the pipeline stages, travel in a [`QuerySpec`]
//! 4. [`ExplainPlan`] reports what execution would do

mod direction;
mod errors;
mod explain;
mod query;
mod range;

pub use direction::Direction;
pub use errors::RangeError;
pub use explain::{ExplainPlan, SkipStrategy};
pub use query::{EntryFilter, EntryMap, QuerySpec};
pub use range::{KeyRange, KeyRangeBuilder};
