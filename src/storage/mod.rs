//! Storage collaborator surface for rangequery
//!
//! The query layer consumes an ordered store through three traits:
//!
//! - [`Engine`] opens a [`Scope`] on a named store
//! - [`Scope`] opens [`Cursor`]s and serves bulk reads and counts
//! - [`Cursor`] exposes the current entry and an awaited `advance`
//!
//! [`MemoryEngine`] is the in-process implementation used by tests and by
//! hosts that do not bring their own engine.

mod engine;
mod entry;
mod errors;
mod key;
mod mem;

pub use engine::{Cursor, Engine, ScanTarget, Scope, ScopeMode, StorageFuture};
pub use entry::Entry;
pub use errors::{StorageError, StorageResult};
pub use key::Key;
pub use mem::{MemoryCursor, MemoryEngine, MemoryScope};
