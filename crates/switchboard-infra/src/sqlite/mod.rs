//! SQLite storage layer.
//!
//! The event store backed by SQLite with WAL mode and split read/write
//! connection pools.

pub mod event;
pub mod pool;

pub use event::SqliteEventStore;
pub use pool::DatabasePool;
