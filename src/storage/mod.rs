//! Persistent storage subsystem.
//!
//! Schema and queries live with their callers; this module owns the pool
//! lifecycle only. The pool is closed last during shutdown because earlier
//! phases may still be completing writes.

pub mod pool;
pub mod teardown;

pub use pool::{PoolStats, SqliteStorage, StorageError, StoragePool};
pub use teardown::StorageTeardown;
