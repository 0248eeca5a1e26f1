//! PostgreSQL persistence module.
//!
//! Provides connection pooling for the PostgreSQL store and directory.

pub mod pool;

pub use pool::{PostgresPool, PostgresPoolError};
