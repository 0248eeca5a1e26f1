//! Notification record storage.
//!
//! The delivery core persists every record through the `NotificationStore`
//! trait before any channel is attempted:
//!
//! - `MemoryNotificationStore`: In-memory storage using DashMap (default)
//! - `PostgresNotificationStore`: Persistent storage in the `notifications` table
//!
//! Use `create_store()` to pick the implementation from configuration.

mod backend;
mod memory_backend;
mod postgres_backend;

use std::sync::Arc;

use crate::postgres::PostgresPool;

pub use backend::{ListQuery, MarkReadOutcome, NotificationStore, StoreError};
pub use memory_backend::MemoryNotificationStore;
pub use postgres_backend::PostgresNotificationStore;

/// Create a notification store.
///
/// Returns a `PostgresNotificationStore` when a pool is provided, otherwise a
/// `MemoryNotificationStore`.
pub fn create_store(postgres_pool: Option<Arc<PostgresPool>>) -> Arc<dyn NotificationStore> {
    match postgres_pool {
        Some(pool) => {
            tracing::info!(backend = "postgres", "Creating PostgreSQL notification store");
            Arc::new(PostgresNotificationStore::new(pool.pool().clone()))
        }
        None => {
            tracing::info!(backend = "memory", "Creating memory notification store");
            Arc::new(MemoryNotificationStore::new())
        }
    }
}
