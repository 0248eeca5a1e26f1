//! Recipient directory seam.
//!
//! The user directory is owned by another part of the platform; the delivery
//! core only needs to resolve a recipient id into the projection used for
//! channel availability decisions.

mod memory;
mod postgres;

use async_trait::async_trait;
use thiserror::Error;

use crate::notification::Recipient;

pub use memory::MemoryRecipientDirectory;
pub use postgres::PostgresRecipientDirectory;

/// Errors raised while resolving a recipient.
#[derive(Debug, Error)]
pub enum DirectoryError {
    #[error("PostgreSQL error: {0}")]
    Postgres(#[from] sqlx::Error),

    #[error("Directory unavailable: {0}")]
    Unavailable(String),
}

/// Resolves recipient ids into `Recipient` projections.
#[async_trait]
pub trait RecipientDirectory: Send + Sync {
    /// Look up a recipient. `Ok(None)` means the id is unknown.
    async fn resolve(&self, recipient_id: &str) -> Result<Option<Recipient>, DirectoryError>;
}
