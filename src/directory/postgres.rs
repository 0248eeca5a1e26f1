//! Recipient lookups against the platform's users table.

use async_trait::async_trait;
use sqlx::PgPool;

use crate::notification::Recipient;

use super::{DirectoryError, RecipientDirectory};

/// Reads `id`, `display_name` and `email` from a users table.
pub struct PostgresRecipientDirectory {
    pool: PgPool,
    query: String,
}

impl PostgresRecipientDirectory {
    /// Create a directory reading from `users_table`.
    ///
    /// The table name comes from configuration, never from request input.
    pub fn new(pool: PgPool, users_table: &str) -> Self {
        let query = format!(
            "SELECT id::text, display_name, email FROM {} WHERE id::text = $1",
            users_table
        );
        Self { pool, query }
    }
}

#[async_trait]
impl RecipientDirectory for PostgresRecipientDirectory {
    async fn resolve(&self, recipient_id: &str) -> Result<Option<Recipient>, DirectoryError> {
        let row: Option<(String, Option<String>, Option<String>)> = sqlx::query_as(&self.query)
            .bind(recipient_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(|(id, display_name, email)| Recipient {
            display_name: display_name.unwrap_or_else(|| id.clone()),
            id,
            email,
        }))
    }
}
