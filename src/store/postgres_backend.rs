//! PostgreSQL-based notification store.
//!
//! Records live in the `notifications` table (see
//! `migrations/001_create_notifications.sql`), metadata as JSONB.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::notification::{NewNotification, NotificationRecord};

use super::backend::{validate_new, ListQuery, MarkReadOutcome, NotificationStore, StoreError};

type NotificationRow = (
    Uuid,
    String,
    String,
    String,
    String,
    bool,
    DateTime<Utc>,
    Option<DateTime<Utc>>,
    Option<serde_json::Value>,
);

const SELECT_COLUMNS: &str =
    "id, recipient_id, type, title, message, is_read, created_at, read_at, metadata";

fn row_to_record(row: NotificationRow) -> NotificationRecord {
    let (id, recipient_id, notification_type, title, message, is_read, created_at, read_at, metadata) =
        row;
    NotificationRecord {
        id,
        recipient_id,
        notification_type,
        title,
        message,
        is_read,
        created_at,
        read_at,
        metadata,
    }
}

/// PostgreSQL-based notification store.
pub struct PostgresNotificationStore {
    pool: PgPool,
}

impl PostgresNotificationStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn insert(
        &self,
        executor: &mut sqlx::PgConnection,
        record: &NotificationRecord,
    ) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO notifications (id, recipient_id, type, title, message, is_read, created_at, read_at, metadata)
            VALUES ($1, $2, $3, $4, $5, FALSE, $6, NULL, $7)
            "#,
        )
        .bind(record.id)
        .bind(&record.recipient_id)
        .bind(&record.notification_type)
        .bind(&record.title)
        .bind(&record.message)
        .bind(record.created_at)
        .bind(&record.metadata)
        .execute(executor)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl NotificationStore for PostgresNotificationStore {
    fn backend_type(&self) -> &'static str {
        "postgres"
    }

    async fn create(&self, new: NewNotification) -> Result<NotificationRecord, StoreError> {
        validate_new(&new)?;
        let record = NotificationRecord::from_new(new);

        let mut conn = self.pool.acquire().await?;
        self.insert(&mut *conn, &record).await?;

        tracing::trace!(
            notification_id = %record.id,
            recipient_id = %record.recipient_id,
            "Notification stored in PostgreSQL"
        );

        Ok(record)
    }

    async fn create_many(
        &self,
        new: Vec<NewNotification>,
    ) -> Result<Vec<NotificationRecord>, StoreError> {
        for item in &new {
            validate_new(item)?;
        }
        let records: Vec<NotificationRecord> =
            new.into_iter().map(NotificationRecord::from_new).collect();

        // Single transaction: either every record lands or none do
        let mut tx = self.pool.begin().await?;
        for record in &records {
            self.insert(&mut *tx, record).await?;
        }
        tx.commit().await?;

        tracing::debug!(count = records.len(), "Bulk stored notifications in PostgreSQL");

        Ok(records)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<NotificationRecord>, StoreError> {
        let row: Option<NotificationRow> = sqlx::query_as(&format!(
            "SELECT {} FROM notifications WHERE id = $1",
            SELECT_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(row_to_record))
    }

    async fn find_recipient_record(
        &self,
        recipient_id: &str,
        notification_type: &str,
        title: &str,
        message: &str,
    ) -> Result<Option<NotificationRecord>, StoreError> {
        let row: Option<NotificationRow> = sqlx::query_as(&format!(
            r#"
            SELECT {}
            FROM notifications
            WHERE recipient_id = $1 AND type = $2 AND title = $3 AND message = $4
            ORDER BY created_at DESC
            LIMIT 1
            "#,
            SELECT_COLUMNS
        ))
        .bind(recipient_id)
        .bind(notification_type)
        .bind(title)
        .bind(message)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(row_to_record))
    }

    async fn list_for_recipient(
        &self,
        recipient_id: &str,
        query: ListQuery,
    ) -> Result<Vec<NotificationRecord>, StoreError> {
        let rows: Vec<NotificationRow> = sqlx::query_as(&format!(
            r#"
            SELECT {}
            FROM notifications
            WHERE recipient_id = $1 AND ($2 = FALSE OR is_read = FALSE)
            ORDER BY created_at DESC
            LIMIT $3 OFFSET $4
            "#,
            SELECT_COLUMNS
        ))
        .bind(recipient_id)
        .bind(query.unread_only)
        .bind(query.limit as i64)
        .bind(query.offset as i64)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(row_to_record).collect())
    }

    async fn count_unread(&self, recipient_id: &str) -> Result<u64, StoreError> {
        let (count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM notifications WHERE recipient_id = $1 AND is_read = FALSE",
        )
        .bind(recipient_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(count.max(0) as u64)
    }

    async fn mark_as_read(
        &self,
        recipient_id: &str,
        id: Uuid,
    ) -> Result<MarkReadOutcome, StoreError> {
        // Only flips unread rows, so read_at is written at most once
        let updated: Option<NotificationRow> = sqlx::query_as(&format!(
            r#"
            UPDATE notifications
            SET is_read = TRUE, read_at = NOW()
            WHERE id = $1 AND recipient_id = $2 AND is_read = FALSE
            RETURNING {}
            "#,
            SELECT_COLUMNS
        ))
        .bind(id)
        .bind(recipient_id)
        .fetch_optional(&self.pool)
        .await?;

        if let Some(row) = updated {
            return Ok(MarkReadOutcome::Marked(row_to_record(row)));
        }

        match self.find_by_id(id).await? {
            Some(record) if record.recipient_id == recipient_id => {
                Ok(MarkReadOutcome::AlreadyRead(record))
            }
            _ => Ok(MarkReadOutcome::NotFound),
        }
    }

    async fn mark_all_as_read(&self, recipient_id: &str) -> Result<u64, StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE notifications
            SET is_read = TRUE, read_at = NOW()
            WHERE recipient_id = $1 AND is_read = FALSE
            "#,
        )
        .bind(recipient_id)
        .execute(&self.pool)
        .await?;

        tracing::debug!(
            recipient_id = %recipient_id,
            marked = result.rows_affected(),
            "Marked all notifications read"
        );

        Ok(result.rows_affected())
    }
}
