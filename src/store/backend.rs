//! Backend trait for notification record storage.
//!
//! This module defines the abstraction layer the delivery core persists
//! through, allowing different storage implementations (memory, PostgreSQL)
//! to be used interchangeably.

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use crate::notification::{NewNotification, NotificationRecord};

/// Errors that can occur during store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// PostgreSQL operation failed
    #[error("PostgreSQL error: {0}")]
    Postgres(#[from] sqlx::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Input rejected before reaching storage
    #[error("Invalid notification: {0}")]
    Invalid(String),

    /// Backend is temporarily unavailable
    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

/// Pagination and filtering for recipient listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListQuery {
    pub limit: usize,
    pub offset: usize,
    pub unread_only: bool,
}

impl Default for ListQuery {
    fn default() -> Self {
        Self {
            limit: 20,
            offset: 0,
            unread_only: false,
        }
    }
}

/// Result of a mark-as-read request.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", content = "record", rename_all = "snake_case")]
pub enum MarkReadOutcome {
    /// The record was unread and is now read
    Marked(NotificationRecord),
    /// The record was already read; nothing changed
    AlreadyRead(NotificationRecord),
    /// No record with that id belongs to the recipient
    NotFound,
}

impl MarkReadOutcome {
    pub fn record(&self) -> Option<&NotificationRecord> {
        match self {
            MarkReadOutcome::Marked(record) | MarkReadOutcome::AlreadyRead(record) => Some(record),
            MarkReadOutcome::NotFound => None,
        }
    }
}

/// Reject creation input the store would otherwise persist as garbage.
pub(crate) fn validate_new(new: &NewNotification) -> Result<(), StoreError> {
    if new.recipient_id.trim().is_empty() {
        return Err(StoreError::Invalid("recipient_id must not be empty".to_string()));
    }
    if new.notification_type.trim().is_empty() {
        return Err(StoreError::Invalid("type must not be empty".to_string()));
    }
    Ok(())
}

/// Backend trait for notification record storage.
///
/// # Thread Safety
///
/// Implementations must be thread-safe (`Send + Sync`) as they are shared
/// across the trigger, broadcast batches and any query surface.
///
/// # Invariants
///
/// - `created_at` is assigned on creation and never changes.
/// - `read_at` is set exactly once, together with `is_read = true`.
/// - Read-state changes are scoped to the owning recipient.
#[async_trait]
pub trait NotificationStore: Send + Sync {
    /// Backend type identifier, used in logs.
    fn backend_type(&self) -> &'static str;

    /// Persist a single new record.
    async fn create(&self, new: NewNotification) -> Result<NotificationRecord, StoreError>;

    /// Persist many records at once.
    ///
    /// The returned records are in the same order as the input.
    async fn create_many(
        &self,
        new: Vec<NewNotification>,
    ) -> Result<Vec<NotificationRecord>, StoreError>;

    /// Fetch a record by id.
    async fn find_by_id(&self, id: Uuid) -> Result<Option<NotificationRecord>, StoreError>;

    /// Find the most recent record for a recipient with identical content.
    async fn find_recipient_record(
        &self,
        recipient_id: &str,
        notification_type: &str,
        title: &str,
        message: &str,
    ) -> Result<Option<NotificationRecord>, StoreError>;

    /// List a recipient's records, newest first.
    async fn list_for_recipient(
        &self,
        recipient_id: &str,
        query: ListQuery,
    ) -> Result<Vec<NotificationRecord>, StoreError>;

    /// Count a recipient's unread records.
    async fn count_unread(&self, recipient_id: &str) -> Result<u64, StoreError>;

    /// Mark one of the recipient's records as read.
    async fn mark_as_read(&self, recipient_id: &str, id: Uuid)
        -> Result<MarkReadOutcome, StoreError>;

    /// Mark every unread record of the recipient as read.
    ///
    /// Returns the number of records newly marked.
    async fn mark_all_as_read(&self, recipient_id: &str) -> Result<u64, StoreError>;
}
