//! In-memory notification store using DashMap.
//!
//! Records are kept in memory and lost on restart. Used in tests and when
//! no database is configured.

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use uuid::Uuid;

use crate::notification::{NewNotification, NotificationRecord};

use super::backend::{validate_new, ListQuery, MarkReadOutcome, NotificationStore, StoreError};

/// In-memory notification store.
///
/// `records` holds every record by id; `recipient_index` keeps each
/// recipient's ids in creation order.
pub struct MemoryNotificationStore {
    records: DashMap<Uuid, NotificationRecord>,
    recipient_index: DashMap<String, Vec<Uuid>>,
}

impl MemoryNotificationStore {
    pub fn new() -> Self {
        Self {
            records: DashMap::new(),
            recipient_index: DashMap::new(),
        }
    }

    /// Total number of stored records
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    fn insert(&self, new: NewNotification) -> NotificationRecord {
        let record = NotificationRecord::from_new(new);
        self.records.insert(record.id, record.clone());
        self.recipient_index
            .entry(record.recipient_id.clone())
            .or_default()
            .push(record.id);
        record
    }

    /// Snapshot a recipient's records, newest first
    fn recipient_records(&self, recipient_id: &str) -> Vec<NotificationRecord> {
        let ids = self
            .recipient_index
            .get(recipient_id)
            .map(|ids| ids.clone())
            .unwrap_or_default();

        let mut records: Vec<NotificationRecord> = ids
            .iter()
            .rev()
            .filter_map(|id| self.records.get(id).map(|r| r.clone()))
            .collect();
        // Stable sort keeps reverse-insertion order for identical timestamps
        records.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        records
    }
}

impl Default for MemoryNotificationStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl NotificationStore for MemoryNotificationStore {
    fn backend_type(&self) -> &'static str {
        "memory"
    }

    async fn create(&self, new: NewNotification) -> Result<NotificationRecord, StoreError> {
        validate_new(&new)?;
        let record = self.insert(new);

        tracing::trace!(
            notification_id = %record.id,
            recipient_id = %record.recipient_id,
            "Notification stored in memory"
        );

        Ok(record)
    }

    async fn create_many(
        &self,
        new: Vec<NewNotification>,
    ) -> Result<Vec<NotificationRecord>, StoreError> {
        // Validate everything first so a bad entry leaves no partial state
        for item in &new {
            validate_new(item)?;
        }
        Ok(new.into_iter().map(|item| self.insert(item)).collect())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<NotificationRecord>, StoreError> {
        Ok(self.records.get(&id).map(|r| r.clone()))
    }

    async fn find_recipient_record(
        &self,
        recipient_id: &str,
        notification_type: &str,
        title: &str,
        message: &str,
    ) -> Result<Option<NotificationRecord>, StoreError> {
        Ok(self
            .recipient_records(recipient_id)
            .into_iter()
            .find(|r| r.matches_content(recipient_id, notification_type, title, message)))
    }

    async fn list_for_recipient(
        &self,
        recipient_id: &str,
        query: ListQuery,
    ) -> Result<Vec<NotificationRecord>, StoreError> {
        Ok(self
            .recipient_records(recipient_id)
            .into_iter()
            .filter(|r| !query.unread_only || !r.is_read)
            .skip(query.offset)
            .take(query.limit)
            .collect())
    }

    async fn count_unread(&self, recipient_id: &str) -> Result<u64, StoreError> {
        let count = self
            .recipient_index
            .get(recipient_id)
            .map(|ids| {
                ids.iter()
                    .filter(|id| self.records.get(id).map(|r| !r.is_read).unwrap_or(false))
                    .count()
            })
            .unwrap_or(0);
        Ok(count as u64)
    }

    async fn mark_as_read(
        &self,
        recipient_id: &str,
        id: Uuid,
    ) -> Result<MarkReadOutcome, StoreError> {
        let Some(mut record) = self.records.get_mut(&id) else {
            return Ok(MarkReadOutcome::NotFound);
        };

        if record.recipient_id != recipient_id {
            return Ok(MarkReadOutcome::NotFound);
        }

        if record.mark_read(Utc::now()) {
            Ok(MarkReadOutcome::Marked(record.clone()))
        } else {
            Ok(MarkReadOutcome::AlreadyRead(record.clone()))
        }
    }

    async fn mark_all_as_read(&self, recipient_id: &str) -> Result<u64, StoreError> {
        let ids = self
            .recipient_index
            .get(recipient_id)
            .map(|ids| ids.clone())
            .unwrap_or_default();

        let now = Utc::now();
        let mut marked = 0;
        for id in ids {
            if let Some(mut record) = self.records.get_mut(&id) {
                if record.mark_read(now) {
                    marked += 1;
                }
            }
        }

        tracing::debug!(recipient_id = %recipient_id, marked = marked, "Marked all notifications read");

        Ok(marked)
    }
}
