//! Notification trigger: the entry point the rest of the platform calls.
//!
//! Every trigger persists first and delivers second. Persistence failure is
//! the only error that escapes; recipient lookup and delivery problems are
//! logged and absorbed.

use std::sync::Arc;

use futures::future::join_all;
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use crate::channel::DeliveryChannel;
use crate::config::DEFAULT_BROADCAST_BATCH_SIZE;
use crate::directory::RecipientDirectory;
use crate::metrics::{BroadcastMetrics, RecordMetrics};
use crate::store::{ListQuery, MarkReadOutcome, NotificationStore, StoreError};

use super::{ChannelDispatcher, DeliveryOutcome, NotificationContent, NotificationRecord, Recipient};

/// Errors escaping the trigger boundary
#[derive(Debug, Error)]
pub enum TriggerError {
    #[error("Failed to persist notification: {0}")]
    Persistence(#[from] StoreError),
}

/// A persisted notification together with what happened on delivery
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TriggeredNotification {
    pub record: NotificationRecord,
    /// `None` when the recipient could not be resolved
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delivery: Option<DeliveryOutcome>,
}

pub struct NotificationTrigger {
    store: Arc<dyn NotificationStore>,
    directory: Arc<dyn RecipientDirectory>,
    dispatcher: Arc<ChannelDispatcher>,
    batch_size: usize,
}

impl NotificationTrigger {
    pub fn new(
        store: Arc<dyn NotificationStore>,
        directory: Arc<dyn RecipientDirectory>,
        dispatcher: Arc<ChannelDispatcher>,
    ) -> Self {
        Self {
            store,
            directory,
            dispatcher,
            batch_size: DEFAULT_BROADCAST_BATCH_SIZE,
        }
    }

    /// Recipients dispatched together per broadcast batch (minimum 1)
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub fn store(&self) -> &Arc<dyn NotificationStore> {
        &self.store
    }

    pub fn dispatcher(&self) -> &Arc<ChannelDispatcher> {
        &self.dispatcher
    }

    /// Add a channel to the dispatcher's registry
    pub fn register_channel(&self, channel: Arc<dyn DeliveryChannel>) -> bool {
        self.dispatcher.registry().register(channel)
    }

    /// Persist and deliver a notification to one recipient.
    ///
    /// Returns the persisted record whatever the delivery outcome.
    pub async fn trigger_notification(
        &self,
        recipient_id: &str,
        content: NotificationContent,
    ) -> Result<NotificationRecord, TriggerError> {
        Ok(self.trigger(recipient_id, content).await?.record)
    }

    /// Same as `trigger_notification`, also reporting the delivery outcome
    #[tracing::instrument(
        name = "trigger.notification",
        skip(self, content),
        fields(notification_type = %content.notification_type)
    )]
    pub async fn trigger(
        &self,
        recipient_id: &str,
        content: NotificationContent,
    ) -> Result<TriggeredNotification, TriggerError> {
        let record = self.store.create(content.for_recipient(recipient_id)).await?;
        RecordMetrics::record_created();

        tracing::debug!(
            notification_id = %record.id,
            recipient_id = %recipient_id,
            backend = self.store.backend_type(),
            "Notification persisted"
        );

        let Some(recipient) = self.resolve(recipient_id).await else {
            return Ok(TriggeredNotification {
                record,
                delivery: None,
            });
        };

        let delivery = dispatch_detached(self.dispatcher.clone(), recipient, record.clone()).await;

        Ok(TriggeredNotification { record, delivery })
    }

    /// Persist one record per recipient, then deliver in sequential batches.
    ///
    /// Within a batch, lookups run concurrently and then dispatches run
    /// concurrently; the next batch starts only after every dispatch of the
    /// current one has settled. Returns every persisted record, in input
    /// order.
    #[tracing::instrument(
        name = "trigger.broadcast",
        skip(self, recipient_ids, content),
        fields(
            recipients = recipient_ids.len(),
            notification_type = %content.notification_type,
            batch_size = self.batch_size
        )
    )]
    pub async fn trigger_broadcast(
        &self,
        recipient_ids: &[String],
        content: NotificationContent,
    ) -> Result<Vec<NotificationRecord>, TriggerError> {
        if recipient_ids.is_empty() {
            return Ok(Vec::new());
        }

        let new = recipient_ids
            .iter()
            .map(|recipient_id| content.for_recipient(recipient_id.as_str()))
            .collect();
        let records = self.store.create_many(new).await?;
        RecordMetrics::record_broadcast_created(records.len());
        BroadcastMetrics::record_started(records.len());

        for (batch_index, batch) in records.chunks(self.batch_size).enumerate() {
            BroadcastMetrics::record_batch();
            self.deliver_batch(batch_index, batch).await;
        }

        tracing::info!(
            recipients = records.len(),
            batches = records.len().div_ceil(self.batch_size),
            "Broadcast complete"
        );

        Ok(records)
    }

    async fn deliver_batch(&self, batch_index: usize, batch: &[NotificationRecord]) {
        let lookups = batch.iter().map(|record| async move {
            self.resolve(&record.recipient_id)
                .await
                .map(|recipient| (recipient, record.clone()))
        });
        let targets: Vec<(Recipient, NotificationRecord)> =
            join_all(lookups).await.into_iter().flatten().collect();

        let resolved = targets.len();
        let dispatches = targets.into_iter().map(|(recipient, record)| {
            dispatch_detached(self.dispatcher.clone(), recipient, record)
        });
        let delivered = join_all(dispatches)
            .await
            .into_iter()
            .flatten()
            .filter(|outcome| outcome.success)
            .count();

        tracing::debug!(
            batch = batch_index,
            size = batch.len(),
            resolved = resolved,
            delivered = delivered,
            "Broadcast batch settled"
        );
    }

    /// Resolve a recipient; unknown ids and directory failures yield `None`
    async fn resolve(&self, recipient_id: &str) -> Option<Recipient> {
        match self.directory.resolve(recipient_id).await {
            Ok(Some(recipient)) => Some(recipient),
            Ok(None) => {
                RecordMetrics::record_recipient_not_found();
                tracing::warn!(recipient_id = %recipient_id, "Recipient not found, skipping delivery");
                None
            }
            Err(e) => {
                tracing::error!(
                    recipient_id = %recipient_id,
                    error = %e,
                    "Recipient lookup failed, skipping delivery"
                );
                None
            }
        }
    }

    pub async fn mark_as_read(
        &self,
        recipient_id: &str,
        id: Uuid,
    ) -> Result<MarkReadOutcome, TriggerError> {
        Ok(self.store.mark_as_read(recipient_id, id).await?)
    }

    pub async fn mark_all_as_read(&self, recipient_id: &str) -> Result<u64, TriggerError> {
        Ok(self.store.mark_all_as_read(recipient_id).await?)
    }

    pub async fn list(
        &self,
        recipient_id: &str,
        query: ListQuery,
    ) -> Result<Vec<NotificationRecord>, TriggerError> {
        Ok(self.store.list_for_recipient(recipient_id, query).await?)
    }

    pub async fn unread_count(&self, recipient_id: &str) -> Result<u64, TriggerError> {
        Ok(self.store.count_unread(recipient_id).await?)
    }
}

/// Run a dispatch on its own task so a failure inside it stays contained
async fn dispatch_detached(
    dispatcher: Arc<ChannelDispatcher>,
    recipient: Recipient,
    record: NotificationRecord,
) -> Option<DeliveryOutcome> {
    let notification_id = record.id;
    let recipient_id = recipient.id.clone();

    match tokio::spawn(async move { dispatcher.dispatch(&recipient, &record).await }).await {
        Ok(outcome) => Some(outcome),
        Err(e) => {
            tracing::error!(
                notification_id = %notification_id,
                recipient_id = %recipient_id,
                error = %e,
                "Dispatch failed"
            );
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::{ChannelRegistry, InAppChannel};
    use crate::config::ChannelsConfig;
    use crate::directory::MemoryRecipientDirectory;
    use crate::store::MemoryNotificationStore;

    fn trigger_with(directory: MemoryRecipientDirectory) -> NotificationTrigger {
        let registry = ChannelRegistry::new(Arc::new(ChannelsConfig::default()));
        registry.register(Arc::new(InAppChannel::new()));
        NotificationTrigger::new(
            Arc::new(MemoryNotificationStore::new()),
            Arc::new(directory),
            Arc::new(ChannelDispatcher::new(Arc::new(registry))),
        )
    }

    #[tokio::test]
    async fn test_unknown_recipient_still_persists() {
        let trigger = trigger_with(MemoryRecipientDirectory::new());

        let triggered = trigger
            .trigger("ghost", NotificationContent::new("SYSTEM", "t", "m"))
            .await
            .unwrap();

        assert!(triggered.delivery.is_none());
        assert_eq!(trigger.unread_count("ghost").await.unwrap(), 1);
        assert_eq!(trigger.dispatcher().stats().total_dispatches, 0);
    }

    #[tokio::test]
    async fn test_empty_broadcast_creates_nothing() {
        let trigger = trigger_with(MemoryRecipientDirectory::new());

        let records = trigger
            .trigger_broadcast(&[], NotificationContent::new("SYSTEM", "t", "m"))
            .await
            .unwrap();
        assert!(records.is_empty());
    }

    #[tokio::test]
    async fn test_blank_recipient_is_a_persistence_error() {
        let trigger = trigger_with(MemoryRecipientDirectory::new());

        let result = trigger
            .trigger_notification("", NotificationContent::new("SYSTEM", "t", "m"))
            .await;
        assert!(matches!(result, Err(TriggerError::Persistence(StoreError::Invalid(_)))));
    }

    #[test]
    fn test_batch_size_has_floor_of_one() {
        let trigger = trigger_with(MemoryRecipientDirectory::new()).with_batch_size(0);
        assert_eq!(trigger.batch_size(), 1);
    }

    #[tokio::test]
    async fn test_read_state_pass_throughs() {
        let directory: MemoryRecipientDirectory =
            [Recipient::new("u1", "Ada")].into_iter().collect();
        let trigger = trigger_with(directory);

        let first = trigger
            .trigger_notification("u1", NotificationContent::new("SYSTEM", "a", "m"))
            .await
            .unwrap();
        trigger
            .trigger_notification("u1", NotificationContent::new("SYSTEM", "b", "m"))
            .await
            .unwrap();

        let outcome = trigger.mark_as_read("u1", first.id).await.unwrap();
        assert!(matches!(outcome, MarkReadOutcome::Marked(_)));
        assert_eq!(trigger.unread_count("u1").await.unwrap(), 1);
        assert_eq!(trigger.mark_all_as_read("u1").await.unwrap(), 1);

        let listed = trigger.list("u1", ListQuery::default()).await.unwrap();
        assert_eq!(listed.len(), 2);
        assert!(listed.iter().all(|r| r.is_read));
    }
}
