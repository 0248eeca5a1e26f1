use async_trait::async_trait;

use crate::notification::{NotificationRecord, Recipient};

use super::{DeliveryChannel, DeliveryError, IN_APP};

/// In-app delivery.
///
/// The record persisted by the store is what the recipient sees in the app,
/// so a send only has to confirm the record really belongs to the recipient.
#[derive(Debug, Default)]
pub struct InAppChannel;

impl InAppChannel {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl DeliveryChannel for InAppChannel {
    fn channel_id(&self) -> &str {
        IN_APP
    }

    async fn send(
        &self,
        recipient: &Recipient,
        record: &NotificationRecord,
    ) -> Result<(), DeliveryError> {
        if record.recipient_id != recipient.id {
            return Err(DeliveryError::InvalidInput(format!(
                "record {} belongs to {}, not {}",
                record.id, record.recipient_id, recipient.id
            )));
        }

        tracing::debug!(
            channel = IN_APP,
            notification_id = %record.id,
            recipient_id = %recipient.id,
            "In-app notification available"
        );

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notification::NewNotification;

    #[tokio::test]
    async fn test_in_app_send() {
        let recipient = Recipient::new("u1", "Ada");
        let record =
            NotificationRecord::from_new(NewNotification::new("u1", "SYSTEM", "Welcome", "Hello"));

        assert!(InAppChannel.is_available_for(&recipient, Some(&record)));
        assert!(InAppChannel.send(&recipient, &record).await.is_ok());
        assert_eq!(InAppChannel.format_title(&record), "Welcome");
        assert_eq!(InAppChannel.format_message(&record), "Hello");
    }

    #[tokio::test]
    async fn test_in_app_rejects_foreign_record() {
        let recipient = Recipient::new("u2", "Bob");
        let record =
            NotificationRecord::from_new(NewNotification::new("u1", "SYSTEM", "Welcome", "Hello"));

        let result = InAppChannel.send(&recipient, &record).await;
        assert!(matches!(result, Err(DeliveryError::InvalidInput(_))));
    }
}
