//! Socket push delivery through the in-process connection registry.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc::error::TrySendError;

use crate::connection_manager::{ConnectionManager, ServerMessage};
use crate::notification::{NotificationRecord, Recipient};

use super::{DeliveryChannel, DeliveryError, SOCKET};

/// Pushes a `notification` frame to every live connection of the recipient
pub struct SocketChannel {
    connection_manager: Arc<ConnectionManager>,
}

impl SocketChannel {
    pub fn new(connection_manager: Arc<ConnectionManager>) -> Self {
        Self { connection_manager }
    }
}

#[async_trait]
impl DeliveryChannel for SocketChannel {
    fn channel_id(&self) -> &str {
        SOCKET
    }

    async fn send(
        &self,
        recipient: &Recipient,
        record: &NotificationRecord,
    ) -> Result<(), DeliveryError> {
        let connections = self.connection_manager.get_user_connections(&recipient.id);
        if connections.is_empty() {
            return Err(DeliveryError::NoLiveConnection(recipient.id.clone()));
        }

        let message = ServerMessage::Notification {
            notification: record.clone(),
        };

        // Never wait on a client buffer
        let mut delivered = 0;
        let mut full = 0;
        let mut closed = 0;
        for conn in &connections {
            match conn.try_send(message.clone()) {
                Ok(()) => delivered += 1,
                Err(TrySendError::Full(_)) => full += 1,
                Err(TrySendError::Closed(_)) => {
                    self.connection_manager.unregister(conn.id);
                    closed += 1;
                }
            }
        }

        tracing::debug!(
            channel = SOCKET,
            notification_id = %record.id,
            recipient_id = %recipient.id,
            delivered = delivered,
            full = full,
            closed = closed,
            "Pushed notification to live connections"
        );

        if delivered == 0 {
            return Err(DeliveryError::Transport(format!(
                "no connection accepted the frame ({} full, {} closed)",
                full, closed
            )));
        }
        Ok(())
    }

    fn is_available_for(&self, recipient: &Recipient, _record: Option<&NotificationRecord>) -> bool {
        self.connection_manager.is_connected(&recipient.id)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::channel::ChannelRegistry;
    use crate::config::{ChannelConfig, ChannelsConfig};
    use crate::connection_manager::DEFAULT_BUFFER;
    use crate::notification::{ChannelDispatcher, NewNotification};

    fn record() -> NotificationRecord {
        NotificationRecord::from_new(NewNotification::new("u1", "SYSTEM", "Welcome", "Hello"))
    }

    #[tokio::test]
    async fn test_push_to_all_connections() {
        let manager = Arc::new(ConnectionManager::new());
        let (_h1, mut rx1) = manager.connect("u1");
        let (_h2, mut rx2) = manager.connect("u1");
        let channel = SocketChannel::new(manager);
        let recipient = Recipient::new("u1", "Ada");
        let record = record();

        assert!(channel.is_available_for(&recipient, Some(&record)));
        channel.send(&recipient, &record).await.unwrap();

        for rx in [&mut rx1, &mut rx2] {
            match rx.recv().await {
                Some(ServerMessage::Notification { notification }) => {
                    assert_eq!(notification.id, record.id)
                }
                other => panic!("unexpected frame: {:?}", other),
            }
        }
    }

    #[tokio::test]
    async fn test_unavailable_without_connections() {
        let channel = SocketChannel::new(Arc::new(ConnectionManager::new()));
        let recipient = Recipient::new("u1", "Ada");

        assert!(!channel.is_available_for(&recipient, None));
        let result = channel.send(&recipient, &record()).await;
        assert!(matches!(result, Err(DeliveryError::NoLiveConnection(_))));
    }

    #[tokio::test]
    async fn test_full_buffer_fails_without_late_delivery() {
        let manager = Arc::new(ConnectionManager::new());
        let (handle, mut rx) = manager.connect("u1");
        let filler = record();
        while handle
            .try_send(ServerMessage::Notification {
                notification: filler.clone(),
            })
            .is_ok()
        {}
        let buffered = DEFAULT_BUFFER;

        let config = ChannelsConfig {
            socket: ChannelConfig {
                timeout_ms: 30,
                ..ChannelConfig::enabled()
            },
            ..ChannelsConfig::default()
        };
        let registry = ChannelRegistry::new(Arc::new(config));
        registry.register(Arc::new(SocketChannel::new(manager.clone())));
        let dispatcher = ChannelDispatcher::new(Arc::new(registry));

        let late = record();
        let outcome = dispatcher.dispatch(&Recipient::new("u1", "Ada"), &late).await;

        assert!(!outcome.success);
        let error = outcome.channel_results[0].error.as_deref().unwrap();
        assert_ne!(error, "timeout");
        assert!(error.contains("1 full"));

        // Nothing from the failed attempt shows up once the client catches up
        tokio::time::sleep(Duration::from_millis(100)).await;
        let mut drained = 0;
        while let Ok(frame) = rx.try_recv() {
            match frame {
                ServerMessage::Notification { notification } => {
                    assert_eq!(notification.id, filler.id)
                }
            }
            drained += 1;
        }
        assert_eq!(drained, buffered);
        assert!(manager.is_connected("u1"));
    }

    #[tokio::test]
    async fn test_all_connections_closed_is_failure() {
        let manager = Arc::new(ConnectionManager::new());
        let (_handle, rx) = manager.connect("u1");
        drop(rx);
        let channel = SocketChannel::new(manager.clone());

        let result = channel.send(&Recipient::new("u1", "Ada"), &record()).await;
        assert!(matches!(result, Err(DeliveryError::Transport(_))));
        assert!(!manager.is_connected("u1"));
    }
}
