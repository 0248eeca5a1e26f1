use std::sync::Arc;

use futures::StreamExt;
use serde::Deserialize;
use tokio::sync::broadcast;

use crate::config::RedisConfig;
use crate::notification::{NotificationContent, NotificationTrigger};
use crate::redis::{BackoffConfig, ExponentialBackoff};

/// Channel subscribed to when none is configured
pub const DEFAULT_TRIGGER_CHANNEL: &str = "notification:trigger";

/// Message format received from Redis Pub/Sub
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TriggerMessage {
    /// One recipient
    User {
        recipient: String,
        notification: NotificationContent,
    },
    /// Many recipients, delivered in batches
    Broadcast {
        recipients: Vec<String>,
        notification: NotificationContent,
    },
}

/// Redis Pub/Sub subscriber feeding the notification trigger
pub struct RedisTriggerSubscriber {
    config: RedisConfig,
    trigger: Arc<NotificationTrigger>,
    backoff: BackoffConfig,
    shutdown: broadcast::Sender<()>,
}

impl RedisTriggerSubscriber {
    pub fn new(config: RedisConfig, trigger: Arc<NotificationTrigger>) -> Self {
        let (shutdown, _) = broadcast::channel(1);
        Self {
            config,
            trigger,
            backoff: BackoffConfig::default(),
            shutdown,
        }
    }

    /// Override the reconnection backoff
    pub fn with_backoff(mut self, backoff: BackoffConfig) -> Self {
        self.backoff = backoff;
        self
    }

    /// Get a shutdown signal sender
    pub fn shutdown_signal(&self) -> broadcast::Sender<()> {
        self.shutdown.clone()
    }

    /// Run until a shutdown signal arrives, reconnecting on failure
    pub async fn start(&self) -> anyhow::Result<()> {
        let channels = self.channels();
        tracing::info!(channels = ?channels, "Starting Redis trigger subscriber");

        let mut backoff = ExponentialBackoff::new(self.backoff.clone());
        let mut shutdown_rx = self.shutdown.subscribe();

        loop {
            match self
                .run_subscription_loop(&channels, &mut backoff, &mut shutdown_rx)
                .await
            {
                Ok(()) => {
                    tracing::info!("Redis trigger subscriber stopped gracefully");
                    break;
                }
                Err(e) => {
                    let delay = backoff.next_delay();
                    tracing::error!(
                        error = %e,
                        attempt = backoff.attempt(),
                        delay_ms = delay.as_millis() as u64,
                        "Redis subscription error, reconnecting"
                    );
                    tokio::select! {
                        _ = shutdown_rx.recv() => {
                            tracing::info!("Shutdown requested while waiting to reconnect");
                            break;
                        }
                        _ = tokio::time::sleep(delay) => {}
                    }
                }
            }
        }

        Ok(())
    }

    fn channels(&self) -> Vec<String> {
        if self.config.channels.is_empty() {
            vec![DEFAULT_TRIGGER_CHANNEL.to_string()]
        } else {
            self.config.channels.clone()
        }
    }

    async fn run_subscription_loop(
        &self,
        channels: &[String],
        backoff: &mut ExponentialBackoff,
        shutdown_rx: &mut broadcast::Receiver<()>,
    ) -> anyhow::Result<()> {
        let client = redis::Client::open(self.config.url.as_str())?;
        let mut pubsub = client.get_async_pubsub().await?;

        for channel in channels {
            if channel.contains('*') || channel.contains('?') || channel.contains('[') {
                pubsub.psubscribe(channel).await?;
                tracing::debug!(pattern = %channel, "Subscribed to pattern");
            } else {
                pubsub.subscribe(channel).await?;
                tracing::debug!(channel = %channel, "Subscribed to channel");
            }
        }

        backoff.reset();
        tracing::info!("Redis subscription established");

        let mut message_stream = pubsub.on_message();

        loop {
            tokio::select! {
                _ = shutdown_rx.recv() => {
                    tracing::info!("Received shutdown signal");
                    return Ok(());
                }
                msg = message_stream.next() => {
                    let Some(msg) = msg else {
                        anyhow::bail!("Redis message stream ended");
                    };

                    let channel = msg.get_channel_name().to_string();
                    let payload: String = match msg.get_payload() {
                        Ok(p) => p,
                        Err(e) => {
                            tracing::warn!(error = %e, channel = %channel, "Failed to get message payload");
                            continue;
                        }
                    };

                    self.handle_message(&channel, &payload);
                }
            }
        }
    }

    /// Parse and hand a message to the trigger on its own task
    fn handle_message(&self, channel: &str, payload: &str) {
        let message: TriggerMessage = match serde_json::from_str(payload) {
            Ok(m) => m,
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    channel = %channel,
                    payload = %payload,
                    "Failed to parse trigger message"
                );
                return;
            }
        };

        let trigger = self.trigger.clone();
        let channel = channel.to_string();
        tokio::spawn(async move { run_trigger(&trigger, &channel, message).await });
    }
}

async fn run_trigger(trigger: &NotificationTrigger, channel: &str, message: TriggerMessage) {
    match message {
        TriggerMessage::User {
            recipient,
            notification,
        } => match trigger.trigger_notification(&recipient, notification).await {
            Ok(record) => tracing::debug!(
                channel = %channel,
                notification_id = %record.id,
                recipient_id = %recipient,
                "Triggered notification from Redis"
            ),
            Err(e) => tracing::error!(
                channel = %channel,
                recipient_id = %recipient,
                error = %e,
                "Failed to trigger notification from Redis"
            ),
        },
        TriggerMessage::Broadcast {
            recipients,
            notification,
        } => match trigger.trigger_broadcast(&recipients, notification).await {
            Ok(records) => tracing::debug!(
                channel = %channel,
                created = records.len(),
                "Triggered broadcast from Redis"
            ),
            Err(e) => tracing::error!(
                channel = %channel,
                recipients = recipients.len(),
                error = %e,
                "Failed to trigger broadcast from Redis"
            ),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::ChannelRegistry;
    use crate::config::ChannelsConfig;
    use crate::directory::MemoryRecipientDirectory;
    use crate::notification::ChannelDispatcher;
    use crate::store::{ListQuery, MemoryNotificationStore};

    #[test]
    fn test_parse_user_message() {
        let json = r#"{
            "type": "user",
            "recipient": "u1",
            "notification": {
                "type": "SYSTEM",
                "title": "Welcome",
                "message": "Hello",
                "metadata": {"source": "signup"}
            }
        }"#;

        let message: TriggerMessage = serde_json::from_str(json).unwrap();
        match message {
            TriggerMessage::User {
                recipient,
                notification,
            } => {
                assert_eq!(recipient, "u1");
                assert_eq!(notification.notification_type, "SYSTEM");
                assert_eq!(notification.metadata.unwrap()["source"], "signup");
            }
            other => panic!("Expected user message, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_broadcast_message() {
        let json = r#"{
            "type": "broadcast",
            "recipients": ["u1", "u2", "u3"],
            "notification": {"type": "MAINTENANCE", "title": "Downtime", "message": "Tonight"}
        }"#;

        let message: TriggerMessage = serde_json::from_str(json).unwrap();
        match message {
            TriggerMessage::Broadcast { recipients, .. } => assert_eq!(recipients.len(), 3),
            other => panic!("Expected broadcast message, got {:?}", other),
        }
    }

    #[test]
    fn test_reject_unknown_type() {
        let json = r#"{"type": "channel", "notification": {"type": "X", "title": "t", "message": "m"}}"#;
        assert!(serde_json::from_str::<TriggerMessage>(json).is_err());
    }

    #[tokio::test]
    async fn test_run_trigger_persists_user_message() {
        let store = Arc::new(MemoryNotificationStore::new());
        let registry = ChannelRegistry::new(Arc::new(ChannelsConfig::default()));
        let trigger = NotificationTrigger::new(
            store.clone(),
            Arc::new(MemoryRecipientDirectory::new()),
            Arc::new(ChannelDispatcher::new(Arc::new(registry))),
        );

        run_trigger(
            &trigger,
            DEFAULT_TRIGGER_CHANNEL,
            TriggerMessage::User {
                recipient: "u1".to_string(),
                notification: NotificationContent::new("SYSTEM", "t", "m"),
            },
        )
        .await;

        let records = trigger.list("u1", ListQuery::default()).await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_default_channel() {
        let registry = ChannelRegistry::new(Arc::new(ChannelsConfig::default()));
        let trigger = Arc::new(NotificationTrigger::new(
            Arc::new(MemoryNotificationStore::new()),
            Arc::new(MemoryRecipientDirectory::new()),
            Arc::new(ChannelDispatcher::new(Arc::new(registry))),
        ));
        let subscriber = RedisTriggerSubscriber::new(RedisConfig::default(), trigger);
        assert_eq!(subscriber.channels(), vec![DEFAULT_TRIGGER_CHANNEL]);
    }
}
