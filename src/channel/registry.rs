use std::sync::{Arc, RwLock};
use std::time::Duration;

use crate::config::{ChannelConfigSource, DEFAULT_CHANNEL_TIMEOUT_MS};

use super::DeliveryChannel;

/// A channel together with the timeout its attempts are bounded by
#[derive(Clone)]
pub struct RegisteredChannel {
    pub channel: Arc<dyn DeliveryChannel>,
    pub timeout: Duration,
}

impl RegisteredChannel {
    pub fn channel_id(&self) -> &str {
        self.channel.channel_id()
    }
}

impl std::fmt::Debug for RegisteredChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegisteredChannel")
            .field("channel_id", &self.channel_id())
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Holds the active channel set.
///
/// Built once at startup and read on every dispatch. Entries keep their
/// first-registration position so snapshots are stable; re-registering a
/// channel id replaces it in place.
pub struct ChannelRegistry {
    config: Arc<dyn ChannelConfigSource>,
    channels: RwLock<Vec<RegisteredChannel>>,
}

impl ChannelRegistry {
    pub fn new(config: Arc<dyn ChannelConfigSource>) -> Self {
        Self {
            config,
            channels: RwLock::new(Vec::new()),
        }
    }

    /// Add or replace a channel by id.
    ///
    /// Returns `false` (and registers nothing) when the channel's
    /// configuration marks it disabled. Channels without configuration are
    /// registered with the default timeout.
    pub fn register(&self, channel: Arc<dyn DeliveryChannel>) -> bool {
        let channel_id = channel.channel_id().to_string();
        let timeout_ms = match self.config.channel_config(&channel_id) {
            Some(config) if !config.enabled => {
                tracing::info!(channel_id = %channel_id, "Channel disabled by configuration, not registering");
                return false;
            }
            Some(config) => config.timeout_ms,
            None => DEFAULT_CHANNEL_TIMEOUT_MS,
        };

        let entry = RegisteredChannel {
            channel,
            timeout: Duration::from_millis(timeout_ms),
        };

        let mut channels = self.channels.write().unwrap_or_else(|e| e.into_inner());
        match channels.iter_mut().find(|c| c.channel_id() == channel_id) {
            Some(existing) => {
                *existing = entry;
                tracing::info!(channel_id = %channel_id, timeout_ms = timeout_ms, "Channel replaced");
            }
            None => {
                channels.push(entry);
                tracing::info!(channel_id = %channel_id, timeout_ms = timeout_ms, "Channel registered");
            }
        }
        true
    }

    /// Remove a channel by id, returning whether it was present
    pub fn unregister(&self, channel_id: &str) -> bool {
        let mut channels = self.channels.write().unwrap_or_else(|e| e.into_inner());
        let before = channels.len();
        channels.retain(|c| c.channel_id() != channel_id);
        let removed = channels.len() != before;
        if removed {
            tracing::info!(channel_id = %channel_id, "Channel unregistered");
        }
        removed
    }

    /// Snapshot of all registered channels, in registration order
    pub fn get_all(&self) -> Vec<RegisteredChannel> {
        self.channels
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn get(&self, channel_id: &str) -> Option<RegisteredChannel> {
        self.channels
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .find(|c| c.channel_id() == channel_id)
            .cloned()
    }

    pub fn channel_ids(&self) -> Vec<String> {
        self.channels
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .map(|c| c.channel_id().to_string())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.channels.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::{DeliveryError, InAppChannel};
    use crate::config::{ChannelConfig, ChannelsConfig};
    use crate::notification::{NotificationRecord, Recipient};
    use async_trait::async_trait;

    struct Named(&'static str);

    #[async_trait]
    impl DeliveryChannel for Named {
        fn channel_id(&self) -> &str {
            self.0
        }

        async fn send(&self, _: &Recipient, _: &NotificationRecord) -> Result<(), DeliveryError> {
            Ok(())
        }
    }

    fn config(in_app: ChannelConfig) -> Arc<ChannelsConfig> {
        Arc::new(ChannelsConfig {
            in_app,
            ..ChannelsConfig::default()
        })
    }

    #[test]
    fn test_register_uses_configured_timeout() {
        let registry = ChannelRegistry::new(config(ChannelConfig {
            timeout_ms: 250,
            ..ChannelConfig::enabled()
        }));

        assert!(registry.register(Arc::new(InAppChannel::new())));
        let entry = registry.get("in-app").unwrap();
        assert_eq!(entry.timeout, Duration::from_millis(250));
    }

    #[test]
    fn test_disabled_channel_is_not_registered() {
        let registry = ChannelRegistry::new(config(ChannelConfig::disabled()));

        assert!(!registry.register(Arc::new(InAppChannel::new())));
        assert!(!registry.register(Arc::new(InAppChannel::new())));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_unconfigured_channel_gets_default_timeout() {
        let registry = ChannelRegistry::new(config(ChannelConfig::enabled()));
        registry.register(Arc::new(Named("sms")));

        let entry = registry.get("sms").unwrap();
        assert_eq!(entry.timeout, Duration::from_millis(DEFAULT_CHANNEL_TIMEOUT_MS));
    }

    #[test]
    fn test_replace_keeps_position() {
        let registry = ChannelRegistry::new(config(ChannelConfig::enabled()));
        registry.register(Arc::new(Named("a")));
        registry.register(Arc::new(Named("b")));
        registry.register(Arc::new(Named("a")));

        assert_eq!(registry.channel_ids(), vec!["a", "b"]);
        assert_eq!(registry.len(), 2);

        assert!(registry.unregister("a"));
        assert!(!registry.unregister("a"));
        assert_eq!(registry.channel_ids(), vec!["b"]);
    }
}
