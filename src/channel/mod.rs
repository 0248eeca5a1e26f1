//! Delivery channels.
//!
//! A channel is a pluggable transport able to deliver a persisted
//! notification to its recipient. Every channel implements the same
//! capability set (`DeliveryChannel`); the dispatcher only ever talks to the
//! trait.
//!
//! - `InAppChannel`: the persisted record is the in-app delivery
//! - `EmailChannel`: mail via an `EmailTransport` (HTTP relay by default)
//! - `WebhookChannel`: JSON POST to a configured endpoint
//! - `SocketChannel`: push to the recipient's live socket connections
//!
//! Use `create_registry()` to build the active set from configuration.

mod email;
mod in_app;
mod registry;
mod socket;
mod webhook;

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::config::ChannelsConfig;
use crate::connection_manager::ConnectionManager;
use crate::notification::{NotificationRecord, Recipient};

pub use email::{EmailChannel, EmailMessage, EmailTransport, HttpEmailTransport};
pub use in_app::InAppChannel;
pub use registry::{ChannelRegistry, RegisteredChannel};
pub use socket::SocketChannel;
pub use webhook::{WebhookChannel, WebhookPayload};

/// Identifier of the in-app channel
pub const IN_APP: &str = "in-app";
/// Identifier of the email channel
pub const EMAIL: &str = "email";
/// Identifier of the webhook channel
pub const WEBHOOK: &str = "webhook";
/// Identifier of the socket push channel
pub const SOCKET: &str = "socket";

/// Errors a channel can report for a single delivery attempt.
///
/// None of these escape the dispatcher; each is folded into that channel's
/// own result.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeliveryError {
    /// The attempt did not settle within the channel's timeout
    #[error("timeout")]
    Timeout,

    /// The recipient/record pair cannot be delivered by this channel
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The channel lacks what it needs to deliver (e.g., no transport configured)
    #[error("channel unavailable: {0}")]
    Unavailable(String),

    /// Network or transport-level failure
    #[error("transport error: {0}")]
    Transport(String),

    /// Remote endpoint answered with a non-success status
    #[error("rejected with status {status}")]
    Rejected { status: u16 },

    /// Recipient has no live connection to push to
    #[error("no live connection for recipient {0}")]
    NoLiveConnection(String),

    /// The send task panicked
    #[error("send panicked: {0}")]
    Panicked(String),
}

impl From<reqwest::Error> for DeliveryError {
    fn from(e: reqwest::Error) -> Self {
        match e.status() {
            Some(status) => DeliveryError::Rejected {
                status: status.as_u16(),
            },
            None => DeliveryError::Transport(e.to_string()),
        }
    }
}

/// Capability set shared by every delivery channel.
///
/// # Contract
///
/// - `channel_id` is constant for the lifetime of the channel.
/// - `is_available_for` is pure and synchronous; it must not perform I/O.
/// - `send` is only called when `is_available_for` returned `true`, but must
///   still fail with a `DeliveryError` rather than panic on bad input.
/// - Each `send` call must be self-contained: the dispatcher may discard a
///   call that outlives its timeout while it keeps running.
#[async_trait]
pub trait DeliveryChannel: Send + Sync + 'static {
    /// Stable channel identifier (e.g., "in-app")
    fn channel_id(&self) -> &str;

    /// Deliver `record` to `recipient`.
    async fn send(
        &self,
        recipient: &Recipient,
        record: &NotificationRecord,
    ) -> Result<(), DeliveryError>;

    /// Whether this channel can deliver to `recipient`.
    fn is_available_for(&self, _recipient: &Recipient, _record: Option<&NotificationRecord>) -> bool {
        true
    }

    /// Title as rendered by this channel
    fn format_title(&self, record: &NotificationRecord) -> String {
        record.title.clone()
    }

    /// Message body as rendered by this channel
    fn format_message(&self, record: &NotificationRecord) -> String {
        record.message.clone()
    }
}

/// Build the channel registry from configuration.
///
/// Every known channel is offered to the registry; the registry itself drops
/// the ones configured as disabled.
pub fn create_registry(
    config: &ChannelsConfig,
    connection_manager: Arc<ConnectionManager>,
) -> ChannelRegistry {
    let registry = ChannelRegistry::new(Arc::new(config.clone()));

    registry.register(Arc::new(InAppChannel::new()));
    registry.register(Arc::new(EmailChannel::from_config(&config.email)));
    registry.register(Arc::new(WebhookChannel::from_config(&config.webhook)));
    registry.register(Arc::new(SocketChannel::new(connection_manager)));

    tracing::info!(
        channels = ?registry.channel_ids(),
        "Channel registry initialized"
    );

    registry
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ChannelConfig;

    #[test]
    fn test_timeout_error_display() {
        assert_eq!(DeliveryError::Timeout.to_string(), "timeout");
        assert_eq!(
            DeliveryError::Rejected { status: 502 }.to_string(),
            "rejected with status 502"
        );
    }

    #[test]
    fn test_create_registry_respects_enabled_flags() {
        let config = ChannelsConfig {
            in_app: ChannelConfig::enabled(),
            email: ChannelConfig::disabled(),
            webhook: ChannelConfig::disabled(),
            socket: ChannelConfig::enabled(),
        };

        let registry = create_registry(&config, Arc::new(ConnectionManager::new()));
        assert_eq!(registry.channel_ids(), vec![IN_APP, SOCKET]);
    }
}
