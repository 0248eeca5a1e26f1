//! Webhook delivery: POSTs each notification as JSON to a configured URL.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::config::ChannelConfig;
use crate::notification::{NotificationRecord, Recipient};

use super::{DeliveryChannel, DeliveryError, WEBHOOK};

/// Header carrying the shared secret, when one is configured
pub const SECRET_HEADER: &str = "X-Webhook-Secret";

/// Outbound webhook body
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookPayload<'a> {
    pub id: Uuid,
    pub recipient_id: &'a str,
    #[serde(rename = "type")]
    pub notification_type: &'a str,
    pub title: String,
    pub message: String,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<&'a serde_json::Value>,
}

/// Webhook delivery channel
pub struct WebhookChannel {
    client: reqwest::Client,
    url: Option<String>,
    secret: Option<String>,
}

impl WebhookChannel {
    pub fn new(url: impl Into<String>, secret: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: Some(url.into()),
            secret,
        }
    }

    /// Build from channel options (`url`, `secret`)
    pub fn from_config(config: &ChannelConfig) -> Self {
        let url = config.option("url").map(str::to_string);
        if config.enabled && url.is_none() {
            tracing::warn!("Webhook channel enabled without url, it will never be used");
        }
        Self {
            client: reqwest::Client::new(),
            url,
            secret: config.option("secret").map(str::to_string),
        }
    }

    pub fn payload<'a>(&self, record: &'a NotificationRecord) -> WebhookPayload<'a> {
        WebhookPayload {
            id: record.id,
            recipient_id: &record.recipient_id,
            notification_type: &record.notification_type,
            title: self.format_title(record),
            message: self.format_message(record),
            created_at: record.created_at,
            metadata: record.metadata.as_ref(),
        }
    }
}

#[async_trait]
impl DeliveryChannel for WebhookChannel {
    fn channel_id(&self) -> &str {
        WEBHOOK
    }

    async fn send(
        &self,
        recipient: &Recipient,
        record: &NotificationRecord,
    ) -> Result<(), DeliveryError> {
        let Some(url) = &self.url else {
            return Err(DeliveryError::Unavailable("no webhook url configured".to_string()));
        };

        let mut request = self.client.post(url).json(&self.payload(record));
        if let Some(secret) = &self.secret {
            request = request.header(SECRET_HEADER, secret);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(DeliveryError::Rejected {
                status: status.as_u16(),
            });
        }

        tracing::debug!(
            channel = WEBHOOK,
            notification_id = %record.id,
            recipient_id = %recipient.id,
            status = status.as_u16(),
            "Webhook delivered"
        );

        Ok(())
    }

    fn is_available_for(&self, _recipient: &Recipient, _record: Option<&NotificationRecord>) -> bool {
        self.url.is_some()
    }
}
