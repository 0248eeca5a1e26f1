//! Email delivery.
//!
//! The channel renders the notification and hands it to an `EmailTransport`.
//! The bundled `HttpEmailTransport` posts to an HTTP mail relay; without a
//! configured relay the channel reports itself unavailable for everyone.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;

use crate::config::ChannelConfig;
use crate::notification::{NotificationRecord, Recipient};

use super::{DeliveryChannel, DeliveryError, EMAIL};

/// A rendered email ready for a transport
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EmailMessage {
    pub from: String,
    pub to: String,
    pub subject: String,
    pub text: String,
}

/// Outbound mail transport
#[async_trait]
pub trait EmailTransport: Send + Sync {
    async fn deliver(&self, message: EmailMessage) -> Result<(), DeliveryError>;
}

/// Posts messages as JSON to an HTTP mail relay
pub struct HttpEmailTransport {
    client: reqwest::Client,
    relay_url: String,
    api_key: Option<String>,
}

impl HttpEmailTransport {
    pub fn new(relay_url: impl Into<String>, api_key: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            relay_url: relay_url.into(),
            api_key,
        }
    }
}

#[async_trait]
impl EmailTransport for HttpEmailTransport {
    async fn deliver(&self, message: EmailMessage) -> Result<(), DeliveryError> {
        let mut request = self.client.post(&self.relay_url).json(&message);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        request.send().await?.error_for_status()?;
        Ok(())
    }
}

const DEFAULT_FROM: &str = "no-reply@localhost";

/// Email delivery channel
pub struct EmailChannel {
    transport: Option<Arc<dyn EmailTransport>>,
    from: String,
}

impl EmailChannel {
    /// Channel with an explicit transport
    pub fn new(transport: Arc<dyn EmailTransport>, from: impl Into<String>) -> Self {
        Self {
            transport: Some(transport),
            from: from.into(),
        }
    }

    /// Channel with no transport; never available
    pub fn unconfigured() -> Self {
        Self {
            transport: None,
            from: DEFAULT_FROM.to_string(),
        }
    }

    /// Build from channel options (`relay_url`, `api_key`, `from`)
    pub fn from_config(config: &ChannelConfig) -> Self {
        let from = config
            .option("from")
            .unwrap_or(DEFAULT_FROM)
            .to_string();

        match config.option("relay_url") {
            Some(url) => {
                let api_key = config.option("api_key").map(str::to_string);
                Self::new(Arc::new(HttpEmailTransport::new(url, api_key)), from)
            }
            None => {
                if config.enabled {
                    tracing::warn!("Email channel enabled without relay_url, it will never be used");
                }
                Self {
                    transport: None,
                    from,
                }
            }
        }
    }
}

#[async_trait]
impl DeliveryChannel for EmailChannel {
    fn channel_id(&self) -> &str {
        EMAIL
    }

    async fn send(
        &self,
        recipient: &Recipient,
        record: &NotificationRecord,
    ) -> Result<(), DeliveryError> {
        let Some(transport) = &self.transport else {
            return Err(DeliveryError::Unavailable("no email transport configured".to_string()));
        };
        let Some(to) = recipient.deliverable_email() else {
            return Err(DeliveryError::InvalidInput(format!(
                "recipient {} has no email address",
                recipient.id
            )));
        };

        let message = EmailMessage {
            from: self.from.clone(),
            to: to.to_string(),
            subject: self.format_title(record),
            text: self.format_message(record),
        };

        transport.deliver(message).await?;

        tracing::debug!(
            channel = EMAIL,
            notification_id = %record.id,
            recipient_id = %recipient.id,
            "Email handed to transport"
        );

        Ok(())
    }

    fn is_available_for(&self, recipient: &Recipient, _record: Option<&NotificationRecord>) -> bool {
        self.transport.is_some() && recipient.deliverable_email().is_some()
    }

    fn format_message(&self, record: &NotificationRecord) -> String {
        format!("{}\n\n{}", record.title, record.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notification::NewNotification;
    use std::sync::Mutex;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[derive(Default)]
    struct RecordingTransport {
        sent: Mutex<Vec<EmailMessage>>,
    }

    #[async_trait]
    impl EmailTransport for RecordingTransport {
        async fn deliver(&self, message: EmailMessage) -> Result<(), DeliveryError> {
            self.sent.lock().unwrap().push(message);
            Ok(())
        }
    }

    fn record() -> NotificationRecord {
        NotificationRecord::from_new(NewNotification::new("u1", "SYSTEM", "Welcome", "Hello"))
    }

    #[test]
    fn test_requires_email_address() {
        let channel = EmailChannel::new(Arc::new(RecordingTransport::default()), "a@b.c");

        assert!(!channel.is_available_for(&Recipient::new("u1", "Ada"), None));
        assert!(!channel.is_available_for(&Recipient::new("u1", "Ada").with_email(""), None));
        assert!(channel.is_available_for(
            &Recipient::new("u1", "Ada").with_email("ada@example.com"),
            None
        ));
    }

    #[test]
    fn test_unconfigured_is_never_available() {
        let channel = EmailChannel::unconfigured();
        let recipient = Recipient::new("u1", "Ada").with_email("ada@example.com");

        assert!(!channel.is_available_for(&recipient, Some(&record())));
        assert!(!EmailChannel::from_config(&ChannelConfig::enabled())
            .is_available_for(&recipient, None));
    }

    #[tokio::test]
    async fn test_send_renders_message() {
        let transport = Arc::new(RecordingTransport::default());
        let channel = EmailChannel::new(transport.clone(), "noreply@example.com");
        let recipient = Recipient::new("u1", "Ada").with_email("ada@example.com");

        channel.send(&recipient, &record()).await.unwrap();

        let sent = transport.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].to, "ada@example.com");
        assert_eq!(sent[0].subject, "Welcome");
        assert_eq!(sent[0].text, "Welcome\n\nHello");
    }

    #[tokio::test]
    async fn test_send_without_email_fails_cleanly() {
        let channel = EmailChannel::new(Arc::new(RecordingTransport::default()), "a@b.c");
        let result = channel.send(&Recipient::new("u1", "Ada"), &record()).await;

        assert!(matches!(result, Err(DeliveryError::InvalidInput(_))));
    }

    #[tokio::test]
    async fn test_http_relay_posts_with_bearer_key() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/send"))
            .and(header("Authorization", "Bearer relay-key"))
            .respond_with(ResponseTemplate::new(202))
            .expect(1)
            .mount(&server)
            .await;

        let config = ChannelConfig::enabled()
            .with_option("relay_url", format!("{}/send", server.uri()))
            .with_option("api_key", "relay-key")
            .with_option("from", "noreply@example.com");
        let channel = EmailChannel::from_config(&config);
        let recipient = Recipient::new("u1", "Ada").with_email("ada@example.com");

        channel.send(&recipient, &record()).await.unwrap();

        let requests = server.received_requests().await.unwrap();
        let body: EmailBody = requests[0].body_json().unwrap();
        assert_eq!(body.from, "noreply@example.com");
        assert_eq!(body.to, "ada@example.com");
        assert_eq!(body.subject, "Welcome");
        assert_eq!(body.text, "Welcome\n\nHello");
    }

    #[tokio::test]
    async fn test_http_relay_error_status_is_rejected() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let transport = HttpEmailTransport::new(server.uri(), None);
        let message = EmailMessage {
            from: "a@b.c".to_string(),
            to: "ada@example.com".to_string(),
            subject: "s".to_string(),
            text: "t".to_string(),
        };

        let result = transport.deliver(message).await;
        assert_eq!(result, Err(DeliveryError::Rejected { status: 500 }));
        let requests = server.received_requests().await.unwrap();
        assert!(!requests[0].headers.contains_key("authorization"));
    }

    #[derive(serde::Deserialize)]
    struct EmailBody {
        from: String,
        to: String,
        subject: String,
        text: String,
    }
}
