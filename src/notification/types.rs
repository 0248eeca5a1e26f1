use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A persisted notification addressed to a single recipient
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationRecord {
    /// Store-assigned identifier
    pub id: Uuid,
    /// Owning recipient
    pub recipient_id: String,
    /// Classification string (e.g., "SYSTEM", "KYC_APPROVED")
    #[serde(rename = "type")]
    pub notification_type: String,
    pub title: String,
    pub message: String,
    /// Whether the recipient has read this notification
    pub is_read: bool,
    /// When the record was created (immutable)
    pub created_at: DateTime<Utc>,
    /// When the record was first marked read; set exactly once
    pub read_at: Option<DateTime<Utc>>,
    /// Opaque key/value bag, never interpreted by the delivery core
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
}

impl NotificationRecord {
    /// Build a fresh unread record from creation input
    pub fn from_new(new: NewNotification) -> Self {
        Self {
            id: Uuid::new_v4(),
            recipient_id: new.recipient_id,
            notification_type: new.notification_type,
            title: new.title,
            message: new.message,
            is_read: false,
            created_at: Utc::now(),
            read_at: None,
            metadata: new.metadata,
        }
    }

    /// Mark the record read at `now`.
    ///
    /// Returns `false` if it was already read; `read_at` is left untouched in that case.
    pub fn mark_read(&mut self, now: DateTime<Utc>) -> bool {
        if self.is_read {
            return false;
        }
        self.is_read = true;
        self.read_at = Some(now);
        true
    }

    /// Whether this record matches the given content key
    pub fn matches_content(
        &self,
        recipient_id: &str,
        notification_type: &str,
        title: &str,
        message: &str,
    ) -> bool {
        self.recipient_id == recipient_id
            && self.notification_type == notification_type
            && self.title == title
            && self.message == message
    }
}

/// Input for creating a notification record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewNotification {
    pub recipient_id: String,
    #[serde(rename = "type")]
    pub notification_type: String,
    pub title: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
}

impl NewNotification {
    pub fn new(
        recipient_id: impl Into<String>,
        notification_type: impl Into<String>,
        title: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            recipient_id: recipient_id.into(),
            notification_type: notification_type.into(),
            title: title.into(),
            message: message.into(),
            metadata: None,
        }
    }

    /// Attach metadata
    pub fn metadata(mut self, metadata: Option<serde_json::Value>) -> Self {
        self.metadata = metadata;
        self
    }
}

/// Notification content without an addressee; the unit a broadcast fans out
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationContent {
    #[serde(rename = "type")]
    pub notification_type: String,
    pub title: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
}

impl NotificationContent {
    pub fn new(
        notification_type: impl Into<String>,
        title: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            notification_type: notification_type.into(),
            title: title.into(),
            message: message.into(),
            metadata: None,
        }
    }

    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = Some(metadata);
        self
    }

    /// Address this content to one recipient
    pub fn for_recipient(&self, recipient_id: impl Into<String>) -> NewNotification {
        NewNotification::new(
            recipient_id,
            self.notification_type.clone(),
            self.title.clone(),
            self.message.clone(),
        )
        .metadata(self.metadata.clone())
    }
}

/// Read-only projection of a user, resolved from the directory
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recipient {
    pub id: String,
    pub display_name: String,
    #[serde(default)]
    pub email: Option<String>,
}

impl Recipient {
    pub fn new(id: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
            email: None,
        }
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    /// The recipient's email address if present and non-blank
    pub fn deliverable_email(&self) -> Option<&str> {
        self.email
            .as_deref()
            .map(str::trim)
            .filter(|email| !email.is_empty())
    }
}

/// Result of a single channel attempt
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelResult {
    pub channel_id: String,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ChannelResult {
    pub fn delivered(channel_id: impl Into<String>) -> Self {
        Self {
            channel_id: channel_id.into(),
            success: true,
            error: None,
        }
    }

    pub fn failed(channel_id: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            channel_id: channel_id.into(),
            success: false,
            error: Some(error.into()),
        }
    }
}

/// Aggregated outcome of one dispatch across all applicable channels
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryOutcome {
    /// True if at least one channel succeeded, or no channel was applicable
    pub success: bool,
    pub channel_results: Vec<ChannelResult>,
}

impl DeliveryOutcome {
    /// Outcome for a dispatch where no channel applied
    pub fn nothing_applicable() -> Self {
        Self {
            success: true,
            channel_results: Vec::new(),
        }
    }

    pub fn from_results(channel_results: Vec<ChannelResult>) -> Self {
        let success =
            channel_results.is_empty() || channel_results.iter().any(|result| result.success);
        Self {
            success,
            channel_results,
        }
    }

    pub fn delivered_count(&self) -> usize {
        self.channel_results.iter().filter(|r| r.success).count()
    }

    pub fn failed_count(&self) -> usize {
        self.channel_results.len() - self.delivered_count()
    }
}
