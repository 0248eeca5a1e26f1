//! Connection handle and outbound frame types

use serde::Serialize;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::notification::NotificationRecord;

/// Frames pushed from the server to a connected client
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
pub enum ServerMessage {
    #[serde(rename = "notification")]
    Notification { notification: NotificationRecord },
}

/// Handle for a single live connection
pub struct ConnectionHandle {
    pub id: Uuid,
    pub user_id: String,
    pub sender: mpsc::Sender<ServerMessage>,
}

impl ConnectionHandle {
    pub fn new(user_id: String, sender: mpsc::Sender<ServerMessage>) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            sender,
        }
    }

    /// Queue a frame without waiting for buffer space
    pub fn try_send(
        &self,
        message: ServerMessage,
    ) -> Result<(), mpsc::error::TrySendError<ServerMessage>> {
        self.sender.try_send(message)
    }

    /// Whether the receiving side has gone away
    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notification::NewNotification;

    #[test]
    fn test_notification_frame_shape() {
        let record =
            NotificationRecord::from_new(NewNotification::new("u1", "SYSTEM", "Welcome", "Hello"));
        let frame = ServerMessage::Notification {
            notification: record.clone(),
        };

        let json = serde_json::to_value(&frame).unwrap();
        assert_eq!(json["type"], "notification");
        assert_eq!(json["notification"]["id"], record.id.to_string());
        assert_eq!(json["notification"]["type"], "SYSTEM");
        assert_eq!(json["notification"]["title"], "Welcome");
    }
}
