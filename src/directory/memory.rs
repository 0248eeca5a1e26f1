use async_trait::async_trait;
use dashmap::DashMap;

use crate::notification::Recipient;

use super::{DirectoryError, RecipientDirectory};

/// In-memory recipient directory
#[derive(Default)]
pub struct MemoryRecipientDirectory {
    recipients: DashMap<String, Recipient>,
}

impl MemoryRecipientDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a recipient
    pub fn upsert(&self, recipient: Recipient) {
        self.recipients.insert(recipient.id.clone(), recipient);
    }

    /// Remove a recipient, returning it if present
    pub fn remove(&self, recipient_id: &str) -> Option<Recipient> {
        self.recipients.remove(recipient_id).map(|(_, r)| r)
    }

    pub fn len(&self) -> usize {
        self.recipients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.recipients.is_empty()
    }
}

impl FromIterator<Recipient> for MemoryRecipientDirectory {
    fn from_iter<I: IntoIterator<Item = Recipient>>(iter: I) -> Self {
        let directory = Self::new();
        for recipient in iter {
            directory.upsert(recipient);
        }
        directory
    }
}

#[async_trait]
impl RecipientDirectory for MemoryRecipientDirectory {
    async fn resolve(&self, recipient_id: &str) -> Result<Option<Recipient>, DirectoryError> {
        Ok(self.recipients.get(recipient_id).map(|r| r.clone()))
    }
}
