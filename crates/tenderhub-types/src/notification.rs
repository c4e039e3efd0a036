use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::collaborators::{Clock, Notifier};
use crate::error::Result;
use crate::ids::UserId;

/// A message delivered to a user's inbox.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    pub id: Uuid,
    pub recipient: UserId,
    pub sender: UserId,
    pub message: String,
    pub sent_at: DateTime<Utc>,
}

/// In-memory notification inbox.
pub struct Inbox {
    messages: RwLock<Vec<Notification>>,
    clock: Arc<dyn Clock>,
}

impl Inbox {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            messages: RwLock::new(Vec::new()),
            clock,
        }
    }

    /// Notifications for `recipient`, newest first.
    pub async fn for_recipient(&self, recipient: &UserId) -> Vec<Notification> {
        let messages = self.messages.read().await;
        messages
            .iter()
            .rev()
            .filter(|n| &n.recipient == recipient)
            .cloned()
            .collect()
    }

    pub async fn all(&self) -> Vec<Notification> {
        self.messages.read().await.clone()
    }

    pub async fn len(&self) -> usize {
        self.messages.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.messages.read().await.is_empty()
    }
}

#[async_trait]
impl Notifier for Inbox {
    async fn notify(&self, recipient: &UserId, sender: &UserId, message: &str) -> Result<()> {
        let notification = Notification {
            id: Uuid::new_v4(),
            recipient: recipient.clone(),
            sender: sender.clone(),
            message: message.to_string(),
            sent_at: self.clock.now(),
        };
        self.messages.write().await.push(notification);
        Ok(())
    }
}
