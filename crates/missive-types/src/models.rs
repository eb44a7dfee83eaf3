use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub created_at: DateTime<Utc>,
}

/// A direct message between two users.
///
/// `parent_message_id` makes the message a reply; `None` means top-level.
/// `timestamp` is set once at creation and never rewritten.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: Uuid,
    pub sender_id: Uuid,
    pub receiver_id: Uuid,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    pub edited: bool,
    pub edited_at: Option<DateTime<Utc>>,
    pub read: bool,
    pub parent_message_id: Option<Uuid>,
}

impl Message {
    pub fn is_top_level(&self) -> bool {
        self.parent_message_id.is_none()
    }

    pub fn involves(&self, user_id: Uuid) -> bool {
        self.sender_id == user_id || self.receiver_id == user_id
    }
}

/// Snapshot of a message's content taken just before an edit replaced it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageHistory {
    pub id: Uuid,
    pub original_message_id: Uuid,
    pub old_content: String,
    pub edited_by: Option<Uuid>,
    pub edited_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub id: Uuid,
    pub user_id: Uuid,
    pub message_id: Uuid,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

/// Input for creating a message. The store assigns id and timestamp.
#[derive(Debug, Clone, Deserialize)]
pub struct NewMessage {
    pub sender_id: Uuid,
    pub receiver_id: Uuid,
    pub content: String,
    #[serde(default)]
    pub parent_message_id: Option<Uuid>,
}

impl NewMessage {
    pub fn new(sender_id: Uuid, receiver_id: Uuid, content: impl Into<String>) -> Self {
        Self {
            sender_id,
            receiver_id,
            content: content.into(),
            parent_message_id: None,
        }
    }

    pub fn reply_to(mut self, parent_id: Uuid) -> Self {
        self.parent_message_id = Some(parent_id);
        self
    }
}
