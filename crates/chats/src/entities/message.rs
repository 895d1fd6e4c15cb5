use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A chat message relayed to a room.
///
/// Messages are immutable once built; every receiver gets its own
/// serialized copy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Unique identifier assigned at creation
    pub id: String,
    /// Room this message was posted to
    pub room_id: String,
    /// Authenticated subject, or the reserved assistant identity
    pub sender_id: String,
    /// Text exactly as received
    pub content: String,
    /// Assigned by the component that created the message
    pub created_at: DateTime<Utc>,
}

impl ChatMessage {
    /// Create a new message with a fresh identifier and the current timestamp.
    pub fn new(
        room_id: impl Into<String>,
        sender_id: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            room_id: room_id.into(),
            sender_id: sender_id.into(),
            content: content.into(),
            created_at: Utc::now(),
        }
    }

    pub fn is_from(&self, sender_id: &str) -> bool {
        self.sender_id == sender_id
    }
}
