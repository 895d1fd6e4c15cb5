use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::MessageStore;
use crate::entities::ChatMessage;
use crate::types::{ChatError, ChatResult};

/// Process-local message store keyed by room.
#[derive(Debug, Default)]
pub struct InMemoryMessageStore {
    rooms: RwLock<HashMap<String, Vec<ChatMessage>>>,
}

impl InMemoryMessageStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of stored messages across all rooms.
    pub async fn len(&self) -> usize {
        self.rooms.read().await.values().map(Vec::len).sum()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl MessageStore for InMemoryMessageStore {
    async fn save(&self, message: &ChatMessage) -> ChatResult<()> {
        if message.room_id.is_empty() {
            return Err(ChatError::validation("room id must not be empty"));
        }

        let mut rooms = self.rooms.write().await;
        let history = rooms.entry(message.room_id.clone()).or_default();
        if history.iter().any(|existing| existing.id == message.id) {
            return Err(ChatError::storage(format!(
                "message {} already exists",
                message.id
            )));
        }
        history.push(message.clone());
        Ok(())
    }

    async fn list_by_room(&self, room_id: &str, limit: u32) -> ChatResult<Vec<ChatMessage>> {
        let rooms = self.rooms.read().await;
        let Some(history) = rooms.get(room_id) else {
            return Ok(Vec::new());
        };

        let mut ordered = history.clone();
        ordered.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        let skip = ordered.len().saturating_sub(limit as usize);
        Ok(ordered.into_iter().skip(skip).collect())
    }
}
