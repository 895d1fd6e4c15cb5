//! Persistence port for chat messages.
//!
//! The relay only needs to append messages and read recent history back.
//! The SQLite implementation lives in `parlor-database`; the in-memory store
//! here backs tests and database-less runs.

pub mod memory;

use async_trait::async_trait;

use crate::entities::ChatMessage;
use crate::types::ChatResult;

pub use memory::InMemoryMessageStore;

#[async_trait]
pub trait MessageStore: Send + Sync {
    /// Persist a message exactly as built by the caller.
    async fn save(&self, message: &ChatMessage) -> ChatResult<()>;

    /// Return up to `limit` of the most recent messages in a room, oldest first.
    async fn list_by_room(&self, room_id: &str, limit: u32) -> ChatResult<Vec<ChatMessage>>;
}
