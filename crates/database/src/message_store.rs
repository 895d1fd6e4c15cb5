//! SQLite-backed message store.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use tracing::debug;

use parlor_chats::{ChatError, ChatMessage, ChatResult, MessageStore};

/// Message store over the `messages` table.
#[derive(Clone)]
pub struct SqliteMessageStore {
    pool: SqlitePool,
}

impl SqliteMessageStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

fn storage_error(err: sqlx::Error) -> ChatError {
    ChatError::storage(err.to_string())
}

fn message_from_row(row: &SqliteRow) -> ChatResult<ChatMessage> {
    let created_at: DateTime<Utc> = row.try_get("created_at").map_err(storage_error)?;
    Ok(ChatMessage {
        id: row.try_get("id").map_err(storage_error)?,
        room_id: row.try_get("room_id").map_err(storage_error)?,
        sender_id: row.try_get("sender_id").map_err(storage_error)?,
        content: row.try_get("content").map_err(storage_error)?,
        created_at,
    })
}

#[async_trait]
impl MessageStore for SqliteMessageStore {
    async fn save(&self, message: &ChatMessage) -> ChatResult<()> {
        sqlx::query(
            "INSERT INTO messages (id, room_id, sender_id, content, created_at)
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&message.id)
        .bind(&message.room_id)
        .bind(&message.sender_id)
        .bind(&message.content)
        .bind(message.created_at)
        .execute(&self.pool)
        .await
        .map_err(storage_error)?;

        debug!(room_id = %message.room_id, message_id = %message.id, "message stored");
        Ok(())
    }

    async fn list_by_room(&self, room_id: &str, limit: u32) -> ChatResult<Vec<ChatMessage>> {
        let rows = sqlx::query(
            "SELECT id, room_id, sender_id, content, created_at FROM (
                 SELECT rowid AS seq, id, room_id, sender_id, content, created_at
                 FROM messages WHERE room_id = ?
                 ORDER BY created_at DESC, rowid DESC LIMIT ?
             ) ORDER BY created_at ASC, seq ASC",
        )
        .bind(room_id)
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await
        .map_err(storage_error)?;

        rows.iter().map(message_from_row).collect()
    }
}
