//! Message history REST endpoints

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tracing::debug;
use utoipa::{IntoParams, ToSchema};

use parlor_chats::ChatMessage;

use crate::error::GatewayResult;
use crate::middleware::Authenticated;
use crate::state::GatewayState;

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct MessageResponse {
    pub id: String,
    pub room_id: String,
    pub sender_id: String,
    pub content: String,
    pub created_at: String,
}

impl From<ChatMessage> for MessageResponse {
    fn from(message: ChatMessage) -> Self {
        Self {
            id: message.id,
            room_id: message.room_id,
            sender_id: message.sender_id,
            content: message.content,
            created_at: message.created_at.to_rfc3339(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct MessageHistoryResponse {
    pub room_id: String,
    pub messages: Vec<MessageResponse>,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ListMessagesQuery {
    /// Page size; clamped to the configured maximum
    pub limit: Option<u32>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

/// Create message routes
pub fn create_message_routes() -> Router<Arc<GatewayState>> {
    Router::new().route("/v1/rooms/:room_id/messages", get(list_messages))
}

#[utoipa::path(
    get,
    path = "/v1/rooms/{room_id}/messages",
    tag = "Messages",
    params(
        ("room_id" = String, Path, description = "Room identifier"),
        ListMessagesQuery
    ),
    responses(
        (status = 200, description = "Most recent messages, oldest first", body = MessageHistoryResponse),
        (status = 401, description = "Missing or invalid bearer token", body = ErrorResponse),
        (status = 500, description = "Message store failure", body = ErrorResponse)
    ),
    security(("bearerAuth" = []))
)]
pub async fn list_messages(
    State(state): State<Arc<GatewayState>>,
    Authenticated(identity): Authenticated,
    Path(room_id): Path<String>,
    Query(query): Query<ListMessagesQuery>,
) -> GatewayResult<Json<MessageHistoryResponse>> {
    let limit = state.history.clamp(query.limit);
    debug!(room_id = %room_id, sender_id = %identity, limit, "listing room history");

    let messages = state.store().list_by_room(&room_id, limit).await?;

    Ok(Json(MessageHistoryResponse {
        room_id,
        messages: messages.into_iter().map(MessageResponse::from).collect(),
    }))
}
