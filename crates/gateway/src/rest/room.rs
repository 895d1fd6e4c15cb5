//! Live room REST endpoints

use std::sync::Arc;

use axum::{extract::State, routing::get, Json, Router};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::middleware::Authenticated;
use crate::state::GatewayState;

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct RoomSummary {
    pub room_id: String,
    pub members: usize,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct RoomListResponse {
    pub rooms: Vec<RoomSummary>,
}

/// Create room routes
pub fn create_room_routes() -> Router<Arc<GatewayState>> {
    Router::new().route("/v1/rooms", get(list_rooms))
}

#[utoipa::path(
    get,
    path = "/v1/rooms",
    tag = "Rooms",
    responses(
        (status = 200, description = "Rooms with at least one live connection", body = RoomListResponse),
        (status = 401, description = "Missing or invalid bearer token")
    ),
    security(("bearerAuth" = []))
)]
pub async fn list_rooms(
    State(state): State<Arc<GatewayState>>,
    Authenticated(_identity): Authenticated,
) -> Json<RoomListResponse> {
    let registry = state.registry();
    let mut rooms = Vec::new();
    for room_id in registry.rooms().await {
        let members = registry.members(&room_id).await.len();
        if members > 0 {
            rooms.push(RoomSummary { room_id, members });
        }
    }

    Json(RoomListResponse { rooms })
}
