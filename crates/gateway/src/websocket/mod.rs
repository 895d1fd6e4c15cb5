//! WebSocket endpoints for the gateway

pub mod room;

use std::sync::Arc;

use axum::{routing::get, Router};

use crate::state::GatewayState;

/// Create all WebSocket routes
pub fn create_websocket_routes() -> Router<Arc<GatewayState>> {
    Router::new().route("/v1/ws/:room_id", get(room::room_websocket_handler))
}

pub use room::room_websocket_handler;
