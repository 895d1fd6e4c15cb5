//! REST API endpoints for the gateway

pub mod health;
pub mod message;
pub mod room;

use std::sync::Arc;

use axum::{routing::get, Router};

use crate::state::GatewayState;

/// Create all REST API routes
pub fn create_rest_routes() -> Router<Arc<GatewayState>> {
    Router::new()
        .route("/health", get(health::health_check))
        .merge(room::create_room_routes())
        .merge(message::create_message_routes())
}

pub use health::*;
pub use message::*;
pub use room::*;
