//! # Parlor Gateway Crate
//!
//! HTTP and WebSocket surface of the relay. Routes authenticate callers
//! from bearer tokens and hand WebSocket sessions to the chats crate's
//! stream handler.
//!
//! ## Architecture
//!
//! - **REST**: health, live rooms, and room history with OpenAPI documentation
//! - **WebSocket**: `GET /v1/ws/:room_id`, one relay session per socket
//! - **State**: the shared stream handler, token verifier, and history bounds
//! - **Middleware**: identity extraction and request logging
//!
//! ## Usage
//!
//! ```rust,ignore
//! use parlor_gateway::{create_router, GatewayState};
//!
//! let app = create_router(GatewayState::new(handler, jwt, history));
//! let listener = tokio::net::TcpListener::bind("127.0.0.1:8080").await?;
//! axum::serve(listener, app).await?;
//! ```

pub mod error;
pub mod middleware;
pub mod rest;
pub mod state;
pub mod websocket;

pub use error::{GatewayError, GatewayResult};
pub use middleware::{extract_token, Authenticated};
pub use state::GatewayState;

use std::sync::Arc;

use axum::{
    http::{header, Method},
    middleware as axum_middleware, Router,
};
use tower_http::cors::{Any, CorsLayer};
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

#[derive(OpenApi)]
#[openapi(
    paths(
        rest::health::health_check,
        rest::room::list_rooms,
        rest::message::list_messages,
    ),
    components(
        schemas(
            rest::health::HealthResponse,
            rest::room::RoomSummary,
            rest::room::RoomListResponse,
            rest::message::MessageResponse,
            rest::message::MessageHistoryResponse,
            rest::message::ErrorResponse,
        )
    ),
    modifiers(&BearerAuth),
    tags(
        (name = "Health", description = "Service health"),
        (name = "Rooms", description = "Live rooms"),
        (name = "Messages", description = "Room history"),
    )
)]
pub struct ApiDoc;

struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearerAuth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

/// Create the main application router with all routes
pub fn create_router(state: GatewayState) -> Router {
    let state = Arc::new(state);
    #[allow(unused_mut)]
    let mut router = Router::new()
        .merge(rest::create_rest_routes())
        .merge(websocket::create_websocket_routes())
        .with_state(state)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods([Method::GET, Method::OPTIONS])
                .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]),
        )
        .layer(axum_middleware::from_fn(middleware::logging_middleware));

    // Add Swagger UI if in debug mode
    #[cfg(debug_assertions)]
    {
        use utoipa_swagger_ui::SwaggerUi;
        router = router
            .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()));
    }

    router
}
