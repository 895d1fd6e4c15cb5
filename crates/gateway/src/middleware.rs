//! Request identity extraction and request logging

use std::sync::Arc;

use axum::{
    async_trait,
    extract::{FromRequestParts, Query, Request},
    http::{header, request::Parts, HeaderMap, Uri},
    middleware::Next,
    response::Response,
};
use serde::Deserialize;

use parlor_chats::Identity;

use crate::error::GatewayError;
use crate::state::GatewayState;

#[derive(Debug, Deserialize)]
struct TokenQuery {
    token: Option<String>,
}

/// Find the bearer token for a request.
///
/// The `Authorization` header wins; the `token` query parameter covers
/// browser WebSocket clients, which cannot set headers on the upgrade.
pub fn extract_token(headers: &HeaderMap, uri: &Uri) -> Option<String> {
    let from_header = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(str::to_string);

    from_header.or_else(|| {
        Query::<TokenQuery>::try_from_uri(uri)
            .ok()
            .and_then(|Query(query)| query.token)
            .filter(|token| !token.is_empty())
    })
}

/// Identity of the caller; rejects with 401 when absent.
pub struct Authenticated(pub Identity);

#[async_trait]
impl FromRequestParts<Arc<GatewayState>> for Authenticated {
    type Rejection = GatewayError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<GatewayState>,
    ) -> Result<Self, Self::Rejection> {
        let token = extract_token(&parts.headers, &parts.uri).ok_or_else(|| {
            GatewayError::AuthenticationFailed("Missing authentication token".to_string())
        })?;

        state
            .identify(Some(&token))
            .map(Authenticated)
            .ok_or_else(|| GatewayError::AuthenticationFailed("Invalid token".to_string()))
    }
}

/// Logging middleware for request/response logging
pub async fn logging_middleware(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();

    let start = std::time::Instant::now();
    let response = next.run(request).await;
    let duration = start.elapsed();

    tracing::info!(
        method = %method,
        uri = %path,
        status = %response.status(),
        duration_ms = duration.as_millis(),
        "Request completed"
    );

    response
}
