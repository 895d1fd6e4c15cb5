//! Shared application state for the gateway

use std::sync::Arc;

use tracing::debug;

use parlor_auth::JwtManager;
use parlor_chats::{Identity, MessageStore, RoomRegistry, StreamHandler};
use parlor_config::HistoryConfig;

/// State shared by every route.
#[derive(Clone)]
pub struct GatewayState {
    /// Session loop shared by all WebSocket connections
    pub handler: StreamHandler,
    /// Bearer token verification
    pub jwt: Arc<JwtManager>,
    /// History page size bounds
    pub history: HistoryConfig,
}

impl GatewayState {
    pub fn new(handler: StreamHandler, jwt: JwtManager, history: HistoryConfig) -> Self {
        Self {
            handler,
            jwt: Arc::new(jwt),
            history,
        }
    }

    pub fn registry(&self) -> &RoomRegistry {
        self.handler.registry()
    }

    pub fn store(&self) -> &Arc<dyn MessageStore> {
        self.handler.store()
    }

    /// Resolve a bearer token to a verified identity.
    pub fn identify(&self, token: Option<&str>) -> Option<Identity> {
        let token = token?;
        match self.jwt.subject(token) {
            Ok(subject) => Identity::new(subject),
            Err(err) => {
                debug!(error = %err, "bearer token rejected");
                None
            }
        }
    }
}
