use std::sync::Arc;

use anyhow::{Context, Result};
use sqlx::SqlitePool;
use tracing::{info, warn};

use parlor_auth::JwtManager;
use parlor_chats::{MessageStore, RoomRegistry, StreamHandler};
use parlor_config::AppConfig;
use parlor_database::{initialize_database, SqliteMessageStore};
use parlor_orchestrator::{bootstrap_completion, TextCompletion};

pub mod telemetry {
    use anyhow::Result;
    use tracing_subscriber::{fmt::SubscriberBuilder, EnvFilter};

    pub fn init_tracing() -> Result<()> {
        let env_filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

        let subscriber = SubscriberBuilder::default()
            .with_env_filter(env_filter)
            .finish();

        tracing::subscriber::set_global_default(subscriber)
            .map_err(|error| anyhow::anyhow!("failed to set tracing subscriber: {error}"))
    }
}

/// Long-lived collaborators of the relay, built once at startup.
#[derive(Clone)]
pub struct BackendServices {
    pub db_pool: SqlitePool,
    pub store: Arc<dyn MessageStore>,
    pub completion: Option<Arc<dyn TextCompletion>>,
    pub jwt: JwtManager,
    pub assistant_sender_id: String,
}

impl BackendServices {
    pub async fn initialise(config: &AppConfig) -> Result<Self> {
        let db_pool = initialize_database(&config.database)
            .await
            .context("failed to initialise message database")?;

        let completion =
            bootstrap_completion(config).context("failed to bootstrap completion client")?;

        if config.auth.uses_development_secret() {
            warn!("using the development JWT secret; set PARLOR__AUTH__JWT_SECRET in production");
        }

        info!(
            assistant = completion.as_ref().map(|c| c.name()),
            sender_id = %config.assistant.sender_id,
            "relay services ready"
        );

        Ok(Self {
            store: Arc::new(SqliteMessageStore::new(db_pool.clone())),
            db_pool,
            completion,
            jwt: JwtManager::from_config(&config.auth),
            assistant_sender_id: config.assistant.sender_id.clone(),
        })
    }

    /// Build the session handler over a fresh room registry.
    pub fn stream_handler(&self) -> StreamHandler {
        let handler = StreamHandler::new(RoomRegistry::new(), Arc::clone(&self.store));
        match &self.completion {
            Some(completion) => {
                handler.with_assistant(Arc::clone(completion), self.assistant_sender_id.clone())
            }
            None => handler,
        }
    }
}

pub async fn shutdown_signal() {
    if let Err(error) = tokio::signal::ctrl_c().await {
        tracing::warn!(?error, "failed to listen for shutdown signal");
    }
    info!("shutdown signal received");
}
