//! Parlor Database Crate
//!
//! SQLite connection setup, migrations, and the persistent message store
//! used by the relay.

use sqlx::SqlitePool;
use thiserror::Error;

use parlor_config::DatabaseConfig;

pub mod connection;
pub mod message_store;
pub mod migrations;

pub use connection::prepare_database;
pub use message_store::SqliteMessageStore;
pub use migrations::run_migrations;

#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("Database connection error: {0}")]
    ConnectionError(String),

    #[error("Database migration error: {0}")]
    MigrationError(String),
}

pub type DatabaseResult<T> = Result<T, DatabaseError>;

/// Connect and bring the schema up to date.
pub async fn initialize_database(config: &DatabaseConfig) -> DatabaseResult<SqlitePool> {
    let pool = prepare_database(config)
        .await
        .map_err(|e| DatabaseError::ConnectionError(format!("{e:#}")))?;

    run_migrations(&pool)
        .await
        .map_err(|e| DatabaseError::MigrationError(format!("{e:#}")))?;

    Ok(pool)
}
