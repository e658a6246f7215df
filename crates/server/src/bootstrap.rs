use atelier_core::config::{AppConfig, ConfigError};
use atelier_db::{
    connect_with_config, email_dispatcher_from_config, migrations, storage_lister_from_config,
    DbPool, StorageError,
};
use thiserror::Error;
use tracing::info;

use crate::state::AppState;

pub struct Application {
    pub config: AppConfig,
    pub db_pool: DbPool,
    pub state: AppState,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("database connection failed: {0}")]
    DatabaseConnect(#[source] sqlx::Error),
    #[error("database migration failed: {0}")]
    Migration(#[source] sqlx::migrate::MigrateError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        "starting application bootstrap"
    );
    let db_pool =
        connect_with_config(&config.database).await.map_err(BootstrapError::DatabaseConnect)?;
    info!(
        event_name = "system.bootstrap.database_connected",
        correlation_id = "bootstrap",
        "database connection established"
    );

    migrations::run_pending(&db_pool).await.map_err(BootstrapError::Migration)?;
    info!(
        event_name = "system.bootstrap.migrations_applied",
        correlation_id = "bootstrap",
        "database migrations applied"
    );

    let storage = storage_lister_from_config(&config.storage)?;
    let mailer = email_dispatcher_from_config(&config.email);
    info!(
        event_name = "system.bootstrap.services_ready",
        correlation_id = "bootstrap",
        storage_provider = ?config.storage.provider,
        variant_bucket = %config.storage.variant_bucket,
        email_enabled = config.email.enabled,
        "customization services wired"
    );

    let state = AppState::new(db_pool.clone(), &config, storage, mailer);
    Ok(Application { config, db_pool, state })
}
