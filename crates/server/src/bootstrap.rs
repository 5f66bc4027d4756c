use std::sync::Arc;

use clientele_core::config::{AppConfig, ConfigError, LoadOptions};
use clientele_core::domain::user::ProfileId;
use clientele_core::identity::{IdentityClient, IdentityError};
use clientele_db::{
    connect, migrations, DbPool, SqlAddressRepository, SqlCustomerRepository,
};
use thiserror::Error;
use tracing::info;

use crate::identity::HttpIdentityClient;
use crate::service::CustomerService;

pub struct Application {
    pub config: AppConfig,
    pub db_pool: DbPool,
    pub identity: Arc<dyn IdentityClient>,
    pub service: CustomerService,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("database connection failed: {0}")]
    DatabaseConnect(#[source] sqlx::Error),
    #[error("database migration failed: {0}")]
    Migration(#[source] sqlx::migrate::MigrateError),
    #[error("identity client could not be built: {0}")]
    Identity(#[source] IdentityError),
}

pub async fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
    let config = AppConfig::load(options)?;
    bootstrap_with_config(config).await
}

pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        "starting application bootstrap"
    );

    let db_pool = connect(&config.database).await.map_err(BootstrapError::DatabaseConnect)?;
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

    let identity: Arc<dyn IdentityClient> = Arc::new(
        HttpIdentityClient::from_config(&config.identity).map_err(BootstrapError::Identity)?,
    );
    info!(
        event_name = "system.bootstrap.identity_client_ready",
        correlation_id = "bootstrap",
        base_url = %config.identity.base_url,
        timeout_secs = config.identity.timeout_secs,
        "identity client configured"
    );

    let service = CustomerService::new(
        Arc::new(SqlCustomerRepository::new(db_pool.clone())),
        Arc::new(SqlAddressRepository::new(db_pool.clone())),
        Arc::clone(&identity),
        ProfileId(config.identity.default_profile_id),
    );

    Ok(Application { config, db_pool, identity, service })
}
