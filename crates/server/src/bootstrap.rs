use std::sync::Arc;

use thiserror::Error;
use tracing::info;

use nickbook_core::config::{AppConfig, ConfigError, LoadOptions};
use nickbook_db::{connect_with_settings, schema, DbPool, NicknameRepository, SqlNicknameRepository};
use nickbook_line::{HttpLineClient, MembershipGuard, WebhookDispatcher};

use crate::{admin::AdminState, webhook::WebhookState};

pub struct Application {
    pub config: AppConfig,
    pub db_pool: DbPool,
    pub webhook: WebhookState,
    pub admin: AdminState,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("database connection failed: {0}")]
    DatabaseConnect(#[source] sqlx::Error),
    #[error("schema creation failed: {0}")]
    Schema(#[source] sqlx::Error),
    #[error("admin templates failed to load: {0}")]
    Templates(#[source] tera::Error),
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

    let db_pool = connect_with_settings(
        &config.database.url,
        config.database.max_connections,
        config.database.timeout_secs,
    )
    .await
    .map_err(BootstrapError::DatabaseConnect)?;
    info!(
        event_name = "system.bootstrap.database_connected",
        correlation_id = "bootstrap",
        "database connection established"
    );

    schema::ensure_schema(&db_pool).await.map_err(BootstrapError::Schema)?;
    info!(
        event_name = "system.bootstrap.schema_ready",
        correlation_id = "bootstrap",
        "nickname schema ready"
    );

    let repository: Arc<dyn NicknameRepository> =
        Arc::new(SqlNicknameRepository::new(db_pool.clone()));
    let dispatcher = WebhookDispatcher::new(
        Arc::new(HttpLineClient::from_config(&config.line)),
        repository.clone(),
        MembershipGuard::from_config(&config.guard),
    );
    info!(
        event_name = "system.bootstrap.guard_configured",
        correlation_id = "bootstrap",
        allowed_group_count = config.guard.allowed_groups.len(),
        welcome_on_join = config.guard.welcome_on_join,
        "membership guard configured"
    );

    let webhook = WebhookState::new(Arc::new(dispatcher), config.line.channel_secret.clone());
    let admin = AdminState::new(repository, &config.admin, &config.export)
        .map_err(BootstrapError::Templates)?;

    Ok(Application { config, db_pool, webhook, admin })
}
