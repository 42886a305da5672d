// Pool of async Postgres connections shared by every service

use bb8::Pool;
use diesel_async::pooled_connection::AsyncDieselConnectionManager;
use diesel_async::{AsyncPgConnection, RunQueryDsl};
use diesel_migrations::{embed_migrations, EmbeddedMigrations};
use std::time::Duration;
use thiserror::Error;

pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations/diesel");

pub type DieselPool = Pool<AsyncDieselConnectionManager<AsyncPgConnection>>;

#[derive(Error, Debug)]
pub enum PoolError {
    #[error("Failed to build pool: {0}")]
    Build(#[from] diesel_async::pooled_connection::PoolError),

    #[error("Failed to check out connection: {0}")]
    Checkout(#[from] bb8::RunError<diesel_async::pooled_connection::PoolError>),

    #[error("Health query failed: {0}")]
    Query(#[from] diesel::result::Error),
}

#[derive(Debug, Clone)]
pub struct DieselDatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub connection_timeout: Duration,
    pub idle_timeout: Duration,
    pub max_lifetime: Duration,
    pub test_on_checkout: bool,
}

impl DieselDatabaseConfig {
    pub fn from_settings(settings: &crate::app_config::DatabaseConfig) -> Self {
        Self {
            url: settings.url.clone(),
            max_connections: settings.max_connections,
            min_connections: settings.min_connections,
            connection_timeout: Duration::from_secs(settings.connect_timeout),
            idle_timeout: Duration::from_secs(settings.idle_timeout),
            max_lifetime: Duration::from_secs(settings.max_lifetime),
            test_on_checkout: true,
        }
    }
}

impl Default for DieselDatabaseConfig {
    fn default() -> Self {
        Self::from_settings(&crate::app_config::config().database)
    }
}

pub async fn create_diesel_pool(config: DieselDatabaseConfig) -> Result<DieselPool, PoolError> {
    let manager = AsyncDieselConnectionManager::<AsyncPgConnection>::new(config.url.clone());

    let pool = Pool::builder()
        .max_size(config.max_connections)
        .min_idle(Some(config.min_connections))
        .connection_timeout(config.connection_timeout)
        .idle_timeout(Some(config.idle_timeout))
        .max_lifetime(Some(config.max_lifetime))
        .test_on_check_out(config.test_on_checkout)
        .build(manager)
        .await?;

    // Fail at startup rather than on the first request
    drop(pool.get().await?);

    tracing::info!(
        "Postgres pool ready at {} ({} max connections)",
        mask_connection_string(&config.url),
        config.max_connections
    );

    Ok(pool)
}

/// Round-trip a `SELECT 1` through the pool
pub async fn check_diesel_health(pool: &DieselPool) -> Result<(), PoolError> {
    let mut conn = pool.get().await?;
    diesel::sql_query("SELECT 1").execute(&mut conn).await?;
    Ok(())
}

/// Hide credentials before a URL reaches the logs
pub fn mask_connection_string(url: &str) -> String {
    let Ok(parsed) = url::Url::parse(url) else {
        return "postgresql://***:***@***".to_string();
    };

    let scheme = match parsed.scheme() {
        "postgres" => "postgresql",
        other => other,
    };
    let host = parsed.host_str().unwrap_or("***");
    let port = parsed.port().map(|p| format!(":{}", p)).unwrap_or_default();

    if parsed.username().is_empty() && parsed.password().is_none() {
        format!("{}://{}{}{}", scheme, host, port, parsed.path())
    } else {
        format!("{}://***:***@{}{}{}", scheme, host, port, parsed.path())
    }
}
