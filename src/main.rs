use anyhow::Context;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use xk_media_backend::{
    app_config, build_router, db::mask_connection_string, initialize_app_state, migrations,
    services::spawn_purge_task,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();

    let config = app_config::config();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.rust_log.clone().into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!(
        "Starting XK Media backend ({}) on {}",
        config.environment, config.server.bind_address
    );
    info!("Database: {}", mask_connection_string(&config.database.url));

    migrations::run_startup_migrations(&config.database.url, config.disable_embedded_migrations)
        .await
        .map_err(|e| anyhow::anyhow!("Migration failed: {}", e))?;

    let state = initialize_app_state().await?;

    spawn_purge_task(
        (*state.oauth_state_service).clone(),
        config.oauth.purge_interval_seconds,
    );

    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&config.server.bind_address)
        .await
        .with_context(|| format!("Failed to bind {}", config.server.bind_address))?;
    info!("Listening on {}", config.server.bind_address);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
    }
    info!("Shutdown signal received");
}
