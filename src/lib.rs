// Library exports for the XK Media backend. The binary and the integration
// tests both build the router through `build_router`.

pub mod app;
pub mod app_config;
pub mod db;
pub mod handlers;
pub mod middleware;
pub mod migrations;
pub mod models;
pub mod schema;
pub mod services;
pub mod utils;

use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    middleware::from_fn_with_state,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use tower_http::trace::TraceLayer;
use tracing::info;

pub use app::AppState;
pub use app_config::{AppConfig, CONFIG};
pub use db::DieselPool;
pub use middleware::{auth_middleware, AuthenticatedUser};
pub use utils::ServiceError;

use services::{
    JwtService, NotificationService, OAuthStateService, PaymentGateway, PaymentService,
    PayoutService, SubscriptionService, YookassaGateway,
};

/// Wire every service around an existing pool and gateway
pub fn build_app_state(
    config: &AppConfig,
    diesel_pool: DieselPool,
    gateway: Arc<dyn PaymentGateway>,
    notifications: NotificationService,
) -> AppState {
    let payment_service = PaymentService::new(
        diesel_pool.clone(),
        gateway,
        notifications.clone(),
        config.gateway.return_url.clone(),
        config.legacy_gateway.secret_word.clone(),
    );
    let subscription_service = SubscriptionService::new(
        diesel_pool.clone(),
        notifications.clone(),
        config.marketplace.default_revenue_share.clone(),
    );
    let payout_service = PayoutService::new(diesel_pool.clone(), notifications.clone());
    let oauth_state_service =
        OAuthStateService::new(diesel_pool.clone(), config.oauth.state_ttl_seconds);

    AppState {
        config: Arc::new(config.clone()),
        diesel_pool,
        jwt_service: Arc::new(JwtService::from_env()),
        payment_service: Arc::new(payment_service),
        subscription_service: Arc::new(subscription_service),
        payout_service: Arc::new(payout_service),
        oauth_state_service: Arc::new(oauth_state_service),
        notifications,
    }
}

/// Pool, real gateway and notification channels from the loaded config
pub async fn initialize_app_state() -> anyhow::Result<AppState> {
    let config = app_config::config();

    info!("Initializing database pool...");
    let diesel_pool = db::create_diesel_pool(db::DieselDatabaseConfig::default()).await?;

    if !config.gateway.is_configured() {
        tracing::warn!("YooKassa credentials missing; new payments will await manual confirmation");
    }
    let gateway: Arc<dyn PaymentGateway> = Arc::new(YookassaGateway::new(config.gateway.clone())?);
    let notifications = NotificationService::new(&config.notifications, &config.features);

    Ok(build_app_state(config, diesel_pool, gateway, notifications))
}

pub fn build_router(state: AppState) -> Router {
    let protected = handlers::protected_routes()
        .route_layer(from_fn_with_state(state.clone(), auth_middleware));

    let v1 = handlers::public_routes().merge(protected);

    let mut router = Router::new()
        .route("/health", get(health_check))
        .nest("/v1", v1)
        .layer(middleware::cors_layer(&state.config));

    if state.config.features.enable_request_tracing {
        router = router.layer(TraceLayer::new_for_http());
    }

    router.with_state(state)
}

/// GET /health
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let timestamp = chrono::Utc::now().to_rfc3339();

    let (database_healthy, database) = match db::check_diesel_health(&state.diesel_pool).await {
        Ok(()) => (
            true,
            serde_json::json!({
                "status": "healthy",
                "max_connections": state.config.database.max_connections,
                "error": null
            }),
        ),
        Err(e) => (
            false,
            serde_json::json!({
                "status": "unhealthy",
                "error": e.to_string()
            }),
        ),
    };

    let migrations = match migrations::check_migration_status(&state.config.database.url).await {
        Ok(status) => serde_json::json!({
            "status": if status.is_up_to_date() { "up_to_date" } else { "pending" },
            "applied": status.applied.len(),
            "pending": status.pending,
        }),
        Err(e) => serde_json::json!({
            "status": "unknown",
            "error": e.to_string()
        }),
    };

    let response = serde_json::json!({
        "status": if database_healthy { "healthy" } else { "degraded" },
        "service": "xk-media-backend",
        "timestamp": timestamp,
        "components": {
            "postgresql": database,
            "migrations": migrations,
        }
    });

    if database_healthy {
        (StatusCode::OK, Json(response))
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, Json(response))
    }
}
