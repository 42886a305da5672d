use axum::http::{header, HeaderValue, Method};
use std::time::Duration;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tracing::debug;

use crate::app_config::AppConfig;

/// CORS from `CORS_ALLOWED_ORIGINS`. A `*` entry reflects any origin outside
/// production; in production only listed origins are allowed.
pub fn cors_layer(config: &AppConfig) -> CorsLayer {
    let origins = &config.server.cors_allowed_origins;
    let has_wildcard = origins.iter().any(|o| o == "*");

    let allow_origin = if has_wildcard && !config.is_production() {
        debug!("CORS: reflecting any origin");
        AllowOrigin::mirror_request()
    } else {
        let listed: Vec<HeaderValue> = origins
            .iter()
            .filter(|o| o.as_str() != "*")
            .filter_map(|o| HeaderValue::from_str(o).ok())
            .collect();
        debug!("CORS: {} whitelisted origins", listed.len());
        AllowOrigin::list(listed)
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_credentials(true)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            header::ACCEPT,
            header::ORIGIN,
        ])
        .max_age(Duration::from_secs(3600))
}
