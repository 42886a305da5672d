// Validates the bearer token and injects AuthenticatedUser into request extensions

use axum::{
    body::Body,
    extract::{FromRequestParts, State},
    http::{header, request::Parts, Request},
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::{app::AppState, middleware::auth::AuthenticatedUser, utils::service_error::ServiceError};

fn bearer_token(request: &Request<Body>) -> Option<&str> {
    request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

pub async fn auth_middleware(
    State(app_state): State<AppState>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let Some(token) = bearer_token(&request) else {
        return ServiceError::Unauthorized.into_response();
    };

    let claims = match app_state.jwt_service.validate_access_token(token) {
        Ok(claims) => claims,
        Err(e) => {
            tracing::warn!("JWT validation failed: {}", e);
            return ServiceError::Unauthorized.into_response();
        },
    };

    let Ok(user_id) = claims.sub.parse::<i32>() else {
        tracing::warn!("JWT subject '{}' is not a user id", claims.sub);
        return ServiceError::Unauthorized.into_response();
    };

    request.extensions_mut().insert(AuthenticatedUser {
        user_id,
        token_id: claims.jti,
        email: claims.email,
        role: claims.role,
        exp: claims.exp,
    });

    next.run(request).await
}

/// Lets handlers take `AuthenticatedUser` directly
impl FromRequestParts<AppState> for AuthenticatedUser {
    type Rejection = ServiceError;

    async fn from_request_parts(
        parts: &mut Parts,
        _state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthenticatedUser>()
            .cloned()
            .ok_or(ServiceError::Unauthorized)
    }
}
