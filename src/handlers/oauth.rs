// OAuth handshake state. The provider code exchange happens elsewhere; these
// endpoints only issue and redeem the single-use state token.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};

use super::ApiResponse;
use crate::{app::AppState, models::Role, utils::ServiceError};

const SUPPORTED_PROVIDERS: &[&str] = &["yandex", "vk", "google"];

#[derive(Debug, Deserialize)]
pub struct IssueStateRequest {
    pub role: Role,
}

#[derive(Debug, Serialize)]
pub struct IssuedState {
    pub state: String,
    pub expires_in: u64,
}

#[derive(Debug, Deserialize)]
pub struct CallbackParams {
    pub state: Option<String>,
}

fn check_provider(provider: &str) -> Result<(), ServiceError> {
    if SUPPORTED_PROVIDERS.contains(&provider) {
        Ok(())
    } else {
        Err(ServiceError::NotFound)
    }
}

/// POST /v1/oauth/{provider}/state
pub async fn issue_state(
    State(state): State<AppState>,
    Path(provider): Path<String>,
    Json(request): Json<IssueStateRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    check_provider(&provider)?;
    let token = state
        .oauth_state_service
        .issue(&provider, request.role)
        .await?;

    Ok((
        StatusCode::CREATED,
        ApiResponse::ok(
            IssuedState {
                state: token,
                expires_in: state.config.oauth.state_ttl_seconds,
            },
            "State issued",
        ),
    ))
}

/// GET /v1/oauth/{provider}/callback?state=
pub async fn callback(
    State(state): State<AppState>,
    Path(provider): Path<String>,
    Query(params): Query<CallbackParams>,
) -> Result<impl IntoResponse, ServiceError> {
    check_provider(&provider)?;
    let token = params
        .state
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ServiceError::ValidationError("Missing state".to_string()))?;

    let pending = state
        .oauth_state_service
        .consume(&provider, &token)
        .await?
        .ok_or_else(|| ServiceError::ValidationError("Invalid or expired state".to_string()))?;

    Ok(ApiResponse::ok(pending, "State accepted"))
}
