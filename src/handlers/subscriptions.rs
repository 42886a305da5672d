use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use chrono::Utc;

use super::ApiResponse;
use crate::{
    app::AppState, middleware::AuthenticatedUser, models::CreateSubscriptionRequest,
    utils::ServiceError,
};

/// POST /v1/subscriptions
pub async fn create_subscription(
    State(state): State<AppState>,
    auth_user: AuthenticatedUser,
    Json(request): Json<CreateSubscriptionRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    auth_user.require_advertiser()?;

    let purchase = state
        .subscription_service
        .purchase(auth_user.user_id, request)
        .await?;

    Ok((
        StatusCode::CREATED,
        ApiResponse::ok(purchase, "Subscription created"),
    ))
}

/// GET /v1/subscriptions
pub async fn list_subscriptions(
    State(state): State<AppState>,
    auth_user: AuthenticatedUser,
) -> Result<impl IntoResponse, ServiceError> {
    let today = Utc::now().date_naive();
    let subscriptions = state
        .subscription_service
        .list_for_advertiser(auth_user.user_id, today)
        .await?;
    Ok(ApiResponse::ok(subscriptions, "Subscriptions retrieved"))
}
