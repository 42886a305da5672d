// Advertiser-facing payment endpoints

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};

use super::ApiResponse;
use crate::{
    app::AppState, middleware::AuthenticatedUser, models::CreatePaymentRequest,
    utils::ServiceError,
};

/// POST /v1/payments
pub async fn create_payment(
    State(state): State<AppState>,
    auth_user: AuthenticatedUser,
    Json(request): Json<CreatePaymentRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    auth_user.require_advertiser()?;

    let created = state.payment_service.create(auth_user.user_id, request).await?;
    let message = if created.warning.is_some() {
        "Payment saved; gateway unavailable"
    } else {
        "Payment created"
    };

    Ok((StatusCode::CREATED, ApiResponse::ok(created, message)))
}

/// GET /v1/payments
pub async fn list_payments(
    State(state): State<AppState>,
    auth_user: AuthenticatedUser,
) -> Result<impl IntoResponse, ServiceError> {
    let payments = state.payment_service.list_own(auth_user.user_id).await?;
    Ok(ApiResponse::ok(payments, "Payments retrieved"))
}

/// GET /v1/payments/{id}
pub async fn get_payment(
    State(state): State<AppState>,
    auth_user: AuthenticatedUser,
    Path(payment_id): Path<i32>,
) -> Result<impl IntoResponse, ServiceError> {
    let payment = state
        .payment_service
        .get_own(auth_user.user_id, payment_id)
        .await?;
    Ok(ApiResponse::ok(payment, "Payment retrieved"))
}
