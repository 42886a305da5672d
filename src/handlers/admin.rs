// Admin back office: payment overrides, manual top-ups and venue payouts.
// Every handler starts with the admin guard.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use bigdecimal::BigDecimal;
use serde::Serialize;

use super::ApiResponse;
use crate::{
    app::AppState,
    middleware::AuthenticatedUser,
    models::{
        CreatePayoutRequest, ListPaymentsParams, ManualTopUpRequest, Payment,
        UpdatePayoutStatusRequest, VenuePayout,
    },
    services::VenueEarnings,
    utils::ServiceError,
};

#[derive(Debug, Serialize)]
pub struct TopUpResponse {
    pub payment: Payment,
    pub balance: BigDecimal,
}

#[derive(Debug, Serialize)]
pub struct PayoutsOverview {
    pub payouts: Vec<VenuePayout>,
    pub venues: Vec<VenueEarnings>,
}

/// GET /v1/admin/payments?status=
pub async fn list_payments(
    State(state): State<AppState>,
    auth_user: AuthenticatedUser,
    Query(params): Query<ListPaymentsParams>,
) -> Result<impl IntoResponse, ServiceError> {
    auth_user.require_admin()?;
    let payments = state.payment_service.list(params.status.as_deref()).await?;
    Ok(ApiResponse::ok(payments, "Payments retrieved"))
}

/// GET /v1/admin/payments/stats
pub async fn payment_stats(
    State(state): State<AppState>,
    auth_user: AuthenticatedUser,
) -> Result<impl IntoResponse, ServiceError> {
    auth_user.require_admin()?;
    let stats = state.payment_service.stats().await?;
    Ok(ApiResponse::ok(stats, "Payment stats retrieved"))
}

/// POST /v1/admin/payments/{id}/confirm
pub async fn confirm_payment(
    State(state): State<AppState>,
    auth_user: AuthenticatedUser,
    Path(payment_id): Path<i32>,
) -> Result<impl IntoResponse, ServiceError> {
    auth_user.require_admin()?;
    let payment = state
        .payment_service
        .admin_confirm(auth_user.user_id, payment_id)
        .await?;
    Ok(ApiResponse::ok(payment, "Payment confirmed"))
}

/// POST /v1/admin/payments/{id}/cancel
pub async fn cancel_payment(
    State(state): State<AppState>,
    auth_user: AuthenticatedUser,
    Path(payment_id): Path<i32>,
) -> Result<impl IntoResponse, ServiceError> {
    auth_user.require_admin()?;
    let payment = state
        .payment_service
        .admin_cancel(auth_user.user_id, payment_id)
        .await?;
    Ok(ApiResponse::ok(payment, "Payment canceled"))
}

/// POST /v1/admin/payments/{id}/sync
pub async fn sync_payment(
    State(state): State<AppState>,
    auth_user: AuthenticatedUser,
    Path(payment_id): Path<i32>,
) -> Result<impl IntoResponse, ServiceError> {
    auth_user.require_admin()?;
    let result = state
        .payment_service
        .sync_status(auth_user.user_id, payment_id)
        .await?;
    Ok(ApiResponse::ok(result, "Payment synchronized"))
}

/// POST /v1/admin/users/{id}/balance
pub async fn top_up_balance(
    State(state): State<AppState>,
    auth_user: AuthenticatedUser,
    Path(user_id): Path<i32>,
    Json(request): Json<ManualTopUpRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    auth_user.require_admin()?;
    let (payment, balance) = state
        .payment_service
        .manual_top_up(auth_user.user_id, user_id, request)
        .await?;
    Ok((
        StatusCode::CREATED,
        ApiResponse::ok(TopUpResponse { payment, balance }, "Balance topped up"),
    ))
}

/// GET /v1/admin/payouts
///
/// The per-venue summary is read-only; payouts are only ever created by
/// `create_payout`.
pub async fn list_payouts(
    State(state): State<AppState>,
    auth_user: AuthenticatedUser,
) -> Result<impl IntoResponse, ServiceError> {
    auth_user.require_admin()?;
    let payouts = state.payout_service.list().await?;
    let venues = state.payout_service.earnings_for_all().await?;
    Ok(ApiResponse::ok(
        PayoutsOverview { payouts, venues },
        "Payouts retrieved",
    ))
}

/// POST /v1/admin/payouts
pub async fn create_payout(
    State(state): State<AppState>,
    auth_user: AuthenticatedUser,
    Json(request): Json<CreatePayoutRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    auth_user.require_admin()?;
    let payout = state
        .payout_service
        .create(auth_user.user_id, request)
        .await?;
    Ok((StatusCode::CREATED, ApiResponse::ok(payout, "Payout created")))
}

/// POST /v1/admin/payouts/{id}/status
pub async fn update_payout_status(
    State(state): State<AppState>,
    auth_user: AuthenticatedUser,
    Path(payout_id): Path<i32>,
    Json(request): Json<UpdatePayoutStatusRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    auth_user.require_admin()?;
    let payout = state
        .payout_service
        .advance(auth_user.user_id, payout_id, &request.status)
        .await?;
    Ok(ApiResponse::ok(payout, "Payout status updated"))
}
