use axum::{extract::State, response::IntoResponse};
use serde::Serialize;

use super::ApiResponse;
use crate::{
    app::AppState,
    middleware::AuthenticatedUser,
    models::VenuePayout,
    services::VenueEarnings,
    utils::ServiceError,
};

#[derive(Debug, Serialize)]
pub struct VenueEarningsResponse {
    pub summary: VenueEarnings,
    pub payouts: Vec<VenuePayout>,
}

/// GET /v1/venue/earnings
pub async fn earnings(
    State(state): State<AppState>,
    auth_user: AuthenticatedUser,
) -> Result<impl IntoResponse, ServiceError> {
    auth_user.require_venue()?;

    let summary = state
        .payout_service
        .earnings_for_venue(auth_user.user_id)
        .await?;
    let payouts = state
        .payout_service
        .list_for_venue(auth_user.user_id)
        .await?;

    Ok(ApiResponse::ok(
        VenueEarningsResponse { summary, payouts },
        "Earnings retrieved",
    ))
}
