// HTTP handlers and the route builders composed under /v1

pub mod admin;
pub mod auth;
pub mod oauth;
pub mod payments;
pub mod screens;
pub mod subscriptions;
pub mod venue;
pub mod webhooks;

use axum::{
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;

use crate::app::AppState;

/// Envelope of every successful JSON response
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub message: String,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(data: T, message: impl Into<String>) -> Json<Self> {
        Json(Self {
            success: true,
            data: Some(data),
            message: message.into(),
        })
    }
}

/// Reachable without a token
pub fn public_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .route("/oauth/{provider}/state", post(oauth::issue_state))
        .route("/oauth/{provider}/callback", get(oauth::callback))
        .route("/payments/yookassa/webhook", post(webhooks::yookassa_webhook))
        .route("/payments/paykeeper/notify", post(webhooks::paykeeper_notify))
        .route("/screens/{identifier}", get(screens::feed))
}

/// Everything behind `auth_middleware`
pub fn protected_routes() -> Router<AppState> {
    Router::new()
        .route("/account/me", get(auth::me))
        .route("/account/role", post(auth::switch_role))
        .route(
            "/payments",
            post(payments::create_payment).get(payments::list_payments),
        )
        .route("/payments/{id}", get(payments::get_payment))
        .route(
            "/subscriptions",
            post(subscriptions::create_subscription).get(subscriptions::list_subscriptions),
        )
        .route("/venue/earnings", get(venue::earnings))
        .nest("/admin", admin_routes())
}

fn admin_routes() -> Router<AppState> {
    Router::new()
        .route("/payments", get(admin::list_payments))
        .route("/payments/stats", get(admin::payment_stats))
        .route("/payments/{id}/confirm", post(admin::confirm_payment))
        .route("/payments/{id}/cancel", post(admin::cancel_payment))
        .route("/payments/{id}/sync", post(admin::sync_payment))
        .route("/users/{id}/balance", post(admin::top_up_balance))
        .route(
            "/payouts",
            get(admin::list_payouts).post(admin::create_payout),
        )
        .route("/payouts/{id}/status", post(admin::update_payout_status))
}
