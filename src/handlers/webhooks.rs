// Gateway callbacks. Both are unauthenticated; trust comes from the payload
// being checked against our own records or the shared secret.

use axum::{
    body::Bytes,
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Form, Json,
};
use serde_json::json;

use crate::{app::AppState, models::LegacyNotification, utils::ServiceError};

/// POST /v1/payments/yookassa/webhook
///
/// The raw body is parsed by the service so malformed JSON is a 400 with
/// our error body rather than axum's rejection.
pub async fn yookassa_webhook(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<impl IntoResponse, ServiceError> {
    let ack = state.payment_service.handle_webhook(&body).await?;

    let body = match ack.message() {
        Some(message) => json!({ "status": "ok", "message": message }),
        None => json!({ "status": "ok" }),
    };
    Ok((StatusCode::OK, Json(body)))
}

/// POST /v1/payments/paykeeper/notify
pub async fn paykeeper_notify(
    State(state): State<AppState>,
    Form(form): Form<LegacyNotification>,
) -> Response {
    match state.payment_service.handle_legacy_notify(form).await {
        Ok(ack) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
            ack.body(),
        )
            .into_response(),
        Err(e) => {
            tracing::error!("Legacy notification failed: {}", e);
            (
                e.status_code(),
                [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
                "Error! Internal error!".to_string(),
            )
                .into_response()
        },
    }
}
