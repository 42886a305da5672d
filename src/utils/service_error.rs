// HTTP-facing error for every JSON endpoint
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::models::{PaymentError, PayoutError, RoleTransitionError, UserError};
use crate::services::gateway::GatewayError;

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("End date must not be before start date")]
    InvalidDates,

    #[error("Insufficient balance")]
    InsufficientFunds,

    #[error("TV not found or inactive")]
    TvUnavailable,

    #[error("Not found")]
    NotFound,

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Payment gateway error: {0}")]
    Gateway(String),

    #[error("Internal server error")]
    InternalError,
}

impl ServiceError {
    /// Machine-readable error kind for clients that branch on it
    fn kind(&self) -> &'static str {
        match self {
            ServiceError::InvalidDates => "dates",
            ServiceError::InsufficientFunds => "balance",
            ServiceError::TvUnavailable => "tv",
            ServiceError::ValidationError(_) => "validation",
            ServiceError::NotFound => "not_found",
            ServiceError::Unauthorized => "unauthorized",
            ServiceError::Forbidden(_) => "forbidden",
            ServiceError::Conflict(_) => "conflict",
            ServiceError::Gateway(_) => "gateway",
            ServiceError::DatabaseError(_) | ServiceError::InternalError => "internal",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            ServiceError::DatabaseError(_) | ServiceError::InternalError => {
                StatusCode::INTERNAL_SERVER_ERROR
            },
            ServiceError::ValidationError(_)
            | ServiceError::InvalidDates
            | ServiceError::InsufficientFunds => StatusCode::BAD_REQUEST,
            ServiceError::TvUnavailable | ServiceError::NotFound => StatusCode::NOT_FOUND,
            ServiceError::Unauthorized => StatusCode::UNAUTHORIZED,
            ServiceError::Forbidden(_) => StatusCode::FORBIDDEN,
            ServiceError::Conflict(_) => StatusCode::CONFLICT,
            ServiceError::Gateway(_) => StatusCode::BAD_GATEWAY,
        }
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let error_message = match &self {
            // Never leak SQL details to clients
            ServiceError::DatabaseError(msg) => {
                tracing::error!("Database error: {}", msg);
                "Internal server error".to_string()
            },
            other => other.to_string(),
        };

        let body = Json(json!({
            "error": error_message,
            "kind": self.kind(),
            "status": status.as_u16()
        }));

        (status, body).into_response()
    }
}

// Conversion from various error types
impl From<diesel::result::Error> for ServiceError {
    fn from(error: diesel::result::Error) -> Self {
        match error {
            diesel::result::Error::NotFound => ServiceError::NotFound,
            _ => ServiceError::DatabaseError(error.to_string()),
        }
    }
}

impl From<validator::ValidationErrors> for ServiceError {
    fn from(error: validator::ValidationErrors) -> Self {
        ServiceError::ValidationError(error.to_string())
    }
}

impl From<bb8::RunError<diesel_async::pooled_connection::PoolError>> for ServiceError {
    fn from(error: bb8::RunError<diesel_async::pooled_connection::PoolError>) -> Self {
        ServiceError::DatabaseError(format!("Database connection failed: {}", error))
    }
}

impl From<UserError> for ServiceError {
    fn from(error: UserError) -> Self {
        match error {
            UserError::NotFound => ServiceError::NotFound,
            UserError::EmailTaken => {
                ServiceError::Conflict("Email already registered".to_string())
            },
            UserError::RoleTransition(e) => e.into(),
            UserError::Database(e) => e.into(),
        }
    }
}

impl From<RoleTransitionError> for ServiceError {
    fn from(error: RoleTransitionError) -> Self {
        ServiceError::Forbidden(error.to_string())
    }
}

impl From<PaymentError> for ServiceError {
    fn from(error: PaymentError) -> Self {
        match error {
            PaymentError::NotFound => ServiceError::NotFound,
            PaymentError::DuplicateOrderId(_) | PaymentError::InvalidTransition { .. } => {
                ServiceError::Conflict(error.to_string())
            },
            PaymentError::UnknownStatus(_) => ServiceError::InternalError,
            PaymentError::Database(e) => e.into(),
        }
    }
}

impl From<PayoutError> for ServiceError {
    fn from(error: PayoutError) -> Self {
        match error {
            PayoutError::NotFound => ServiceError::NotFound,
            PayoutError::InvalidTransition { .. } => ServiceError::Conflict(error.to_string()),
            PayoutError::UnknownStatus(_) => ServiceError::InternalError,
            PayoutError::Database(e) => e.into(),
        }
    }
}

impl From<GatewayError> for ServiceError {
    fn from(error: GatewayError) -> Self {
        ServiceError::Gateway(error.to_string())
    }
}
