// Payment gateway adapter: hosted payment pages plus status queries

pub mod mock;
pub mod yookassa;

use async_trait::async_trait;
use bigdecimal::BigDecimal;
use thiserror::Error;

pub use mock::MockGateway;
pub use yookassa::YookassaGateway;

#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("Payment gateway is not configured")]
    NotConfigured,

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Gateway rejected request: status={status} body={body}")]
    Api { status: u16, body: String },

    #[error("Invalid gateway response: {0}")]
    InvalidResponse(String),
}

/// What the adapter needs to open a hosted payment page
#[derive(Debug, Clone)]
pub struct GatewayPaymentRequest {
    pub amount: BigDecimal,
    /// Internal payment id; used as the idempotency key and echoed back in
    /// webhook metadata as `order_id`
    pub order_id: String,
    pub description: String,
    pub return_url: String,
    pub client_email: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CreatedPayment {
    pub payment_id: String,
    pub confirmation_url: String,
    pub status: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PaymentStatusInfo {
    pub status: String,
    pub paid: bool,
    pub amount: Option<BigDecimal>,
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn create_payment(
        &self,
        request: GatewayPaymentRequest,
    ) -> Result<CreatedPayment, GatewayError>;

    async fn get_payment_status(&self, payment_id: &str)
        -> Result<PaymentStatusInfo, GatewayError>;

    async fn cancel_payment(&self, payment_id: &str) -> Result<String, GatewayError>;
}

/// Gateway-side status that means the money has been captured
pub const GATEWAY_STATUS_SUCCEEDED: &str = "succeeded";
