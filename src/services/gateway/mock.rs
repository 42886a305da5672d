// In-memory gateway for tests and local development without credentials

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;

use super::{
    GatewayPaymentRequest, CreatedPayment, GatewayError, PaymentGateway, PaymentStatusInfo,
};

/// Records every request; either succeeds with `mock-<order_id>` ids or
/// fails every call when built with [`MockGateway::failing`].
#[derive(Default)]
pub struct MockGateway {
    fail: bool,
    requests: Mutex<Vec<GatewayPaymentRequest>>,
    statuses: Mutex<HashMap<String, String>>,
}

impl MockGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    /// Requests seen so far by `create_payment`
    pub fn requests(&self) -> Vec<GatewayPaymentRequest> {
        self.requests
            .lock()
            .map(|r| r.clone())
            .unwrap_or_default()
    }

    /// Make `get_payment_status` report `status` for this gateway id
    pub fn set_status(&self, payment_id: &str, status: &str) {
        if let Ok(mut statuses) = self.statuses.lock() {
            statuses.insert(payment_id.to_string(), status.to_string());
        }
    }

    fn check(&self) -> Result<(), GatewayError> {
        if self.fail {
            Err(GatewayError::Api {
                status: 503,
                body: "mock gateway unavailable".to_string(),
            })
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl PaymentGateway for MockGateway {
    async fn create_payment(
        &self,
        request: GatewayPaymentRequest,
    ) -> Result<CreatedPayment, GatewayError> {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(request.clone());
        }
        self.check()?;

        let payment_id = format!("mock-{}", request.order_id);
        self.set_status(&payment_id, "pending");

        Ok(CreatedPayment {
            confirmation_url: format!("https://pay.example.test/{}", payment_id),
            payment_id,
            status: "pending".to_string(),
        })
    }

    async fn get_payment_status(
        &self,
        payment_id: &str,
    ) -> Result<PaymentStatusInfo, GatewayError> {
        self.check()?;

        let status = self
            .statuses
            .lock()
            .ok()
            .and_then(|s| s.get(payment_id).cloned())
            .ok_or_else(|| GatewayError::Api {
                status: 404,
                body: format!("unknown payment {}", payment_id),
            })?;

        Ok(PaymentStatusInfo {
            paid: status == super::GATEWAY_STATUS_SUCCEEDED,
            status,
            amount: None,
        })
    }

    async fn cancel_payment(&self, payment_id: &str) -> Result<String, GatewayError> {
        self.check()?;
        self.set_status(payment_id, "canceled");
        Ok("canceled".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bigdecimal::BigDecimal;

    fn request() -> GatewayPaymentRequest {
        GatewayPaymentRequest {
            amount: BigDecimal::from(10),
            order_id: "7".to_string(),
            description: "test".to_string(),
            return_url: "https://example.com".to_string(),
            client_email: None,
        }
    }

    #[tokio::test]
    async fn test_mock_round_trip() {
        let gateway = MockGateway::new();
        let created = gateway.create_payment(request()).await.unwrap();
        assert_eq!(created.payment_id, "mock-7");
        assert_eq!(gateway.requests().len(), 1);

        gateway.set_status("mock-7", "succeeded");
        let status = gateway.get_payment_status("mock-7").await.unwrap();
        assert!(status.paid);
    }

    #[tokio::test]
    async fn test_failing_mock_still_records() {
        let gateway = MockGateway::failing();
        assert!(gateway.create_payment(request()).await.is_err());
        assert_eq!(gateway.requests().len(), 1);
    }
}
