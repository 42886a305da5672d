// YooKassa API v3 client
// Auth: HTTP basic with shop id / secret key. Idempotence-Key per payment.

use async_trait::async_trait;
use bigdecimal::{BigDecimal, RoundingMode};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, error, instrument};

use super::{
    CreatedPayment, GatewayError, GatewayPaymentRequest, PaymentGateway, PaymentStatusInfo,
};
use crate::app_config::GatewayConfig;
use crate::models::CURRENCY_RUB;

/// Receipt line descriptions are capped by the fiscal API
const RECEIPT_DESCRIPTION_LIMIT: usize = 128;
const VAT_CODE_NO_VAT: u8 = 1;

#[derive(Debug, Serialize)]
struct Amount {
    value: String,
    currency: &'static str,
}

#[derive(Debug, Serialize)]
struct Confirmation<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    return_url: &'a str,
}

#[derive(Debug, Serialize)]
struct ReceiptCustomer<'a> {
    email: &'a str,
}

#[derive(Debug, Serialize)]
struct ReceiptItem {
    description: String,
    quantity: &'static str,
    amount: Amount,
    vat_code: u8,
}

#[derive(Debug, Serialize)]
struct Receipt<'a> {
    customer: ReceiptCustomer<'a>,
    items: Vec<ReceiptItem>,
}

#[derive(Debug, Serialize)]
struct Metadata<'a> {
    order_id: &'a str,
}

#[derive(Debug, Serialize)]
struct CreateBody<'a> {
    amount: Amount,
    confirmation: Confirmation<'a>,
    capture: bool,
    description: &'a str,
    metadata: Metadata<'a>,
    #[serde(skip_serializing_if = "Option::is_none")]
    receipt: Option<Receipt<'a>>,
}

#[derive(Debug, Deserialize)]
struct PaymentObject {
    id: String,
    status: String,
    #[serde(default)]
    paid: bool,
    amount: Option<AmountObject>,
    confirmation: Option<ConfirmationObject>,
}

#[derive(Debug, Deserialize)]
struct AmountObject {
    value: String,
}

#[derive(Debug, Deserialize)]
struct ConfirmationObject {
    confirmation_url: Option<String>,
}

/// Two-decimal string as the API expects
pub fn format_amount(amount: &BigDecimal) -> String {
    amount.with_scale_round(2, RoundingMode::HalfUp).to_string()
}

fn truncate_chars(text: &str, limit: usize) -> String {
    text.chars().take(limit).collect()
}

#[derive(Clone)]
pub struct YookassaGateway {
    client: Client,
    config: GatewayConfig,
}

impl YookassaGateway {
    pub fn new(config: GatewayConfig) -> Result<Self, GatewayError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()?;

        Ok(Self { client, config })
    }

    fn ensure_configured(&self) -> Result<(), GatewayError> {
        if self.config.is_configured() {
            Ok(())
        } else {
            Err(GatewayError::NotConfigured)
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.api_url.trim_end_matches('/'), path)
    }

    async fn read_payment(response: reqwest::Response) -> Result<PaymentObject, GatewayError> {
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            error!("YooKassa returned {}: {}", status, body);
            return Err(GatewayError::Api {
                status: status.as_u16(),
                body,
            });
        }

        serde_json::from_str::<PaymentObject>(&body)
            .map_err(|e| GatewayError::InvalidResponse(format!("{}; body={}", e, body)))
    }

    fn build_body<'a>(request: &'a GatewayPaymentRequest) -> CreateBody<'a> {
        let amount = format_amount(&request.amount);

        let receipt = request.client_email.as_deref().map(|email| Receipt {
            customer: ReceiptCustomer { email },
            items: vec![ReceiptItem {
                description: truncate_chars(&request.description, RECEIPT_DESCRIPTION_LIMIT),
                quantity: "1",
                amount: Amount {
                    value: amount.clone(),
                    currency: CURRENCY_RUB,
                },
                vat_code: VAT_CODE_NO_VAT,
            }],
        });

        CreateBody {
            amount: Amount {
                value: amount,
                currency: CURRENCY_RUB,
            },
            confirmation: Confirmation {
                kind: "redirect",
                return_url: &request.return_url,
            },
            capture: true,
            description: &request.description,
            metadata: Metadata {
                order_id: &request.order_id,
            },
            receipt,
        }
    }
}

#[async_trait]
impl PaymentGateway for YookassaGateway {
    #[instrument(skip(self, request), fields(order_id = %request.order_id))]
    async fn create_payment(
        &self,
        request: GatewayPaymentRequest,
    ) -> Result<CreatedPayment, GatewayError> {
        self.ensure_configured()?;

        let body = Self::build_body(&request);
        debug!("Creating hosted payment for {} RUB", body.amount.value);

        let response = self
            .client
            .post(self.url("/payments"))
            .basic_auth(&self.config.shop_id, Some(&self.config.secret_key))
            .header("Idempotence-Key", &request.order_id)
            .json(&body)
            .send()
            .await?;

        let payment = Self::read_payment(response).await?;
        let confirmation_url = payment
            .confirmation
            .and_then(|c| c.confirmation_url)
            .ok_or_else(|| {
                GatewayError::InvalidResponse("missing confirmation_url".to_string())
            })?;

        Ok(CreatedPayment {
            payment_id: payment.id,
            confirmation_url,
            status: payment.status,
        })
    }

    #[instrument(skip(self))]
    async fn get_payment_status(
        &self,
        payment_id: &str,
    ) -> Result<PaymentStatusInfo, GatewayError> {
        self.ensure_configured()?;

        let response = self
            .client
            .get(self.url(&format!("/payments/{}", payment_id)))
            .basic_auth(&self.config.shop_id, Some(&self.config.secret_key))
            .send()
            .await?;

        let payment = Self::read_payment(response).await?;
        let amount = payment
            .amount
            .and_then(|a| BigDecimal::from_str(&a.value).ok());

        Ok(PaymentStatusInfo {
            status: payment.status,
            paid: payment.paid,
            amount,
        })
    }

    #[instrument(skip(self))]
    async fn cancel_payment(&self, payment_id: &str) -> Result<String, GatewayError> {
        self.ensure_configured()?;

        let response = self
            .client
            .post(self.url(&format!("/payments/{}/cancel", payment_id)))
            .basic_auth(&self.config.shop_id, Some(&self.config.secret_key))
            .header("Idempotence-Key", format!("cancel-{}", payment_id))
            .json(&JsonValue::Object(Default::default()))
            .send()
            .await?;

        Ok(Self::read_payment(response).await?.status)
    }
}
