// Payment lifecycle: funding attempts, gateway callbacks and admin overrides.
// Every transition into Succeeded goes through `settle`, which locks the
// payment row, skips payments that are already closed and credits the owner
// in the same transaction.

use bigdecimal::BigDecimal;
use chrono::Utc;
use diesel_async::AsyncConnection;
use rand::Rng;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};
use validator::Validate;

use crate::{
    db::DieselPool,
    models::{
        CreatePaymentRequest, GatewayNotification, LegacyNotification, ManualTopUpRequest,
        NewPayment, Payment, PaymentError, PaymentStats, PaymentStatus, SettlementRecord, User,
        CURRENCY_RUB,
    },
    services::{
        gateway::{GatewayError, GatewayPaymentRequest, PaymentGateway, GATEWAY_STATUS_SUCCEEDED},
        notification::NotificationService,
    },
    utils::{
        audit_logger::{AuditAction, AuditLog, AuditLogger},
        service_error::ServiceError,
        signature::{acknowledgement_digest, digest_matches, format_sum, notification_key},
        validation::{trim_and_validate_field, validate_money},
    },
};

/// Fresh order ids tried before giving up on a collision streak
const ORDER_ID_ATTEMPTS: usize = 5;

const MANUAL_TOP_UP_DESCRIPTION: &str = "Ручное пополнение администратором";

const GATEWAY_STATUS_CANCELED: &str = "canceled";

fn random_hex8() -> String {
    format!("{:08x}", rand::thread_rng().gen::<u32>())
}

pub fn advertiser_order_id(user_id: i32) -> String {
    format!("adv-{}-{}", user_id, random_hex8())
}

pub fn manual_order_id() -> String {
    format!("manual-{}", random_hex8())
}

/// Outcome of `POST /v1/payments`
#[derive(Debug, Serialize)]
pub struct PaymentCreated {
    pub payment: Payment,
    pub confirmation_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

/// Result of an attempt to move a payment into Succeeded
#[derive(Debug)]
pub enum Settlement {
    Credited {
        payment: Payment,
        user_email: String,
        new_balance: BigDecimal,
    },
    AlreadySucceeded(Payment),
    /// Canceled or Failed; never credited
    Closed(Payment),
    NotFound,
}

/// How the JSON webhook was acknowledged
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WebhookAck {
    Processed,
    PaymentNotFound,
    EventIgnored,
}

impl WebhookAck {
    pub fn message(&self) -> Option<&'static str> {
        match self {
            WebhookAck::Processed => None,
            WebhookAck::PaymentNotFound => Some("Payment not found"),
            WebhookAck::EventIgnored => Some("Event ignored"),
        }
    }
}

/// Plain-text answers of the legacy form-post notification
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LegacyAck {
    MissingParameters,
    InvalidSum,
    HashMismatch,
    InvalidOrderId,
    Accepted { digest: String },
}

impl LegacyAck {
    pub fn body(&self) -> String {
        match self {
            LegacyAck::MissingParameters => "Error! Missing or invalid parameters!".to_string(),
            LegacyAck::InvalidSum => "Error! Invalid sum format!".to_string(),
            LegacyAck::HashMismatch => "Error! Hash mismatch!".to_string(),
            LegacyAck::InvalidOrderId => "Error! Invalid orderid!".to_string(),
            LegacyAck::Accepted { digest } => format!("OK {}", digest),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SyncResult {
    pub payment: Payment,
    pub gateway_status: String,
    pub credited: bool,
}

#[derive(Clone)]
pub struct PaymentService {
    diesel_pool: DieselPool,
    gateway: Arc<dyn PaymentGateway>,
    notifications: NotificationService,
    return_url: String,
    legacy_secret: String,
}

impl PaymentService {
    pub fn new(
        diesel_pool: DieselPool,
        gateway: Arc<dyn PaymentGateway>,
        notifications: NotificationService,
        return_url: String,
        legacy_secret: String,
    ) -> Self {
        Self {
            diesel_pool,
            gateway,
            notifications,
            return_url,
            legacy_secret,
        }
    }

    /// Insert a payment under a freshly generated order id. A collision with
    /// an existing id, whether seen up front or raised by the unique
    /// constraint, just draws another id.
    async fn insert_with_fresh_order_id<G, B>(
        conn: &mut diesel_async::AsyncPgConnection,
        mut generate: G,
        mut build: B,
    ) -> Result<Payment, ServiceError>
    where
        G: FnMut() -> String,
        B: FnMut(String) -> NewPayment,
    {
        for _ in 0..ORDER_ID_ATTEMPTS {
            let order_id = generate();
            if Payment::order_id_exists(conn, &order_id).await? {
                debug!("Order id {} already taken, drawing another", order_id);
                continue;
            }

            match Payment::create(conn, build(order_id)).await {
                Ok(payment) => return Ok(payment),
                Err(PaymentError::DuplicateOrderId(order_id)) => {
                    debug!("Order id {} lost a race, drawing another", order_id);
                },
                Err(e) => return Err(e.into()),
            }
        }

        Err(ServiceError::Conflict(
            "Could not allocate a unique order id".to_string(),
        ))
    }

    /// Record a funding attempt as Waiting and open a hosted payment page.
    /// A gateway failure leaves the payment Waiting and comes back as a warning.
    #[instrument(skip(self, request))]
    pub async fn create(
        &self,
        user_id: i32,
        request: CreatePaymentRequest,
    ) -> Result<PaymentCreated, ServiceError> {
        request.validate()?;
        let purpose = trim_and_validate_field(&request.purpose, true)
            .map_err(|_| ServiceError::ValidationError("Purpose cannot be empty".to_string()))?;
        let amount =
            validate_money("amount", &request.amount).map_err(ServiceError::ValidationError)?;

        let (payment, user_email) = {
            let mut conn = self.diesel_pool.get().await?;
            let user = User::find_by_id(&mut conn, user_id).await?;

            let payment = Self::insert_with_fresh_order_id(
                &mut conn,
                || advertiser_order_id(user_id),
                |order_id| NewPayment {
                    user_id,
                    amount: amount.clone(),
                    currency: CURRENCY_RUB.to_string(),
                    description: purpose.clone(),
                    order_id,
                    status: PaymentStatus::Waiting.as_str().to_string(),
                    paid_at: None,
                },
            )
            .await?;

            (payment, user.email)
        };

        AuditLogger::log(
            AuditLog::new(AuditAction::PaymentCreated, "payment")
                .actor(user_id)
                .resource(payment.id)
                .amount(&payment.amount)
                .details(format!("order_id={}", payment.order_id)),
        );

        let gateway_request = GatewayPaymentRequest {
            amount: payment.amount.clone(),
            order_id: payment.id.to_string(),
            description: payment.description.clone(),
            return_url: self.return_url.clone(),
            client_email: Some(user_email),
        };

        let outcome = self.gateway.create_payment(gateway_request).await;
        let mut conn = self.diesel_pool.get().await?;

        match outcome {
            Ok(created) => {
                let payment = Payment::attach_gateway_session(
                    &mut conn,
                    payment.id,
                    &created.payment_id,
                    &created.confirmation_url,
                )
                .await?;
                info!("Payment {} opened at the gateway as {}", payment.id, created.payment_id);

                Ok(PaymentCreated {
                    payment,
                    confirmation_url: Some(created.confirmation_url),
                    warning: None,
                })
            },
            Err(e) => {
                warn!("Gateway failed for payment {}: {}", payment.id, e);
                let payment =
                    Payment::record_gateway_error(&mut conn, payment.id, &e.to_string()).await?;

                Ok(PaymentCreated {
                    payment,
                    confirmation_url: None,
                    warning: Some(gateway_warning(&e)),
                })
            },
        }
    }

    /// Lock the payment, and unless it is already closed mark it Succeeded
    /// and credit its owner in one transaction.
    async fn settle(
        &self,
        payment_id: i32,
        record: SettlementRecord,
    ) -> Result<Settlement, ServiceError> {
        let mut conn = self.diesel_pool.get().await?;

        conn.transaction::<_, ServiceError, _>(|tx| {
            Box::pin(async move {
                let Some(payment) = Payment::find_for_update(tx, payment_id).await? else {
                    return Ok(Settlement::NotFound);
                };

                let status = payment.status_enum()?;
                if status == PaymentStatus::Succeeded {
                    return Ok(Settlement::AlreadySucceeded(payment));
                }
                if status.is_terminal() {
                    return Ok(Settlement::Closed(payment));
                }

                let owner = User::find_for_update(tx, payment.user_id).await?;
                let payment = Payment::mark_succeeded(tx, &payment, record).await?;
                let new_balance = User::credit_balance(tx, owner.id, &payment.amount).await?;

                Ok(Settlement::Credited {
                    payment,
                    user_email: owner.email,
                    new_balance,
                })
            })
        })
        .await
    }

    fn after_credit(
        &self,
        payment: &Payment,
        user_email: &str,
        new_balance: &BigDecimal,
        source: &str,
    ) {
        AuditLogger::payment_credited(payment.id, payment.user_id, &payment.amount, source);
        info!(
            "Payment {} credited {} to user {} via {}",
            payment.id, payment.amount, payment.user_id, source
        );
        self.notifications
            .payment_succeeded(user_email, payment.id, &payment.amount, new_balance, source);
    }

    /// JSON callback from the hosted-page gateway. Only malformed input is an
    /// error; anything else is acknowledged.
    #[instrument(skip(self, raw_body))]
    pub async fn handle_webhook(&self, raw_body: &[u8]) -> Result<WebhookAck, ServiceError> {
        let notification: GatewayNotification = serde_json::from_slice(raw_body)
            .map_err(|e| ServiceError::ValidationError(format!("Invalid JSON: {}", e)))?;

        if !notification.is_success_event() {
            debug!("Ignoring gateway event {:?}", notification.event);
            return Ok(WebhookAck::EventIgnored);
        }

        let missing =
            || ServiceError::ValidationError("Missing payment_id or order_id".to_string());
        let gateway_payment_id = notification.gateway_payment_id().ok_or_else(missing)?.to_string();
        let payment_id = notification
            .internal_payment_id()
            .map_err(ServiceError::ValidationError)?
            .ok_or_else(missing)?;

        if notification.object_status() != Some(GATEWAY_STATUS_SUCCEEDED) {
            let mut conn = self.diesel_pool.get().await?;
            return Ok(match Payment::find_by_id(&mut conn, payment_id).await? {
                Some(_) => WebhookAck::Processed,
                None => WebhookAck::PaymentNotFound,
            });
        }

        let record = SettlementRecord {
            yk_payment_id: Some(gateway_payment_id),
            raw_notify: Some(String::from_utf8_lossy(raw_body).into_owned()),
            ..Default::default()
        };

        match self.settle(payment_id, record).await? {
            Settlement::NotFound => {
                info!("Webhook for unknown payment {}", payment_id);
                Ok(WebhookAck::PaymentNotFound)
            },
            Settlement::AlreadySucceeded(_) => {
                info!("Duplicate webhook for payment {}", payment_id);
                Ok(WebhookAck::Processed)
            },
            Settlement::Closed(payment) => {
                warn!(
                    "Success webhook for closed payment {} ({}), not credited",
                    payment.id, payment.status
                );
                Ok(WebhookAck::Processed)
            },
            Settlement::Credited {
                payment,
                user_email,
                new_balance,
            } => {
                self.after_credit(&payment, &user_email, &new_balance, "yookassa_webhook");
                Ok(WebhookAck::Processed)
            },
        }
    }

    /// Deprecated form-post notification, signed with an MD5 key
    #[instrument(skip(self, form))]
    pub async fn handle_legacy_notify(
        &self,
        form: LegacyNotification,
    ) -> Result<LegacyAck, ServiceError> {
        let id = LegacyNotification::field(&form.id);
        let sum = LegacyNotification::field(&form.sum);
        let client_id = LegacyNotification::field(&form.clientid);
        let order_id = LegacyNotification::field(&form.orderid);
        let key = LegacyNotification::field(&form.key);
        let ps_id = LegacyNotification::field(&form.ps_id);

        if id.is_empty() || sum.is_empty() || key.is_empty() {
            return Ok(LegacyAck::MissingParameters);
        }

        let Some(sum) = format_sum(sum) else {
            return Ok(LegacyAck::InvalidSum);
        };

        if self.legacy_secret.is_empty() {
            warn!("Legacy notification received but no shared secret is configured");
            return Ok(LegacyAck::HashMismatch);
        }

        let expected = notification_key(id, &sum, client_id, order_id, &self.legacy_secret);
        if !digest_matches(key, &expected) {
            warn!("Legacy notification {} failed signature check", id);
            return Ok(LegacyAck::HashMismatch);
        }

        let Ok(payment_id) = order_id.parse::<i32>() else {
            return Ok(LegacyAck::InvalidOrderId);
        };

        let record = SettlementRecord {
            pk_payment_id: Some(id.to_string()),
            pk_ps_id: Some(ps_id.to_string()).filter(|p| !p.is_empty()),
            raw_notify: serde_json::to_string(&form).ok(),
            ..Default::default()
        };

        match self.settle(payment_id, record).await? {
            Settlement::Credited {
                payment,
                user_email,
                new_balance,
            } => self.after_credit(&payment, &user_email, &new_balance, "paykeeper_notify"),
            Settlement::AlreadySucceeded(_) => {
                info!("Duplicate legacy notification for payment {}", payment_id)
            },
            Settlement::Closed(payment) => warn!(
                "Legacy notification for closed payment {} ({}), not credited",
                payment.id, payment.status
            ),
            Settlement::NotFound => info!("Legacy notification for unknown payment {}", payment_id),
        }

        Ok(LegacyAck::Accepted {
            digest: acknowledgement_digest(id, &self.legacy_secret),
        })
    }

    /// Admin override: an open payment becomes Succeeded and is credited
    #[instrument(skip(self))]
    pub async fn admin_confirm(
        &self,
        admin_id: i32,
        payment_id: i32,
    ) -> Result<Payment, ServiceError> {
        match self.settle(payment_id, SettlementRecord::default()).await? {
            Settlement::NotFound => Err(ServiceError::NotFound),
            Settlement::AlreadySucceeded(payment) | Settlement::Closed(payment) => {
                Err(PaymentError::InvalidTransition {
                    from: payment.status_enum()?.as_str(),
                    to: PaymentStatus::Succeeded.as_str(),
                }
                .into())
            },
            Settlement::Credited {
                payment,
                user_email,
                new_balance,
            } => {
                AuditLogger::log(
                    AuditLog::new(AuditAction::PaymentCredited, "payment")
                        .actor(admin_id)
                        .resource(payment.id)
                        .amount(&payment.amount)
                        .details("manual confirmation"),
                );
                self.after_credit(&payment, &user_email, &new_balance, "admin_confirm");
                Ok(payment)
            },
        }
    }

    /// Admin override: an open payment becomes Canceled without touching balance
    #[instrument(skip(self))]
    pub async fn admin_cancel(
        &self,
        admin_id: i32,
        payment_id: i32,
    ) -> Result<Payment, ServiceError> {
        let mut conn = self.diesel_pool.get().await?;

        let payment = conn
            .transaction::<_, ServiceError, _>(|tx| {
                Box::pin(async move {
                    let payment = Payment::find_for_update(tx, payment_id)
                        .await?
                        .ok_or(ServiceError::NotFound)?;
                    Ok(Payment::close_without_credit(tx, &payment, PaymentStatus::Canceled).await?)
                })
            })
            .await?;

        AuditLogger::log(
            AuditLog::new(AuditAction::PaymentCanceled, "payment")
                .actor(admin_id)
                .resource(payment.id)
                .amount(&payment.amount),
        );

        if let Some(gateway_id) = payment.yk_payment_id.as_deref() {
            if let Err(e) = self.gateway.cancel_payment(gateway_id).await {
                warn!("Gateway cancel for payment {} failed: {}", payment.id, e);
            }
        }

        Ok(payment)
    }

    /// Ask the gateway for the current status and apply a success or cancel
    #[instrument(skip(self))]
    pub async fn sync_status(
        &self,
        admin_id: i32,
        payment_id: i32,
    ) -> Result<SyncResult, ServiceError> {
        let payment = {
            let mut conn = self.diesel_pool.get().await?;
            Payment::find_by_id(&mut conn, payment_id)
                .await?
                .ok_or(ServiceError::NotFound)?
        };

        let gateway_payment_id = payment.yk_payment_id.clone().ok_or_else(|| {
            ServiceError::ValidationError("Payment has no gateway session".to_string())
        })?;

        let info = self.gateway.get_payment_status(&gateway_payment_id).await?;

        if info.status == GATEWAY_STATUS_SUCCEEDED {
            let record = SettlementRecord {
                yk_payment_id: Some(gateway_payment_id),
                ..Default::default()
            };
            return Ok(match self.settle(payment_id, record).await? {
                Settlement::Credited {
                    payment,
                    user_email,
                    new_balance,
                } => {
                    AuditLogger::log(
                        AuditLog::new(AuditAction::PaymentCredited, "payment")
                            .actor(admin_id)
                            .resource(payment.id)
                            .amount(&payment.amount)
                            .details("gateway status sync"),
                    );
                    self.after_credit(&payment, &user_email, &new_balance, "status_sync");
                    SyncResult {
                        payment,
                        gateway_status: info.status,
                        credited: true,
                    }
                },
                Settlement::AlreadySucceeded(payment) | Settlement::Closed(payment) => SyncResult {
                    payment,
                    gateway_status: info.status,
                    credited: false,
                },
                Settlement::NotFound => return Err(ServiceError::NotFound),
            });
        }

        let cancel_locally =
            info.status == GATEWAY_STATUS_CANCELED && !payment.status_enum()?.is_terminal();
        let payment = if cancel_locally {
            let mut conn = self.diesel_pool.get().await?;
            conn.transaction::<_, ServiceError, _>(|tx| {
                Box::pin(async move {
                    let locked = Payment::find_for_update(tx, payment_id)
                        .await?
                        .ok_or(ServiceError::NotFound)?;
                    if locked.status_enum()?.is_terminal() {
                        return Ok(locked);
                    }
                    Ok(Payment::close_without_credit(tx, &locked, PaymentStatus::Canceled).await?)
                })
            })
            .await?
        } else {
            payment
        };

        Ok(SyncResult {
            payment,
            gateway_status: info.status,
            credited: false,
        })
    }

    /// Admin top-up: a Succeeded payment plus the credit, in one transaction
    #[instrument(skip(self, request))]
    pub async fn manual_top_up(
        &self,
        admin_id: i32,
        user_id: i32,
        request: ManualTopUpRequest,
    ) -> Result<(Payment, BigDecimal), ServiceError> {
        request.validate()?;
        let amount =
            validate_money("amount", &request.amount).map_err(ServiceError::ValidationError)?;
        let description = request
            .description
            .as_deref()
            .map(str::trim)
            .filter(|d| !d.is_empty())
            .unwrap_or(MANUAL_TOP_UP_DESCRIPTION)
            .to_string();

        let mut conn = self.diesel_pool.get().await?;
        let (payment, new_balance) = conn
            .transaction::<_, ServiceError, _>(|tx| {
                Box::pin(async move {
                    User::find_for_update(tx, user_id).await?;

                    let payment = Self::insert_with_fresh_order_id(tx, manual_order_id, |order_id| {
                        NewPayment {
                            user_id,
                            amount: amount.clone(),
                            currency: CURRENCY_RUB.to_string(),
                            description: description.clone(),
                            order_id,
                            status: PaymentStatus::Succeeded.as_str().to_string(),
                            paid_at: Some(Utc::now()),
                        }
                    })
                    .await?;

                    let new_balance = User::credit_balance(tx, user_id, &payment.amount).await?;
                    Ok((payment, new_balance))
                })
            })
            .await?;

        AuditLogger::log(
            AuditLog::new(AuditAction::ManualTopUp, "payment")
                .actor(admin_id)
                .resource(payment.id)
                .amount(&payment.amount)
                .details(format!("user={} balance={}", user_id, new_balance)),
        );

        Ok((payment, new_balance))
    }

    pub async fn list_own(&self, user_id: i32) -> Result<Vec<Payment>, ServiceError> {
        let mut conn = self.diesel_pool.get().await?;
        Ok(Payment::find_by_user_id(&mut conn, user_id).await?)
    }

    /// A payment visible to its owner only; anyone else gets NotFound
    pub async fn get_own(&self, user_id: i32, payment_id: i32) -> Result<Payment, ServiceError> {
        let mut conn = self.diesel_pool.get().await?;
        Payment::find_by_id(&mut conn, payment_id)
            .await?
            .filter(|p| p.user_id == user_id)
            .ok_or(ServiceError::NotFound)
    }

    pub async fn list(&self, status: Option<&str>) -> Result<Vec<Payment>, ServiceError> {
        let status = match status.map(str::trim).filter(|s| !s.is_empty()) {
            Some(raw) => Some(PaymentStatus::from_string(raw).ok_or_else(|| {
                ServiceError::ValidationError(format!("Unknown payment status '{}'", raw))
            })?),
            None => None,
        };

        let mut conn = self.diesel_pool.get().await?;
        Ok(Payment::list(&mut conn, status).await?)
    }

    pub async fn stats(&self) -> Result<PaymentStats, ServiceError> {
        let mut conn = self.diesel_pool.get().await?;
        Ok(Payment::stats(&mut conn).await?)
    }
}

fn gateway_warning(error: &GatewayError) -> String {
    match error {
        GatewayError::NotConfigured => {
            "Payment gateway is not configured; the payment was saved and awaits manual confirmation"
                .to_string()
        },
        other => format!(
            "Payment gateway error: {}; the payment was saved and can be retried or confirmed manually",
            other
        ),
    }
}
