use bigdecimal::BigDecimal;
use chrono::{DateTime, Datelike, TimeZone, Utc};
use diesel::prelude::*;
use diesel::result::{DatabaseErrorKind, Error as DieselError};
use diesel_async::{AsyncPgConnection, RunQueryDsl};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use validator::Validate;

use crate::schema::payments;

pub const CURRENCY_RUB: &str = "RUB";

#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Selectable, Identifiable)]
#[diesel(table_name = payments)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Payment {
    pub id: i32,
    pub user_id: i32,
    pub amount: BigDecimal,
    pub currency: String,
    pub description: String,
    pub order_id: String,
    pub status: String,
    pub yk_payment_id: Option<String>,
    pub pay_url: Option<String>,
    pub pk_payment_id: Option<String>,
    pub pk_ps_id: Option<String>,
    #[serde(skip_serializing)]
    pub raw_notify: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub paid_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = payments)]
pub struct NewPayment {
    pub user_id: i32,
    pub amount: BigDecimal,
    pub currency: String,
    pub description: String,
    pub order_id: String,
    pub status: String,
    pub paid_at: Option<DateTime<Utc>>,
}

/// Gateway reference data written when a payment succeeds
#[derive(Debug, Clone, Default)]
pub struct SettlementRecord {
    pub yk_payment_id: Option<String>,
    pub pk_payment_id: Option<String>,
    pub pk_ps_id: Option<String>,
    pub raw_notify: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Pending,
    Waiting,
    Succeeded,
    Canceled,
    Failed,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Waiting => "waiting",
            PaymentStatus::Succeeded => "succeeded",
            PaymentStatus::Canceled => "canceled",
            PaymentStatus::Failed => "failed",
        }
    }

    pub fn from_string(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(PaymentStatus::Pending),
            "waiting" => Some(PaymentStatus::Waiting),
            "succeeded" => Some(PaymentStatus::Succeeded),
            "canceled" => Some(PaymentStatus::Canceled),
            "failed" => Some(PaymentStatus::Failed),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            PaymentStatus::Succeeded | PaymentStatus::Canceled | PaymentStatus::Failed
        )
    }

    /// Open states may move to any terminal state; terminal states never move.
    pub fn can_transition_to(&self, next: PaymentStatus) -> bool {
        !self.is_terminal() && next.is_terminal()
    }
}

#[derive(thiserror::Error, Debug)]
pub enum PaymentError {
    #[error("Database error: {0}")]
    Database(DieselError),

    #[error("Payment not found")]
    NotFound,

    #[error("Order id '{0}' already exists")]
    DuplicateOrderId(String),

    #[error("Cannot move payment from {from} to {to}")]
    InvalidTransition {
        from: &'static str,
        to: &'static str,
    },

    #[error("Unknown payment status '{0}'")]
    UnknownStatus(String),
}

impl From<DieselError> for PaymentError {
    fn from(error: DieselError) -> Self {
        match error {
            DieselError::NotFound => PaymentError::NotFound,
            _ => PaymentError::Database(error),
        }
    }
}

/// Revenue figures for the admin dashboard
#[derive(Debug, Clone, Serialize)]
pub struct PaymentStats {
    pub total_revenue: BigDecimal,
    pub month_revenue: BigDecimal,
    pub pending_count: i64,
}

impl Payment {
    /// Insert a payment. The unique constraint on `order_id` is the final
    /// arbiter of uniqueness; a violation surfaces as `DuplicateOrderId`.
    pub async fn create(
        conn: &mut AsyncPgConnection,
        new_payment: NewPayment,
    ) -> Result<Self, PaymentError> {
        let order_id = new_payment.order_id.clone();
        diesel::insert_into(payments::table)
            .values(&new_payment)
            .get_result::<Payment>(conn)
            .await
            .map_err(|e| match e {
                DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, _) => {
                    PaymentError::DuplicateOrderId(order_id)
                },
                other => other.into(),
            })
    }

    pub async fn find_by_id(
        conn: &mut AsyncPgConnection,
        payment_id: i32,
    ) -> Result<Option<Self>, PaymentError> {
        Ok(payments::table
            .find(payment_id)
            .first::<Payment>(conn)
            .await
            .optional()?)
    }

    /// Lock the payment row until the surrounding transaction ends
    pub async fn find_for_update(
        conn: &mut AsyncPgConnection,
        payment_id: i32,
    ) -> Result<Option<Self>, PaymentError> {
        Ok(payments::table
            .find(payment_id)
            .for_update()
            .first::<Payment>(conn)
            .await
            .optional()?)
    }

    pub async fn order_id_exists(
        conn: &mut AsyncPgConnection,
        order: &str,
    ) -> Result<bool, PaymentError> {
        use diesel::dsl::exists;

        Ok(diesel::select(exists(
            payments::table.filter(payments::order_id.eq(order)),
        ))
        .get_result::<bool>(conn)
        .await?)
    }

    pub async fn find_by_user_id(
        conn: &mut AsyncPgConnection,
        owner: i32,
    ) -> Result<Vec<Self>, PaymentError> {
        Ok(payments::table
            .filter(payments::user_id.eq(owner))
            .order(payments::created_at.desc())
            .load::<Self>(conn)
            .await?)
    }

    /// All payments, newest first, optionally narrowed to one status
    pub async fn list(
        conn: &mut AsyncPgConnection,
        status: Option<PaymentStatus>,
    ) -> Result<Vec<Self>, PaymentError> {
        let mut query = payments::table.into_boxed();
        if let Some(status) = status {
            query = query.filter(payments::status.eq(status.as_str()));
        }

        Ok(query
            .order(payments::created_at.desc())
            .load::<Self>(conn)
            .await?)
    }

    /// Record the hosted-page session the gateway opened for this payment
    pub async fn attach_gateway_session(
        conn: &mut AsyncPgConnection,
        payment_id: i32,
        gateway_payment_id: &str,
        confirmation_url: &str,
    ) -> Result<Self, PaymentError> {
        Ok(diesel::update(payments::table.find(payment_id))
            .set((
                payments::yk_payment_id.eq(gateway_payment_id),
                payments::pay_url.eq(confirmation_url),
                payments::updated_at.eq(Utc::now()),
            ))
            .get_result::<Self>(conn)
            .await?)
    }

    /// Keep the failure text for later reconciliation; status is untouched
    pub async fn record_gateway_error(
        conn: &mut AsyncPgConnection,
        payment_id: i32,
        message: &str,
    ) -> Result<Self, PaymentError> {
        Ok(diesel::update(payments::table.find(payment_id))
            .set((
                payments::raw_notify.eq(format!("Error: {}", message)),
                payments::updated_at.eq(Utc::now()),
            ))
            .get_result::<Self>(conn)
            .await?)
    }

    /// Move into `Succeeded`. Caller must hold the row lock and credit the
    /// owner in the same transaction.
    pub async fn mark_succeeded(
        conn: &mut AsyncPgConnection,
        payment: &Payment,
        record: SettlementRecord,
    ) -> Result<Self, PaymentError> {
        payment.ensure_transition(PaymentStatus::Succeeded)?;

        let now = Utc::now();
        Ok(diesel::update(payments::table.find(payment.id))
            .set((
                payments::status.eq(PaymentStatus::Succeeded.as_str()),
                payments::paid_at.eq(Some(now)),
                payments::updated_at.eq(now),
                payments::yk_payment_id
                    .eq(record.yk_payment_id.or_else(|| payment.yk_payment_id.clone())),
                payments::pk_payment_id
                    .eq(record.pk_payment_id.or_else(|| payment.pk_payment_id.clone())),
                payments::pk_ps_id.eq(record.pk_ps_id.or_else(|| payment.pk_ps_id.clone())),
                payments::raw_notify.eq(record.raw_notify.or_else(|| payment.raw_notify.clone())),
            ))
            .get_result::<Self>(conn)
            .await?)
    }

    /// Move into `Canceled` or `Failed`; no balance effect
    pub async fn close_without_credit(
        conn: &mut AsyncPgConnection,
        payment: &Payment,
        next: PaymentStatus,
    ) -> Result<Self, PaymentError> {
        if next == PaymentStatus::Succeeded {
            return Err(PaymentError::InvalidTransition {
                from: payment.status_enum()?.as_str(),
                to: next.as_str(),
            });
        }
        payment.ensure_transition(next)?;

        Ok(diesel::update(payments::table.find(payment.id))
            .set((
                payments::status.eq(next.as_str()),
                payments::updated_at.eq(Utc::now()),
            ))
            .get_result::<Self>(conn)
            .await?)
    }

    pub async fn stats(conn: &mut AsyncPgConnection) -> Result<PaymentStats, PaymentError> {
        use diesel::dsl::{count_star, sum};

        let succeeded = PaymentStatus::Succeeded.as_str();

        let total_revenue = payments::table
            .filter(payments::status.eq(succeeded))
            .select(sum(payments::amount))
            .first::<Option<BigDecimal>>(conn)
            .await?
            .unwrap_or_else(|| BigDecimal::from(0));

        let month_revenue = payments::table
            .filter(payments::status.eq(succeeded))
            .filter(payments::paid_at.ge(start_of_month(Utc::now())))
            .select(sum(payments::amount))
            .first::<Option<BigDecimal>>(conn)
            .await?
            .unwrap_or_else(|| BigDecimal::from(0));

        let pending_count = payments::table
            .filter(payments::status.eq_any([
                PaymentStatus::Pending.as_str(),
                PaymentStatus::Waiting.as_str(),
            ]))
            .select(count_star())
            .first::<i64>(conn)
            .await?;

        Ok(PaymentStats {
            total_revenue,
            month_revenue,
            pending_count,
        })
    }

    pub fn status_enum(&self) -> Result<PaymentStatus, PaymentError> {
        PaymentStatus::from_string(&self.status)
            .ok_or_else(|| PaymentError::UnknownStatus(self.status.clone()))
    }

    pub fn is_succeeded(&self) -> bool {
        self.status == PaymentStatus::Succeeded.as_str()
    }

    fn ensure_transition(&self, next: PaymentStatus) -> Result<(), PaymentError> {
        let current = self.status_enum()?;
        if current.can_transition_to(next) {
            Ok(())
        } else {
            Err(PaymentError::InvalidTransition {
                from: current.as_str(),
                to: next.as_str(),
            })
        }
    }
}

/// Body of `POST /v1/payments`
#[derive(Debug, Deserialize, Validate)]
pub struct CreatePaymentRequest {
    #[validate(length(min = 1, max = 500, message = "Purpose must be 1 to 500 characters"))]
    pub purpose: String,
    pub amount: BigDecimal,
}

/// Body of the admin manual top-up
#[derive(Debug, Deserialize, Validate)]
pub struct ManualTopUpRequest {
    pub amount: BigDecimal,
    #[validate(length(max = 500))]
    pub description: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ListPaymentsParams {
    pub status: Option<String>,
}

/// Event type that is the only one allowed to move money
pub const EVENT_PAYMENT_SUCCEEDED: &str = "payment.succeeded";

/// JSON notification pushed by the hosted-page gateway
#[derive(Debug, Clone, Deserialize)]
pub struct GatewayNotification {
    #[serde(default)]
    pub event: Option<String>,
    #[serde(default)]
    pub object: Option<GatewayNotificationObject>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GatewayNotificationObject {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub metadata: Option<GatewayNotificationMetadata>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GatewayNotificationMetadata {
    /// Internal payment id, usually sent back as a string
    #[serde(default)]
    pub order_id: Option<JsonValue>,
}

impl GatewayNotification {
    pub fn is_success_event(&self) -> bool {
        self.event.as_deref() == Some(EVENT_PAYMENT_SUCCEEDED)
    }

    pub fn gateway_payment_id(&self) -> Option<&str> {
        self.object
            .as_ref()
            .and_then(|o| o.id.as_deref())
            .filter(|id| !id.is_empty())
    }

    pub fn object_status(&self) -> Option<&str> {
        self.object.as_ref().and_then(|o| o.status.as_deref())
    }

    fn raw_order_id(&self) -> Option<&JsonValue> {
        self.object
            .as_ref()
            .and_then(|o| o.metadata.as_ref())
            .and_then(|m| m.order_id.as_ref())
            .filter(|v| !v.is_null() && v.as_str() != Some(""))
    }

    /// `Ok(None)` when absent, `Err` when present but not an integer
    pub fn internal_payment_id(&self) -> Result<Option<i32>, String> {
        let Some(raw) = self.raw_order_id() else {
            return Ok(None);
        };

        let parsed = match raw {
            JsonValue::String(s) => s.trim().parse::<i32>().ok(),
            JsonValue::Number(n) => n.as_i64().and_then(|v| i32::try_from(v).ok()),
            _ => None,
        };

        parsed
            .map(Some)
            .ok_or_else(|| format!("Invalid order_id format: {}", raw))
    }
}

/// Form fields of the deprecated form-post notification
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LegacyNotification {
    pub id: Option<String>,
    pub sum: Option<String>,
    pub clientid: Option<String>,
    pub orderid: Option<String>,
    pub key: Option<String>,
    pub ps_id: Option<String>,
}

impl LegacyNotification {
    /// Trimmed value, empty string when absent
    pub fn field(value: &Option<String>) -> &str {
        value.as_deref().map(str::trim).unwrap_or("")
    }
}

fn start_of_month(now: DateTime<Utc>) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(now.year(), now.month(), 1, 0, 0, 0)
        .single()
        .unwrap_or(now)
}
