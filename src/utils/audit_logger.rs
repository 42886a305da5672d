// Audit trail for every action that moves money or changes who may do what
use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum AuditAction {
    PaymentCreated,
    PaymentCredited,
    PaymentCanceled,
    ManualTopUp,
    SubscriptionPurchased,
    PayoutCreated,
    PayoutStatusChanged,
    RoleSwitched,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AuditLog {
    pub id: Uuid,
    pub action: AuditAction,
    /// Who triggered it; `None` for gateway callbacks
    pub actor_id: Option<i32>,
    pub resource_id: Option<String>,
    pub resource_type: String,
    pub amount: Option<BigDecimal>,
    pub details: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl AuditLog {
    pub fn new(action: AuditAction, resource_type: &str) -> Self {
        Self {
            id: Uuid::new_v4(),
            action,
            actor_id: None,
            resource_id: None,
            resource_type: resource_type.to_string(),
            amount: None,
            details: None,
            timestamp: Utc::now(),
        }
    }

    pub fn actor(mut self, actor_id: i32) -> Self {
        self.actor_id = Some(actor_id);
        self
    }

    pub fn resource(mut self, resource_id: impl ToString) -> Self {
        self.resource_id = Some(resource_id.to_string());
        self
    }

    pub fn amount(mut self, amount: &BigDecimal) -> Self {
        self.amount = Some(amount.clone());
        self
    }

    pub fn details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }
}

pub struct AuditLogger;

impl AuditLogger {
    /// Emit one JSON line on the `audit` target
    pub fn log(entry: AuditLog) {
        let json_log = serde_json::to_string(&entry).unwrap_or_else(|e| {
            warn!("Failed to serialize audit log: {}", e);
            format!("{:?}", entry)
        });

        info!(target: "audit", "{}", json_log);
    }

    pub fn payment_credited(payment_id: i32, user_id: i32, amount: &BigDecimal, source: &str) {
        Self::log(
            AuditLog::new(AuditAction::PaymentCredited, "payment")
                .resource(payment_id)
                .amount(amount)
                .details(format!("user={} source={}", user_id, source)),
        );
    }
}
