// Settlement records paid from the platform to a venue.
// Entered by an admin; nothing in the system derives them from subscriptions.

use bigdecimal::BigDecimal;
use chrono::{DateTime, NaiveDate, Utc};
use diesel::prelude::*;
use diesel_async::{AsyncPgConnection, RunQueryDsl};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::schema::venue_payouts;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PayoutStatus {
    Pending,
    Processing,
    Paid,
}

impl PayoutStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PayoutStatus::Pending => "pending",
            PayoutStatus::Processing => "processing",
            PayoutStatus::Paid => "paid",
        }
    }

    pub fn from_string(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(PayoutStatus::Pending),
            "processing" => Some(PayoutStatus::Processing),
            "paid" => Some(PayoutStatus::Paid),
            _ => None,
        }
    }

    /// Forward only. Pending may skip straight to Paid.
    pub fn can_advance_to(&self, next: PayoutStatus) -> bool {
        matches!(
            (self, next),
            (PayoutStatus::Pending, PayoutStatus::Processing)
                | (PayoutStatus::Pending, PayoutStatus::Paid)
                | (PayoutStatus::Processing, PayoutStatus::Paid)
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Selectable, Identifiable)]
#[diesel(table_name = venue_payouts)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct VenuePayout {
    pub id: i32,
    pub venue_id: i32,
    pub tv_id: Option<i32>,
    pub period_start: NaiveDate,
    pub period_end: NaiveDate,
    pub amount: BigDecimal,
    pub status: String,
    pub payment_details: Option<String>,
    pub created_at: DateTime<Utc>,
    pub paid_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = venue_payouts)]
pub struct NewVenuePayout {
    pub venue_id: i32,
    pub tv_id: Option<i32>,
    pub period_start: NaiveDate,
    pub period_end: NaiveDate,
    pub amount: BigDecimal,
    pub status: String,
    pub payment_details: Option<String>,
}

/// Body of `POST /v1/admin/payouts`; period dates are `YYYY-MM-DD`
#[derive(Debug, Deserialize, Validate)]
pub struct CreatePayoutRequest {
    pub venue_id: i32,
    pub tv_id: Option<i32>,
    pub period_start: String,
    pub period_end: String,
    pub amount: BigDecimal,
    #[validate(length(max = 1000))]
    pub payment_details: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdatePayoutStatusRequest {
    pub status: String,
}

#[derive(thiserror::Error, Debug)]
pub enum PayoutError {
    #[error("Database error: {0}")]
    Database(#[from] diesel::result::Error),

    #[error("Payout not found")]
    NotFound,

    #[error("Cannot move payout from {from} to {to}")]
    InvalidTransition {
        from: &'static str,
        to: &'static str,
    },

    #[error("Unknown payout status '{0}'")]
    UnknownStatus(String),
}

impl VenuePayout {
    pub async fn create(
        conn: &mut AsyncPgConnection,
        new_payout: NewVenuePayout,
    ) -> Result<Self, PayoutError> {
        Ok(diesel::insert_into(venue_payouts::table)
            .values(&new_payout)
            .get_result::<VenuePayout>(conn)
            .await?)
    }

    pub async fn find_for_update(
        conn: &mut AsyncPgConnection,
        payout_id: i32,
    ) -> Result<Self, PayoutError> {
        venue_payouts::table
            .find(payout_id)
            .for_update()
            .first::<VenuePayout>(conn)
            .await
            .map_err(|e| match e {
                diesel::result::Error::NotFound => PayoutError::NotFound,
                _ => PayoutError::Database(e),
            })
    }

    pub async fn list(conn: &mut AsyncPgConnection) -> Result<Vec<Self>, PayoutError> {
        Ok(venue_payouts::table
            .order(venue_payouts::created_at.desc())
            .load::<VenuePayout>(conn)
            .await?)
    }

    pub async fn find_by_venue(
        conn: &mut AsyncPgConnection,
        venue: i32,
    ) -> Result<Vec<Self>, PayoutError> {
        Ok(venue_payouts::table
            .filter(venue_payouts::venue_id.eq(venue))
            .order(venue_payouts::created_at.desc())
            .load::<VenuePayout>(conn)
            .await?)
    }

    /// Sum of payouts already settled with the venue
    pub async fn total_paid(
        conn: &mut AsyncPgConnection,
        venue: i32,
    ) -> Result<BigDecimal, PayoutError> {
        use diesel::dsl::sum;

        let total = venue_payouts::table
            .filter(venue_payouts::venue_id.eq(venue))
            .filter(venue_payouts::status.eq(PayoutStatus::Paid.as_str()))
            .select(sum(venue_payouts::amount))
            .first::<Option<BigDecimal>>(conn)
            .await?;

        Ok(total.unwrap_or_else(|| BigDecimal::from(0)))
    }

    /// Apply a forward status change; `paid_at` is stamped on entering Paid.
    /// Caller must hold the row lock.
    pub async fn advance(
        conn: &mut AsyncPgConnection,
        payout: &VenuePayout,
        next: PayoutStatus,
    ) -> Result<Self, PayoutError> {
        let current = payout.status_enum()?;
        if !current.can_advance_to(next) {
            return Err(PayoutError::InvalidTransition {
                from: current.as_str(),
                to: next.as_str(),
            });
        }

        let paid_at = if next == PayoutStatus::Paid {
            Some(Utc::now())
        } else {
            payout.paid_at
        };

        Ok(diesel::update(venue_payouts::table.find(payout.id))
            .set((
                venue_payouts::status.eq(next.as_str()),
                venue_payouts::paid_at.eq(paid_at),
            ))
            .get_result::<VenuePayout>(conn)
            .await?)
    }

    pub fn status_enum(&self) -> Result<PayoutStatus, PayoutError> {
        PayoutStatus::from_string(&self.status)
            .ok_or_else(|| PayoutError::UnknownStatus(self.status.clone()))
    }
}
