// Venue payouts. Every record here is entered by an admin; subscription
// purchases only accrue `venue_payout` and never create a payout row.

use bigdecimal::BigDecimal;
use diesel_async::{AsyncConnection, AsyncPgConnection};
use serde::Serialize;
use tracing::{info, instrument};
use validator::Validate;

use crate::{
    db::DieselPool,
    models::{
        CreatePayoutRequest, NewVenuePayout, PayoutStatus, Role, Subscription, Tv, User,
        VenuePayout,
    },
    services::notification::NotificationService,
    utils::{
        audit_logger::{AuditAction, AuditLog, AuditLogger},
        service_error::ServiceError,
        validation::{parse_iso_date, trim_optional_field, validate_money},
    },
};

/// What the platform owes a venue, for the admin's payout screen.
/// Informational only: nothing acts on `pending` automatically.
#[derive(Debug, Clone, Serialize)]
pub struct VenueEarnings {
    pub venue_id: i32,
    pub venue_name: String,
    pub email: String,
    pub tv_count: usize,
    pub total_earned: BigDecimal,
    pub total_paid: BigDecimal,
    pub pending: BigDecimal,
}

#[derive(Clone)]
pub struct PayoutService {
    diesel_pool: DieselPool,
    notifications: NotificationService,
}

impl PayoutService {
    pub fn new(diesel_pool: DieselPool, notifications: NotificationService) -> Self {
        Self {
            diesel_pool,
            notifications,
        }
    }

    /// Record a payout to a venue in `pending`
    #[instrument(skip(self, request))]
    pub async fn create(
        &self,
        admin_id: i32,
        request: CreatePayoutRequest,
    ) -> Result<VenuePayout, ServiceError> {
        request.validate()?;

        let period_start = parse_iso_date("period_start", &request.period_start)
            .map_err(|_| ServiceError::InvalidDates)?;
        let period_end = parse_iso_date("period_end", &request.period_end)
            .map_err(|_| ServiceError::InvalidDates)?;
        if period_end < period_start {
            return Err(ServiceError::InvalidDates);
        }
        let amount =
            validate_money("amount", &request.amount).map_err(ServiceError::ValidationError)?;

        let mut conn = self.diesel_pool.get().await?;

        let venue = User::find_by_id(&mut conn, request.venue_id).await?;
        if venue.role_enum() != Role::Venue {
            return Err(ServiceError::ValidationError(format!(
                "User {} is not a venue",
                venue.id
            )));
        }

        if let Some(tv_id) = request.tv_id {
            let owned = Tv::find_by_id(&mut conn, tv_id)
                .await?
                .is_some_and(|tv| tv.venue_id == Some(venue.id));
            if !owned {
                return Err(ServiceError::ValidationError(format!(
                    "TV {} does not belong to venue {}",
                    tv_id, venue.id
                )));
            }
        }

        let payout = VenuePayout::create(
            &mut conn,
            NewVenuePayout {
                venue_id: venue.id,
                tv_id: request.tv_id,
                period_start,
                period_end,
                amount,
                status: PayoutStatus::Pending.as_str().to_string(),
                payment_details: trim_optional_field(request.payment_details.as_ref()),
            },
        )
        .await?;

        AuditLogger::log(
            AuditLog::new(AuditAction::PayoutCreated, "venue_payout")
                .actor(admin_id)
                .resource(payout.id)
                .amount(&payout.amount)
                .details(format!(
                    "venue={} period={}..{}",
                    payout.venue_id, payout.period_start, payout.period_end
                )),
        );
        info!("Admin {} created payout {} for venue {}", admin_id, payout.id, venue.id);

        self.notifications.payout_created(
            &venue.email,
            payout.id,
            &payout.amount,
            payout.period_start,
            payout.period_end,
        );

        Ok(payout)
    }

    /// Move a payout forward; backward or repeated moves are a conflict
    #[instrument(skip(self))]
    pub async fn advance(
        &self,
        admin_id: i32,
        payout_id: i32,
        status: &str,
    ) -> Result<VenuePayout, ServiceError> {
        let next = PayoutStatus::from_string(status).ok_or_else(|| {
            ServiceError::ValidationError(format!("Unknown payout status '{}'", status))
        })?;

        let mut conn = self.diesel_pool.get().await?;
        let (previous, updated) = conn
            .transaction::<_, ServiceError, _>(|tx| {
                Box::pin(async move {
                    let payout = VenuePayout::find_for_update(tx, payout_id).await?;
                    let updated = VenuePayout::advance(tx, &payout, next).await?;
                    Ok((payout.status, updated))
                })
            })
            .await?;

        AuditLogger::log(
            AuditLog::new(AuditAction::PayoutStatusChanged, "venue_payout")
                .actor(admin_id)
                .resource(updated.id)
                .amount(&updated.amount)
                .details(format!("{} -> {}", previous, updated.status)),
        );

        Ok(updated)
    }

    pub async fn list(&self) -> Result<Vec<VenuePayout>, ServiceError> {
        let mut conn = self.diesel_pool.get().await?;
        Ok(VenuePayout::list(&mut conn).await?)
    }

    pub async fn list_for_venue(&self, venue_id: i32) -> Result<Vec<VenuePayout>, ServiceError> {
        let mut conn = self.diesel_pool.get().await?;
        Ok(VenuePayout::find_by_venue(&mut conn, venue_id).await?)
    }

    /// Earnings of every venue account
    pub async fn earnings_for_all(&self) -> Result<Vec<VenueEarnings>, ServiceError> {
        let mut conn = self.diesel_pool.get().await?;
        let venues = User::find_by_role(&mut conn, Role::Venue).await?;

        let mut summaries = Vec::with_capacity(venues.len());
        for venue in venues {
            summaries.push(earnings_of(&mut conn, venue).await?);
        }
        Ok(summaries)
    }

    pub async fn earnings_for_venue(&self, venue_id: i32) -> Result<VenueEarnings, ServiceError> {
        let mut conn = self.diesel_pool.get().await?;
        let venue = User::find_by_id(&mut conn, venue_id).await?;
        earnings_of(&mut conn, venue).await
    }
}

async fn earnings_of(
    conn: &mut AsyncPgConnection,
    venue: User,
) -> Result<VenueEarnings, ServiceError> {
    let tv_count = Tv::find_by_venue(conn, venue.id).await?.len();
    let total_earned = Subscription::total_venue_payout(conn, venue.id).await?;
    let total_paid = VenuePayout::total_paid(conn, venue.id).await?;

    Ok(VenueEarnings {
        venue_id: venue.id,
        venue_name: venue.display_name(),
        email: venue.email,
        tv_count,
        pending: pending_amount(&total_earned, &total_paid),
        total_earned,
        total_paid,
    })
}

/// Earned minus paid, never below zero
fn pending_amount(earned: &BigDecimal, paid: &BigDecimal) -> BigDecimal {
    let pending = earned - paid;
    if pending < BigDecimal::from(0) {
        BigDecimal::from(0)
    } else {
        pending
    }
}
