// Paid placements of one advertiser on one screen for a date range

use bigdecimal::{BigDecimal, RoundingMode};
use chrono::{DateTime, NaiveDate, Utc};
use diesel::prelude::*;
use diesel_async::{AsyncPgConnection, RunQueryDsl};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::schema::{subscriptions, tvs};

/// Share applied when a screen carries no explicit revenue share
pub const DEFAULT_REVENUE_SHARE_PERCENT: i32 = 30;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum VenuePayoutStatus {
    Pending,
    Paid,
}

impl VenuePayoutStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            VenuePayoutStatus::Pending => "pending",
            VenuePayoutStatus::Paid => "paid",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Selectable, Identifiable)]
#[diesel(table_name = subscriptions)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Subscription {
    pub id: i32,
    pub advertiser_id: i32,
    pub tv_id: i32,
    pub payment_id: Option<i32>,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub price: BigDecimal,
    pub venue_payout: BigDecimal,
    pub venue_payout_status: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = subscriptions)]
pub struct NewSubscription {
    pub advertiser_id: i32,
    pub tv_id: i32,
    pub payment_id: Option<i32>,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub price: BigDecimal,
    pub venue_payout: BigDecimal,
    pub venue_payout_status: String,
}

/// Subscription as shown to its advertiser, with the derived activity fields
#[derive(Debug, Clone, Serialize)]
pub struct SubscriptionView {
    #[serde(flatten)]
    pub subscription: Subscription,
    pub is_active: bool,
    pub days_left: i64,
}

/// Body of `POST /v1/subscriptions`; dates are `YYYY-MM-DD`
#[derive(Debug, Deserialize, Validate)]
pub struct CreateSubscriptionRequest {
    pub tv_id: i32,
    pub start_date: String,
    pub end_date: String,
    #[validate(length(min = 1, max = 255, message = "Title must be 1 to 255 characters"))]
    pub title: String,
    #[validate(url(message = "Invalid URL"))]
    #[validate(length(max = 2048))]
    pub url: String,
    #[validate(length(max = 2000))]
    pub description: Option<String>,
    pub price: BigDecimal,
}

/// `price * share / 100`, rounded half-up to kopecks.
/// `None` share falls back to [`DEFAULT_REVENUE_SHARE_PERCENT`].
pub fn venue_payout_for(price: &BigDecimal, share_percent: Option<&BigDecimal>) -> BigDecimal {
    let share = share_percent
        .cloned()
        .unwrap_or_else(|| BigDecimal::from(DEFAULT_REVENUE_SHARE_PERCENT));
    (price * share / BigDecimal::from(100)).with_scale_round(2, RoundingMode::HalfUp)
}

impl Subscription {
    /// The single definition of "active": `today` falls within
    /// `[start_date, end_date]`, both ends inclusive.
    pub fn is_active_on(&self, today: NaiveDate) -> bool {
        self.start_date <= today && today <= self.end_date
    }

    /// Whole days until `end_date` while active, otherwise zero
    pub fn days_left(&self, today: NaiveDate) -> i64 {
        if self.is_active_on(today) {
            (self.end_date - today).num_days()
        } else {
            0
        }
    }

    pub fn view(self, today: NaiveDate) -> SubscriptionView {
        SubscriptionView {
            is_active: self.is_active_on(today),
            days_left: self.days_left(today),
            subscription: self,
        }
    }

    pub async fn create(
        conn: &mut AsyncPgConnection,
        new_subscription: NewSubscription,
    ) -> Result<Self, diesel::result::Error> {
        diesel::insert_into(subscriptions::table)
            .values(&new_subscription)
            .get_result::<Subscription>(conn)
            .await
    }

    pub async fn find_by_advertiser(
        conn: &mut AsyncPgConnection,
        advertiser: i32,
    ) -> Result<Vec<Self>, diesel::result::Error> {
        subscriptions::table
            .filter(subscriptions::advertiser_id.eq(advertiser))
            .order(subscriptions::created_at.desc())
            .load::<Subscription>(conn)
            .await
    }

    /// Sum of `venue_payout` over every subscription on the venue's screens
    pub async fn total_venue_payout(
        conn: &mut AsyncPgConnection,
        venue: i32,
    ) -> Result<BigDecimal, diesel::result::Error> {
        use diesel::dsl::sum;

        let total = subscriptions::table
            .inner_join(tvs::table)
            .filter(tvs::venue_id.eq(venue))
            .select(sum(subscriptions::venue_payout))
            .first::<Option<BigDecimal>>(conn)
            .await?;

        Ok(total.unwrap_or_else(|| BigDecimal::from(0)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn subscription(start: &str, end: &str) -> Subscription {
        Subscription {
            id: 1,
            advertiser_id: 1,
            tv_id: 1,
            payment_id: None,
            start_date: NaiveDate::from_str(start).unwrap(),
            end_date: NaiveDate::from_str(end).unwrap(),
            price: BigDecimal::from(4000),
            venue_payout: BigDecimal::from(2800),
            venue_payout_status: "pending".to_string(),
            created_at: Utc::now(),
        }
    }

    fn day(s: &str) -> NaiveDate {
        NaiveDate::from_str(s).unwrap()
    }

    #[test]
    fn test_venue_payout_with_share() {
        let payout = venue_payout_for(&BigDecimal::from(4000), Some(&BigDecimal::from(70)));
        assert_eq!(payout, BigDecimal::from_str("2800.00").unwrap());
    }

    #[test]
    fn test_venue_payout_default_share() {
        let payout = venue_payout_for(&BigDecimal::from(1000), None);
        assert_eq!(payout, BigDecimal::from(300));
    }

    #[test]
    fn test_venue_payout_rounds_to_kopecks() {
        let price = BigDecimal::from_str("99.99").unwrap();
        let share = BigDecimal::from_str("33.33").unwrap();
        // 99.99 * 33.33 / 100 = 33.326667
        assert_eq!(
            venue_payout_for(&price, Some(&share)),
            BigDecimal::from_str("33.33").unwrap()
        );
    }

    #[test]
    fn test_active_range_is_inclusive() {
        let sub = subscription("2025-01-01", "2025-01-10");
        assert!(!sub.is_active_on(day("2024-12-31")));
        assert!(sub.is_active_on(day("2025-01-01")));
        assert!(sub.is_active_on(day("2025-01-10")));
        assert!(!sub.is_active_on(day("2025-01-11")));
    }

    #[test]
    fn test_days_left() {
        let sub = subscription("2025-01-01", "2025-01-10");
        assert_eq!(sub.days_left(day("2024-12-25")), 0);
        assert_eq!(sub.days_left(day("2025-01-01")), 9);
        assert_eq!(sub.days_left(day("2025-01-10")), 0);
        assert_eq!(sub.days_left(day("2025-01-11")), 0);
    }

    #[test]
    fn test_view_uses_the_same_rule() {
        let view = subscription("2025-01-01", "2025-01-10").view(day("2025-01-05"));
        assert!(view.is_active);
        assert_eq!(view.days_left, 5);
    }
}
