// Placements bought from balance. The debit, the subscription row and the
// TV link are written in one transaction under the advertiser's row lock.

use bigdecimal::BigDecimal;
use chrono::{NaiveDate, Utc};
use diesel_async::AsyncConnection;
use serde::Serialize;
use tracing::{info, instrument};
use validator::Validate;

use crate::{
    db::DieselPool,
    models::{
        venue_payout_for, CreateSubscriptionRequest, NewSubscription, NewTvLink, Subscription,
        SubscriptionView, Tv, TvLink, User, VenuePayoutStatus,
    },
    services::notification::NotificationService,
    utils::{
        audit_logger::{AuditAction, AuditLog, AuditLogger},
        service_error::ServiceError,
        validation::{
            parse_iso_date, trim_and_validate_field, trim_optional_field, validate_money,
        },
    },
};

#[derive(Debug, Serialize)]
pub struct SubscriptionPurchase {
    pub subscription: SubscriptionView,
    pub link: TvLink,
    pub balance: BigDecimal,
}

/// Request fields after parsing, ready for the transaction
#[derive(Debug, Clone)]
struct Placement {
    tv_id: i32,
    start_date: NaiveDate,
    end_date: NaiveDate,
    title: String,
    url: String,
    description: Option<String>,
    price: BigDecimal,
}

impl Placement {
    fn parse(request: CreateSubscriptionRequest) -> Result<Self, ServiceError> {
        let start_date = parse_iso_date("start_date", &request.start_date)
            .map_err(|_| ServiceError::InvalidDates)?;
        let end_date = parse_iso_date("end_date", &request.end_date)
            .map_err(|_| ServiceError::InvalidDates)?;
        if end_date < start_date {
            return Err(ServiceError::InvalidDates);
        }

        request.validate()?;
        let price = validate_money("price", &request.price).map_err(ServiceError::ValidationError)?;
        let title = trim_and_validate_field(&request.title, true)
            .map_err(|_| ServiceError::ValidationError("Title cannot be empty".to_string()))?;

        Ok(Self {
            tv_id: request.tv_id,
            start_date,
            end_date,
            title,
            url: request.url.trim().to_string(),
            description: trim_optional_field(request.description.as_ref()),
            price,
        })
    }
}

#[derive(Clone)]
pub struct SubscriptionService {
    diesel_pool: DieselPool,
    notifications: NotificationService,
    default_revenue_share: BigDecimal,
}

impl SubscriptionService {
    pub fn new(
        diesel_pool: DieselPool,
        notifications: NotificationService,
        default_revenue_share: BigDecimal,
    ) -> Self {
        Self {
            diesel_pool,
            notifications,
            default_revenue_share,
        }
    }

    /// Debit the advertiser and place the link. Checks run in the order
    /// dates, balance, screen; any failure leaves nothing written.
    #[instrument(skip(self, request))]
    pub async fn purchase(
        &self,
        advertiser_id: i32,
        request: CreateSubscriptionRequest,
    ) -> Result<SubscriptionPurchase, ServiceError> {
        let placement = Placement::parse(request)?;
        let default_share = self.default_revenue_share.clone();

        let mut conn = self.diesel_pool.get().await?;
        let (subscription, link, balance, advertiser, tv) = conn
            .transaction::<_, ServiceError, _>(|tx| {
                Box::pin(async move {
                    let advertiser = User::find_for_update(tx, advertiser_id).await?;
                    if advertiser.balance < placement.price {
                        return Err(ServiceError::InsufficientFunds);
                    }

                    let tv = Tv::find_by_id(tx, placement.tv_id)
                        .await?
                        .filter(|tv| tv.is_active)
                        .ok_or(ServiceError::TvUnavailable)?;

                    let share = tv.revenue_share.as_ref().unwrap_or(&default_share);
                    let venue_payout = venue_payout_for(&placement.price, Some(share));

                    let balance = User::debit_balance(tx, advertiser_id, &placement.price).await?;

                    let subscription = Subscription::create(
                        tx,
                        NewSubscription {
                            advertiser_id,
                            tv_id: tv.id,
                            payment_id: None,
                            start_date: placement.start_date,
                            end_date: placement.end_date,
                            price: placement.price.clone(),
                            venue_payout,
                            venue_payout_status: VenuePayoutStatus::Pending.as_str().to_string(),
                        },
                    )
                    .await?;

                    let link = TvLink::create(
                        tx,
                        NewTvLink {
                            tv_id: tv.id,
                            advertiser_id: Some(advertiser_id),
                            advertiser_name: Some(advertiser.display_name()),
                            title: placement.title,
                            url: placement.url,
                            description: placement.description,
                            position: 0,
                            is_active: true,
                        },
                    )
                    .await?;

                    Ok((subscription, link, balance, advertiser, tv))
                })
            })
            .await?;

        AuditLogger::log(
            AuditLog::new(AuditAction::SubscriptionPurchased, "subscription")
                .actor(advertiser_id)
                .resource(subscription.id)
                .amount(&subscription.price)
                .details(format!(
                    "tv={} venue_payout={} balance={}",
                    subscription.tv_id, subscription.venue_payout, balance
                )),
        );
        info!(
            "Advertiser {} bought subscription {} on TV {}",
            advertiser_id, subscription.id, subscription.tv_id
        );

        self.notifications.subscription_created(
            &advertiser.display_name(),
            &tv.name,
            &subscription.price,
            subscription.start_date,
            subscription.end_date,
        );

        let today = Utc::now().date_naive();
        Ok(SubscriptionPurchase {
            subscription: subscription.view(today),
            link,
            balance,
        })
    }

    /// Own subscriptions with activity derived for `today`
    pub async fn list_for_advertiser(
        &self,
        advertiser_id: i32,
        today: NaiveDate,
    ) -> Result<Vec<SubscriptionView>, ServiceError> {
        let mut conn = self.diesel_pool.get().await?;
        Ok(Subscription::find_by_advertiser(&mut conn, advertiser_id)
            .await?
            .into_iter()
            .map(|s| s.view(today))
            .collect())
    }
}
