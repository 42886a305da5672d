pub mod auth;
pub mod oauth_state;
pub mod payment;
pub mod payout;
pub mod subscription;
pub mod tv;
pub mod user;

// Re-export common types
pub use auth::*;
pub use oauth_state::{NewOAuthState, OAuthState};
pub use payment::{
    CreatePaymentRequest, GatewayNotification, LegacyNotification, ListPaymentsParams,
    ManualTopUpRequest, NewPayment, Payment, PaymentError, PaymentStats, PaymentStatus,
    SettlementRecord, CURRENCY_RUB, EVENT_PAYMENT_SUCCEEDED,
};
pub use payout::{
    CreatePayoutRequest, NewVenuePayout, PayoutError, PayoutStatus, UpdatePayoutStatusRequest,
    VenuePayout,
};
pub use subscription::{
    venue_payout_for, CreateSubscriptionRequest, NewSubscription, Subscription,
    SubscriptionView, VenuePayoutStatus, DEFAULT_REVENUE_SHARE_PERCENT,
};
pub use tv::{EquipmentType, NewTv, NewTvLink, Tv, TvLink};
pub use user::*;
