// Application state shared across handlers
use std::sync::Arc;

use crate::{
    app_config::AppConfig,
    db::DieselPool,
    services::{
        JwtService, NotificationService, OAuthStateService, PaymentService, PayoutService,
        SubscriptionService,
    },
};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub diesel_pool: DieselPool,
    pub jwt_service: Arc<JwtService>,
    pub payment_service: Arc<PaymentService>,
    pub subscription_service: Arc<SubscriptionService>,
    pub payout_service: Arc<PayoutService>,
    pub oauth_state_service: Arc<OAuthStateService>,
    pub notifications: NotificationService,
}
