// Business logic layer. Handlers stay thin and call into these.

pub mod gateway;
pub mod jwt;
pub mod notification;
pub mod oauth_state;
pub mod payment;
pub mod payout;
pub mod subscription;

pub use gateway::{GatewayError, MockGateway, PaymentGateway, YookassaGateway};
pub use jwt::{JwtConfig, JwtError, JwtService};
pub use notification::NotificationService;
pub use oauth_state::{spawn_purge_task, OAuthStateService, PendingOAuth};
pub use payment::{LegacyAck, PaymentCreated, PaymentService, Settlement, SyncResult, WebhookAck};
pub use payout::{PayoutService, VenueEarnings};
pub use subscription::{SubscriptionPurchase, SubscriptionService};
