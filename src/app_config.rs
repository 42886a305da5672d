// Centralized configuration management for the XK Media backend
// Load ALL env vars ONCE at startup

use bigdecimal::BigDecimal;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::env;
use std::str::FromStr;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingVar(String),
    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),
}

/// Global application configuration loaded once at startup
pub static CONFIG: Lazy<AppConfig> = Lazy::new(|| {
    // For tests, load .env file first
    #[cfg(test)]
    dotenv::dotenv().ok();

    AppConfig::from_env().expect("Failed to load configuration")
});

/// Complete application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    // Server
    pub bind_address: String,
    pub port: u16,
    pub environment: Environment,
    pub rust_log: String,

    // Database
    pub database_url: String,
    pub database_max_connections: u32,
    pub database_min_connections: u32,
    pub database_connect_timeout: u64,
    pub database_idle_timeout: u64,
    pub database_max_lifetime: u64,
    pub disable_embedded_migrations: bool,

    // Nested configs
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub jwt: JwtConfig,
    pub security: SecurityConfig,
    pub gateway: GatewayConfig,
    pub legacy_gateway: LegacyGatewayConfig,
    pub marketplace: MarketplaceConfig,
    pub oauth: OAuthConfig,
    pub notifications: NotificationConfig,
    pub features: FeatureConfig,
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
    pub environment: Environment,
    pub rust_log: String,
    pub cors_allowed_origins: Vec<String>,
}

/// Environment type
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum Environment {
    Development,
    Test,
    Staging,
    Production,
}

impl From<String> for Environment {
    fn from(s: String) -> Self {
        match s.to_lowercase().as_str() {
            "development" | "dev" => Environment::Development,
            "test" => Environment::Test,
            "staging" | "stage" => Environment::Staging,
            "production" | "prod" => Environment::Production,
            _ => Environment::Development,
        }
    }
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Environment::Development => write!(f, "development"),
            Environment::Test => write!(f, "test"),
            Environment::Staging => write!(f, "staging"),
            Environment::Production => write!(f, "production"),
        }
    }
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub connect_timeout: u64,
    pub idle_timeout: u64,
    pub max_lifetime: u64,
}

/// JWT configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JwtConfig {
    pub access_secret: String,
    pub access_expiry: u64,
    pub audience: String,
    pub issuer: String,
}

/// Security configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityConfig {
    /// Argon2 memory cost in KiB
    pub password_memory_cost: u32,
}

/// Hosted-page payment gateway (YooKassa API v3)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    pub shop_id: String,
    #[serde(skip_serializing)]
    pub secret_key: String,
    pub api_url: String,
    pub return_url: String,
    pub timeout_seconds: u64,
}

impl GatewayConfig {
    pub fn is_configured(&self) -> bool {
        !self.shop_id.is_empty() && !self.secret_key.is_empty()
    }
}

/// Deprecated form-post notification gateway (PayKeeper)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LegacyGatewayConfig {
    #[serde(skip_serializing)]
    pub secret_word: String,
}

/// Marketplace business constants
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketplaceConfig {
    /// Venue share in percent for screens with no explicit share
    pub default_revenue_share: BigDecimal,
    pub currency: String,
}

/// OAuth handshake settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OAuthConfig {
    pub state_ttl_seconds: u64,
    pub purge_interval_seconds: u64,
}

/// Email and Telegram notification channels; empty values disable a channel
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationConfig {
    #[serde(skip_serializing)]
    pub telegram_bot_token: String,
    pub telegram_chat_id: String,
    pub telegram_api_url: String,
    #[serde(skip_serializing)]
    pub email_api_key: String,
    pub email_api_url: String,
    pub from_email: String,
    pub from_name: String,
    pub admin_email: String,
    pub timeout_seconds: u64,
}

/// Feature flags
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureConfig {
    pub enable_notifications: bool,
    pub enable_request_tracing: bool,
}

impl AppConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        // Helper function to get required env var
        let get_required = |key: &str| -> Result<String, ConfigError> {
            env::var(key).map_err(|_| ConfigError::MissingVar(key.to_string()))
        };

        // Helper function to get optional env var with default
        let get_or_default = |key: &str, default: &str| -> String {
            env::var(key).unwrap_or_else(|_| default.to_string())
        };

        // Helper function to parse env var with default
        let parse_or_default = |key: &str, default: &str| -> Result<u32, ConfigError> {
            get_or_default(key, default).parse().map_err(|_| {
                ConfigError::InvalidValue(key.to_string(), "not a valid u32".to_string())
            })
        };

        let parse_u64_or_default = |key: &str, default: &str| -> Result<u64, ConfigError> {
            get_or_default(key, default).parse().map_err(|_| {
                ConfigError::InvalidValue(key.to_string(), "not a valid u64".to_string())
            })
        };

        let parse_bool_or_default = |key: &str, default: &str| -> bool {
            get_or_default(key, default).to_lowercase() == "true"
        };

        // Parse bind address to extract port
        let bind_address = get_or_default("BIND_ADDRESS", "0.0.0.0:8080");
        let port = bind_address
            .rsplit(':')
            .next()
            .and_then(|p| p.parse().ok())
            .unwrap_or(8080);

        let jwt_access_secret = get_required("JWT_ACCESS_SECRET")?;
        if jwt_access_secret.len() < 32 {
            return Err(ConfigError::InvalidValue(
                "JWT_ACCESS_SECRET".to_string(),
                "Secret must be at least 32 characters long".to_string(),
            ));
        }

        let environment = Environment::from(get_or_default("ENVIRONMENT", "development"));
        let rust_log = get_or_default("RUST_LOG", "info");

        let database_url = get_required("DATABASE_URL")?;
        let database_max_connections = parse_or_default("DATABASE_MAX_CONNECTIONS", "20")?;
        let database_min_connections = parse_or_default("DATABASE_MIN_CONNECTIONS", "2")?;
        let database_connect_timeout = parse_u64_or_default("DATABASE_CONNECT_TIMEOUT", "30")?;
        let database_idle_timeout = parse_u64_or_default("DATABASE_IDLE_TIMEOUT", "600")?;
        let database_max_lifetime = parse_u64_or_default("DATABASE_MAX_LIFETIME", "1800")?;
        let disable_embedded_migrations =
            parse_bool_or_default("DISABLE_EMBEDDED_MIGRATIONS", "false");

        let cors_allowed_origins: Vec<String> = get_or_default("CORS_ALLOWED_ORIGINS", "*")
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let server = ServerConfig {
            bind_address: bind_address.clone(),
            port,
            environment: environment.clone(),
            rust_log: rust_log.clone(),
            cors_allowed_origins,
        };

        let database = DatabaseConfig {
            url: database_url.clone(),
            max_connections: database_max_connections,
            min_connections: database_min_connections,
            connect_timeout: database_connect_timeout,
            idle_timeout: database_idle_timeout,
            max_lifetime: database_max_lifetime,
        };

        let jwt = JwtConfig {
            access_secret: jwt_access_secret,
            access_expiry: parse_u64_or_default("JWT_ACCESS_EXPIRY", "86400")?,
            audience: get_or_default("JWT_AUDIENCE", "xk-media.ru"),
            issuer: get_or_default("JWT_ISSUER", "xk-media.ru"),
        };

        let security = SecurityConfig {
            password_memory_cost: parse_or_default("PASSWORD_MEMORY_COST", "19456")?,
        };

        let gateway = GatewayConfig {
            shop_id: get_or_default("YOOKASSA_SHOP_ID", ""),
            secret_key: get_or_default("YOOKASSA_SECRET_KEY", ""),
            api_url: get_or_default("YOOKASSA_API_URL", "https://api.yookassa.ru/v3"),
            return_url: get_or_default(
                "YOOKASSA_RETURN_URL",
                "https://xk-media.ru/advertiser/payments",
            ),
            timeout_seconds: parse_u64_or_default("GATEWAY_TIMEOUT_SECONDS", "15")?,
        };

        let legacy_gateway = LegacyGatewayConfig {
            secret_word: get_or_default("PAYKEEPER_SECRET_WORD", ""),
        };

        let share_raw = get_or_default("DEFAULT_REVENUE_SHARE", "30");
        let default_revenue_share = BigDecimal::from_str(&share_raw).map_err(|_| {
            ConfigError::InvalidValue(
                "DEFAULT_REVENUE_SHARE".to_string(),
                "not a valid decimal".to_string(),
            )
        })?;
        if default_revenue_share < BigDecimal::from(0)
            || default_revenue_share > BigDecimal::from(100)
        {
            return Err(ConfigError::InvalidValue(
                "DEFAULT_REVENUE_SHARE".to_string(),
                "must be between 0 and 100".to_string(),
            ));
        }

        let marketplace = MarketplaceConfig {
            default_revenue_share,
            currency: crate::models::CURRENCY_RUB.to_string(),
        };

        let oauth = OAuthConfig {
            state_ttl_seconds: parse_u64_or_default("OAUTH_STATE_TTL_SECONDS", "600")?,
            purge_interval_seconds: parse_u64_or_default("OAUTH_STATE_PURGE_INTERVAL", "300")?,
        };

        let notifications = NotificationConfig {
            telegram_bot_token: get_or_default("TELEGRAM_BOT_TOKEN", ""),
            telegram_chat_id: get_or_default("TELEGRAM_CHAT_ID", ""),
            telegram_api_url: get_or_default("TELEGRAM_API_URL", "https://api.telegram.org"),
            email_api_key: get_or_default("EMAIL_API_KEY", ""),
            email_api_url: get_or_default("EMAIL_API_URL", "https://api.resend.com/emails"),
            from_email: get_or_default("EMAIL_FROM_ADDRESS", "noreply@xk-media.ru"),
            from_name: get_or_default("EMAIL_FROM_NAME", "XK Media"),
            admin_email: get_or_default("ADMIN_NOTIFY_EMAIL", ""),
            timeout_seconds: parse_u64_or_default("NOTIFY_TIMEOUT_SECONDS", "10")?,
        };

        let features = FeatureConfig {
            enable_notifications: parse_bool_or_default("ENABLE_NOTIFICATIONS", "true"),
            enable_request_tracing: parse_bool_or_default("ENABLE_REQUEST_TRACING", "true"),
        };

        Ok(Self {
            bind_address,
            port,
            environment,
            rust_log,
            database_url,
            database_max_connections,
            database_min_connections,
            database_connect_timeout,
            database_idle_timeout,
            database_max_lifetime,
            disable_embedded_migrations,
            server,
            database,
            jwt,
            security,
            gateway,
            legacy_gateway,
            marketplace,
            oauth,
            notifications,
            features,
        })
    }

    /// Check if running in production
    pub fn is_production(&self) -> bool {
        self.environment == Environment::Production
    }

    /// Check if running in development
    pub fn is_development(&self) -> bool {
        self.environment == Environment::Development
    }
}

/// Get the global configuration instance
/// This is the primary way to access configuration throughout the app
pub fn config() -> &'static AppConfig {
    &CONFIG
}
