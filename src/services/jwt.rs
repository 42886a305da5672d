// Access token issuing and validation (HS256)
// The role travels in the token; switching role issues a fresh token.

use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;
use uuid::Uuid;

use crate::models::auth::AccessTokenClaims;
use crate::models::user::{Role, User};

#[derive(Error, Debug)]
pub enum JwtError {
    #[error("JWT encoding error: {0}")]
    EncodingError(String),

    #[error("Key generation error: {0}")]
    KeyGenerationError(String),

    #[error("Token expired")]
    TokenExpired,

    #[error("Invalid token")]
    InvalidToken,
}

impl From<jsonwebtoken::errors::Error> for JwtError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        use jsonwebtoken::errors::ErrorKind;
        match err.kind() {
            ErrorKind::ExpiredSignature => JwtError::TokenExpired,
            ErrorKind::InvalidToken
            | ErrorKind::InvalidSignature
            | ErrorKind::InvalidAudience
            | ErrorKind::InvalidIssuer
            | ErrorKind::Base64(_)
            | ErrorKind::Json(_)
            | ErrorKind::Utf8(_) => JwtError::InvalidToken,
            _ => JwtError::EncodingError(err.to_string()),
        }
    }
}

#[derive(Clone)]
pub struct JwtConfig {
    pub access_token_expiry: u64,
    pub algorithm: Algorithm,
    pub audience: String,
    pub issuer: String,
    pub access_encoding_key: EncodingKey,
    pub access_decoding_key: DecodingKey,
}

impl std::fmt::Debug for JwtConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtConfig")
            .field("access_token_expiry", &self.access_token_expiry)
            .field("algorithm", &self.algorithm)
            .field("audience", &self.audience)
            .field("issuer", &self.issuer)
            .field("access_encoding_key", &"<redacted>")
            .field("access_decoding_key", &"<redacted>")
            .finish()
    }
}

impl JwtConfig {
    fn build_from_params(
        access_secret: &str,
        access_expiry: u64,
        audience: String,
        issuer: String,
    ) -> Self {
        JwtConfig {
            access_token_expiry: access_expiry,
            algorithm: Algorithm::HS256,
            audience,
            issuer,
            access_encoding_key: EncodingKey::from_secret(access_secret.as_bytes()),
            access_decoding_key: DecodingKey::from_secret(access_secret.as_bytes()),
        }
    }

    /// Create JWT config from centralized app configuration
    pub fn from_env() -> Self {
        let crate::app_config::JwtConfig {
            access_secret,
            access_expiry,
            audience,
            issuer,
        } = &crate::CONFIG.jwt;

        Self::build_from_params(access_secret, *access_expiry, audience.clone(), issuer.clone())
    }

    /// Deterministic config that never touches the environment
    pub fn for_test() -> Self {
        Self::build_from_params(
            "test-access-secret-hs256-at-least-32-chars",
            3600,
            "test.xk-media.ru".to_string(),
            "test.xk-media.ru".to_string(),
        )
    }
}

pub struct JwtService {
    config: JwtConfig,
}

impl JwtService {
    pub fn new(config: JwtConfig) -> Self {
        Self { config }
    }

    pub fn from_env() -> Self {
        Self::new(JwtConfig::from_env())
    }

    /// Lifetime of issued tokens in seconds
    pub fn access_token_expiry(&self) -> u64 {
        self.config.access_token_expiry
    }

    pub fn generate_access_token(
        &self,
        user_id: i32,
        email: &str,
        role: Role,
    ) -> Result<String, JwtError> {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_err(|e| JwtError::KeyGenerationError(e.to_string()))?
            .as_secs();

        let claims = AccessTokenClaims::new(
            user_id,
            Uuid::new_v4().to_string(),
            email.to_string(),
            role,
            self.config.audience.clone(),
            self.config.issuer.clone(),
            now,
            now + self.config.access_token_expiry,
        );

        encode(
            &Header::new(self.config.algorithm),
            &claims,
            &self.config.access_encoding_key,
        )
        .map_err(Into::into)
    }

    /// Token for a user as currently stored
    pub fn token_for_user(&self, user: &User) -> Result<String, JwtError> {
        self.generate_access_token(user.id, &user.email, user.role_enum())
    }

    /// Signature, audience, issuer and expiry are all checked; no leeway
    pub fn validate_access_token(&self, token: &str) -> Result<AccessTokenClaims, JwtError> {
        let mut validation = Validation::new(self.config.algorithm);
        validation.set_audience(&[self.config.audience.clone()]);
        validation.set_issuer(&[self.config.issuer.clone()]);
        validation.validate_exp = true;
        validation.validate_nbf = false;
        validation.leeway = 0;

        let token_data =
            decode::<AccessTokenClaims>(token, &self.config.access_decoding_key, &validation)?;

        Ok(token_data.claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_round_trip_carries_role() {
        let service = JwtService::new(JwtConfig::for_test());

        let token = service
            .generate_access_token(17, "venue@example.com", Role::Venue)
            .unwrap();
        let claims = service.validate_access_token(&token).unwrap();

        assert_eq!(claims.sub, "17");
        assert_eq!(claims.email, "venue@example.com");
        assert_eq!(claims.role, Role::Venue);
        assert_eq!(claims.exp - claims.iat, 3600);
    }

    #[test]
    fn test_wrong_audience_rejected() {
        let issuer = JwtService::new(JwtConfig::for_test());
        let mut other = JwtConfig::for_test();
        other.audience = "someone-else".to_string();
        let validator = JwtService::new(other);

        let token = issuer
            .generate_access_token(1, "a@example.com", Role::Advertiser)
            .unwrap();
        assert!(matches!(
            validator.validate_access_token(&token),
            Err(JwtError::InvalidToken)
        ));
    }

    #[test]
    fn test_garbage_token_rejected() {
        let service = JwtService::new(JwtConfig::for_test());
        assert!(service.validate_access_token("not.a.jwt").is_err());
    }
}
