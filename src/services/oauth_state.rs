// Single-use OAuth state tokens shared by every process through Postgres.
// Only the SHA-256 of a token is stored.

use base64::prelude::{Engine as _, BASE64_URL_SAFE_NO_PAD};
use chrono::{Duration, Utc};
use rand::RngCore;
use serde::Serialize;
use sha2::{Digest, Sha256};
use tracing::{debug, info, instrument, warn};

use crate::{
    db::DieselPool,
    models::{NewOAuthState, OAuthState, Role},
    utils::service_error::ServiceError,
};

const STATE_BYTES: usize = 32;

/// What a consumed state tells the callback
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PendingOAuth {
    pub provider: String,
    pub role: Role,
}

pub fn hash_state(state: &str) -> String {
    let digest = Sha256::digest(state.as_bytes());
    digest.iter().map(|b| format!("{:02x}", b)).collect()
}

fn generate_state() -> String {
    let mut bytes = [0u8; STATE_BYTES];
    rand::thread_rng().fill_bytes(&mut bytes);
    BASE64_URL_SAFE_NO_PAD.encode(bytes)
}

#[derive(Clone)]
pub struct OAuthStateService {
    diesel_pool: DieselPool,
    ttl: Duration,
}

impl OAuthStateService {
    pub fn new(diesel_pool: DieselPool, ttl_seconds: u64) -> Self {
        Self {
            diesel_pool,
            ttl: Duration::seconds(ttl_seconds as i64),
        }
    }

    /// Create and persist a fresh state for `provider` that will sign the user
    /// up with `role`. Admin can never be requested.
    #[instrument(skip(self))]
    pub async fn issue(&self, provider: &str, role: Role) -> Result<String, ServiceError> {
        if !role.is_self_service() {
            return Err(ServiceError::Forbidden(
                "Role cannot be requested through OAuth".to_string(),
            ));
        }

        let state = generate_state();
        let mut conn = self.diesel_pool.get().await?;

        OAuthState::insert(
            &mut conn,
            NewOAuthState {
                state_hash: hash_state(&state),
                provider: provider.to_string(),
                role: role.as_str().to_string(),
                expires_at: Utc::now() + self.ttl,
            },
        )
        .await?;

        debug!("Issued OAuth state for {}", provider);
        Ok(state)
    }

    /// Remove the state and return it if it was live. A second call with the
    /// same token, an expired token or a token for another provider all
    /// yield `None`.
    #[instrument(skip(self, state))]
    pub async fn consume(
        &self,
        provider: &str,
        state: &str,
    ) -> Result<Option<PendingOAuth>, ServiceError> {
        let mut conn = self.diesel_pool.get().await?;

        let Some(row) = OAuthState::take(&mut conn, &hash_state(state)).await? else {
            return Ok(None);
        };

        if row.is_expired_at(Utc::now()) {
            debug!("OAuth state expired");
            return Ok(None);
        }
        if row.provider != provider {
            warn!(
                "OAuth state issued for {} presented to {}",
                row.provider, provider
            );
            return Ok(None);
        }

        let role = row
            .role
            .parse::<Role>()
            .map_err(|_| ServiceError::InternalError)?;

        Ok(Some(PendingOAuth {
            provider: row.provider,
            role,
        }))
    }

    pub async fn purge_expired(&self) -> Result<usize, ServiceError> {
        let mut conn = self.diesel_pool.get().await?;
        Ok(OAuthState::delete_expired(&mut conn, Utc::now()).await?)
    }
}

/// Periodically drop expired states. Runs until the runtime shuts down.
pub fn spawn_purge_task(service: OAuthStateService, interval_seconds: u64) {
    tokio::spawn(async move {
        let mut interval =
            tokio::time::interval(std::time::Duration::from_secs(interval_seconds.max(1)));
        loop {
            interval.tick().await;
            match service.purge_expired().await {
                Ok(0) => {},
                Ok(removed) => info!("Purged {} expired OAuth states", removed),
                Err(e) => warn!("OAuth state purge failed: {}", e),
            }
        }
    });
}
