// Pending OAuth handshakes, keyed by the SHA-256 of the state token

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel_async::{AsyncPgConnection, RunQueryDsl};
use serde::{Deserialize, Serialize};

use crate::schema::oauth_states;

#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Selectable, Identifiable)]
#[diesel(table_name = oauth_states)]
#[diesel(primary_key(state_hash))]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct OAuthState {
    pub state_hash: String,
    pub provider: String,
    pub role: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = oauth_states)]
pub struct NewOAuthState {
    pub state_hash: String,
    pub provider: String,
    pub role: String,
    pub expires_at: DateTime<Utc>,
}

impl OAuthState {
    pub async fn insert(
        conn: &mut AsyncPgConnection,
        new_state: NewOAuthState,
    ) -> Result<(), diesel::result::Error> {
        diesel::insert_into(oauth_states::table)
            .values(&new_state)
            .execute(conn)
            .await?;
        Ok(())
    }

    /// Delete the row and hand it back in one statement, so two callers
    /// racing on the same token cannot both receive it.
    pub async fn take(
        conn: &mut AsyncPgConnection,
        hash: &str,
    ) -> Result<Option<Self>, diesel::result::Error> {
        diesel::delete(oauth_states::table.filter(oauth_states::state_hash.eq(hash)))
            .returning(OAuthState::as_returning())
            .get_result::<OAuthState>(conn)
            .await
            .optional()
    }

    pub async fn delete_expired(
        conn: &mut AsyncPgConnection,
        now: DateTime<Utc>,
    ) -> Result<usize, diesel::result::Error> {
        diesel::delete(oauth_states::table.filter(oauth_states::expires_at.le(now)))
            .execute(conn)
            .await
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}
