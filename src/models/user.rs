// User Database Model
// Accounts for all three marketplace roles, plus the balance ledger column

use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel_async::{AsyncPgConnection, RunQueryDsl};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::schema::users;

/// Account role. Exactly one per user.
#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, diesel::expression::AsExpression,
)]
#[diesel(sql_type = diesel::sql_types::Text)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Advertiser,
    Venue,
}

/// Why a role switch was refused
#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum RoleTransitionError {
    #[error("Administrators cannot switch role")]
    AdminLocked,

    #[error("Cannot switch to role '{0}'")]
    InvalidTarget(&'static str),
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Advertiser => "advertiser",
            Role::Venue => "venue",
        }
    }

    /// Roles that may be chosen at registration or reached by switching
    pub fn is_self_service(&self) -> bool {
        matches!(self, Role::Advertiser | Role::Venue)
    }

    /// The only way a stored role may change.
    ///
    /// Admin is terminal: no target is reachable from it, including itself.
    /// Advertiser and venue may move between each other; switching to the
    /// current role returns it unchanged.
    pub fn transition_to(self, target: Role) -> Result<Role, RoleTransitionError> {
        match (self, target) {
            (Role::Admin, _) => Err(RoleTransitionError::AdminLocked),
            (_, Role::Admin) => Err(RoleTransitionError::InvalidTarget(Role::Admin.as_str())),
            (current, target) if current == target => Ok(current),
            (_, target) => Ok(target),
        }
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "admin" => Ok(Role::Admin),
            "advertiser" => Ok(Role::Advertiser),
            "venue" => Ok(Role::Venue),
            _ => Err(format!("Invalid role: {}", s)),
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl<DB> diesel::deserialize::FromSql<diesel::sql_types::Text, DB> for Role
where
    DB: diesel::backend::Backend,
    String: diesel::deserialize::FromSql<diesel::sql_types::Text, DB>,
{
    fn from_sql(bytes: DB::RawValue<'_>) -> diesel::deserialize::Result<Self> {
        let value = String::from_sql(bytes)?;
        Self::from_str(&value).map_err(|e| e.into())
    }
}

impl<DB> diesel::serialize::ToSql<diesel::sql_types::Text, DB> for Role
where
    DB: diesel::backend::Backend,
    str: diesel::serialize::ToSql<diesel::sql_types::Text, DB>,
{
    fn to_sql<'b>(
        &'b self,
        out: &mut diesel::serialize::Output<'b, '_, DB>,
    ) -> diesel::serialize::Result {
        self.as_str().to_sql(out)
    }
}

/// User database model - queryable from database
#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Selectable, Identifiable)]
#[diesel(table_name = users)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct User {
    pub id: i32,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub phone: Option<String>,
    pub role: String, // Will convert to enum
    pub company_name: Option<String>,
    pub balance: BigDecimal,
    pub is_active: bool,
    pub is_verified: bool,
    pub oauth_provider: Option<String>,
    pub oauth_provider_id: Option<String>,
    pub oauth_email: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// New user for insertion
#[derive(Debug, Insertable)]
#[diesel(table_name = users)]
pub struct NewUser {
    pub email: String,
    pub password_hash: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub phone: Option<String>,
    pub role: Role,
    pub company_name: Option<String>,
}

/// User update struct
#[derive(Debug, Default, AsChangeset)]
#[diesel(table_name = users)]
pub struct UserUpdate {
    pub first_name: Option<Option<String>>,
    pub last_name: Option<Option<String>>,
    pub phone: Option<Option<String>>,
    pub company_name: Option<Option<String>>,
    pub is_active: Option<bool>,
    pub is_verified: Option<bool>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// Errors for user operations
#[derive(thiserror::Error, Debug)]
pub enum UserError {
    #[error("Database error: {0}")]
    Database(#[from] diesel::result::Error),

    #[error("User not found")]
    NotFound,

    #[error("Email already registered")]
    EmailTaken,

    #[error(transparent)]
    RoleTransition(#[from] RoleTransitionError),
}

impl User {
    /// Find user by ID
    pub async fn find_by_id(conn: &mut AsyncPgConnection, user_id: i32) -> Result<Self, UserError> {
        use crate::schema::users::dsl::*;

        users
            .filter(id.eq(user_id))
            .first::<User>(conn)
            .await
            .map_err(|e| match e {
                diesel::result::Error::NotFound => UserError::NotFound,
                _ => UserError::Database(e),
            })
    }

    /// Find and lock the user row for the rest of the surrounding transaction.
    /// Every balance read that precedes a balance write goes through here.
    pub async fn find_for_update(
        conn: &mut AsyncPgConnection,
        user_id: i32,
    ) -> Result<Self, UserError> {
        use crate::schema::users::dsl::*;

        users
            .filter(id.eq(user_id))
            .for_update()
            .first::<User>(conn)
            .await
            .map_err(|e| match e {
                diesel::result::Error::NotFound => UserError::NotFound,
                _ => UserError::Database(e),
            })
    }

    /// Find user by email (case-insensitive)
    pub async fn find_by_email(
        conn: &mut AsyncPgConnection,
        email_str: &str,
    ) -> Result<Self, UserError> {
        use crate::schema::users::dsl::*;
        use diesel::PgTextExpressionMethods;

        users
            .filter(email.ilike(email_str))
            .first::<User>(conn)
            .await
            .map_err(|e| match e {
                diesel::result::Error::NotFound => UserError::NotFound,
                _ => UserError::Database(e),
            })
    }

    /// Create a new user
    pub async fn create(
        conn: &mut AsyncPgConnection,
        new_user: NewUser,
    ) -> Result<Self, UserError> {
        use crate::schema::users::dsl::*;
        use diesel::result::{DatabaseErrorKind, Error};

        diesel::insert_into(users)
            .values(&new_user)
            .get_result::<User>(conn)
            .await
            .map_err(|e| match e {
                Error::DatabaseError(DatabaseErrorKind::UniqueViolation, _) => UserError::EmailTaken,
                _ => UserError::Database(e),
            })
    }

    /// Update user
    pub async fn update(
        conn: &mut AsyncPgConnection,
        user_id: i32,
        mut update: UserUpdate,
    ) -> Result<Self, UserError> {
        use crate::schema::users::dsl::*;

        update.updated_at = Some(Utc::now());
        diesel::update(users.filter(id.eq(user_id)))
            .set(&update)
            .get_result::<User>(conn)
            .await
            .map_err(|e| match e {
                diesel::result::Error::NotFound => UserError::NotFound,
                _ => UserError::Database(e),
            })
    }

    /// Add `amount` to the balance. Caller must hold the row lock.
    pub async fn credit_balance(
        conn: &mut AsyncPgConnection,
        user_id: i32,
        amount: &BigDecimal,
    ) -> Result<BigDecimal, UserError> {
        use crate::schema::users::dsl::*;

        diesel::update(users.filter(id.eq(user_id)))
            .set((balance.eq(balance + amount), updated_at.eq(Utc::now())))
            .returning(balance)
            .get_result::<BigDecimal>(conn)
            .await
            .map_err(|e| match e {
                diesel::result::Error::NotFound => UserError::NotFound,
                _ => UserError::Database(e),
            })
    }

    /// Subtract `amount` from the balance. Caller must hold the row lock and
    /// have checked sufficiency; the CHECK constraint rejects overdrafts anyway.
    pub async fn debit_balance(
        conn: &mut AsyncPgConnection,
        user_id: i32,
        amount: &BigDecimal,
    ) -> Result<BigDecimal, UserError> {
        use crate::schema::users::dsl::*;

        diesel::update(users.filter(id.eq(user_id)))
            .set((balance.eq(balance - amount), updated_at.eq(Utc::now())))
            .returning(balance)
            .get_result::<BigDecimal>(conn)
            .await
            .map_err(|e| match e {
                diesel::result::Error::NotFound => UserError::NotFound,
                _ => UserError::Database(e),
            })
    }

    /// Apply a role switch through [`Role::transition_to`] and persist it
    pub async fn switch_role(
        conn: &mut AsyncPgConnection,
        user_id: i32,
        target: Role,
    ) -> Result<Self, UserError> {
        use crate::schema::users::dsl::*;

        let user = Self::find_for_update(conn, user_id).await?;
        let next = user.role_enum().transition_to(target)?;
        if next == user.role_enum() {
            return Ok(user);
        }

        diesel::update(users.filter(id.eq(user_id)))
            .set((role.eq(next), updated_at.eq(Utc::now())))
            .get_result::<User>(conn)
            .await
            .map_err(UserError::Database)
    }

    pub async fn find_by_role(
        conn: &mut AsyncPgConnection,
        wanted: Role,
    ) -> Result<Vec<Self>, UserError> {
        use crate::schema::users::dsl::*;

        Ok(users
            .filter(role.eq(wanted))
            .order(id.asc())
            .load::<User>(conn)
            .await?)
    }

    /// Get user's role as enum
    pub fn role_enum(&self) -> Role {
        Role::from_str(&self.role).unwrap_or_else(|e| {
            tracing::warn!(
                "Invalid role '{}' for user {}, defaulting to Advertiser: {}",
                self.role,
                self.id,
                e
            );
            Role::Advertiser
        })
    }

    /// Name shown next to an advertiser's placements
    pub fn display_name(&self) -> String {
        if let Some(company) = self.company_name.as_deref().filter(|c| !c.trim().is_empty()) {
            return company.to_string();
        }

        let full_name = [self.first_name.as_deref(), self.last_name.as_deref()]
            .into_iter()
            .flatten()
            .filter(|part| !part.trim().is_empty())
            .collect::<Vec<_>>()
            .join(" ");

        if full_name.is_empty() {
            self.email.clone()
        } else {
            full_name
        }
    }
}
