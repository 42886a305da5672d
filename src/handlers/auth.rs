// Registration, login and the caller's own account

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use diesel_async::AsyncConnection;
use serde::Serialize;
use tracing::{info, warn};
use validator::Validate;

use super::ApiResponse;
use crate::{
    app::AppState,
    middleware::AuthenticatedUser,
    models::{
        LoginRequest, NewUser, RegisterRequest, SwitchRoleRequest, TokenResponse, User, UserError,
    },
    utils::{
        audit_logger::{AuditAction, AuditLog, AuditLogger},
        hash_password, trim_optional_field, verify_password, PasswordConfig, ServiceError,
    },
};

#[derive(Debug, Serialize)]
pub struct AccountResponse {
    #[serde(flatten)]
    pub user: User,
    pub display_name: String,
}

#[derive(Debug, Serialize)]
pub struct AuthPayload {
    #[serde(flatten)]
    pub token: TokenResponse,
    pub user: User,
}

fn issue_token(state: &AppState, user: &User) -> Result<TokenResponse, ServiceError> {
    let access_token = state.jwt_service.token_for_user(user).map_err(|e| {
        warn!("Failed to sign token for user {}: {}", user.id, e);
        ServiceError::InternalError
    })?;

    Ok(TokenResponse {
        access_token,
        token_type: "Bearer".to_string(),
        expires_in: state.jwt_service.access_token_expiry(),
        role: user.role_enum(),
    })
}

/// POST /v1/auth/register
pub async fn register(
    State(state): State<AppState>,
    Json(request): Json<RegisterRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    request.validate()?;
    if !request.role.is_self_service() {
        return Err(ServiceError::Forbidden(
            "Role cannot be chosen at registration".to_string(),
        ));
    }

    let password_config =
        PasswordConfig::with_memory_cost(state.config.security.password_memory_cost);
    let password_hash = hash_password(&request.password, &password_config).map_err(|e| {
        warn!("Password hashing failed: {}", e);
        ServiceError::InternalError
    })?;

    let mut conn = state.diesel_pool.get().await?;
    let user = User::create(
        &mut conn,
        NewUser {
            email: request.email.trim().to_lowercase(),
            password_hash,
            first_name: trim_optional_field(request.first_name.as_ref()),
            last_name: trim_optional_field(request.last_name.as_ref()),
            phone: trim_optional_field(request.phone.as_ref()),
            role: request.role,
            company_name: trim_optional_field(request.company_name.as_ref()),
        },
    )
    .await?;

    info!("Registered user {} as {}", user.id, user.role);
    let token = issue_token(&state, &user)?;

    Ok((
        StatusCode::CREATED,
        ApiResponse::ok(AuthPayload { token, user }, "Registration successful"),
    ))
}

/// POST /v1/auth/login
pub async fn login(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    let mut conn = state.diesel_pool.get().await?;

    // Same answer for unknown email and wrong password
    let user = match User::find_by_email(&mut conn, request.email.trim()).await {
        Ok(user) => user,
        Err(UserError::NotFound) => return Err(ServiceError::Unauthorized),
        Err(e) => return Err(e.into()),
    };

    let valid = verify_password(&request.password, &user.password_hash).unwrap_or_else(|e| {
        warn!("Stored hash for user {} unreadable: {}", user.id, e);
        false
    });
    if !valid || !user.is_active {
        return Err(ServiceError::Unauthorized);
    }

    let token = issue_token(&state, &user)?;
    Ok(ApiResponse::ok(AuthPayload { token, user }, "Login successful"))
}

/// GET /v1/account/me
pub async fn me(
    State(state): State<AppState>,
    auth_user: AuthenticatedUser,
) -> Result<impl IntoResponse, ServiceError> {
    let mut conn = state.diesel_pool.get().await?;
    let user = User::find_by_id(&mut conn, auth_user.user_id).await?;

    Ok(ApiResponse::ok(
        AccountResponse {
            display_name: user.display_name(),
            user,
        },
        "Account retrieved",
    ))
}

/// POST /v1/account/role
///
/// The stored role is checked under a row lock, not the token's copy, so a
/// stale token cannot move an admin.
pub async fn switch_role(
    State(state): State<AppState>,
    auth_user: AuthenticatedUser,
    Json(request): Json<SwitchRoleRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    let user_id = auth_user.user_id;
    let target = request.role;

    let mut conn = state.diesel_pool.get().await?;
    let (previous, user) = conn
        .transaction::<_, ServiceError, _>(|tx| {
            Box::pin(async move {
                let previous = User::find_for_update(tx, user_id).await?.role_enum();
                let user = User::switch_role(tx, user_id, target).await?;
                Ok((previous, user))
            })
        })
        .await?;

    let changed = previous != user.role_enum();
    if changed {
        AuditLogger::log(
            AuditLog::new(AuditAction::RoleSwitched, "user")
                .actor(user_id)
                .resource(user_id)
                .details(format!("{} -> {}", previous.as_str(), user.role)),
        );
    }

    let token = issue_token(&state, &user)?;
    let message = if changed { "Role switched" } else { "Role unchanged" };
    Ok(ApiResponse::ok(AuthPayload { token, user }, message))
}
