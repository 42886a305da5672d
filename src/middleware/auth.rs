// Caller identity injected by `auth_middleware`, plus the role guards

use serde::{Deserialize, Serialize};

use crate::{models::Role, utils::service_error::ServiceError};

/// Authenticated user information extracted from JWT
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthenticatedUser {
    pub user_id: i32,
    pub token_id: String,
    pub email: String,
    pub role: Role,
    pub exp: u64,
}

impl AuthenticatedUser {
    /// 403 unless the token carries one of `allowed`
    pub fn require_role(&self, allowed: &[Role]) -> Result<(), ServiceError> {
        if allowed.contains(&self.role) {
            Ok(())
        } else {
            Err(ServiceError::Forbidden(format!(
                "Role '{}' cannot access this resource",
                self.role.as_str()
            )))
        }
    }

    pub fn require_admin(&self) -> Result<(), ServiceError> {
        self.require_role(&[Role::Admin])
    }

    pub fn require_advertiser(&self) -> Result<(), ServiceError> {
        self.require_role(&[Role::Advertiser])
    }

    pub fn require_venue(&self) -> Result<(), ServiceError> {
        self.require_role(&[Role::Venue])
    }
}
