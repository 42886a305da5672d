// Utility modules for the XK Media backend

pub mod audit_logger;
pub mod password;
pub mod service_error;
pub mod signature;
pub mod validation;

pub use audit_logger::{AuditAction, AuditLog, AuditLogger};
pub use password::{hash_password, verify_password, PasswordConfig, PasswordError};
pub use service_error::ServiceError;
pub use validation::{
    parse_iso_date, trim_and_validate_field, trim_optional_field, validate_money,
};
