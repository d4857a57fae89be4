pub mod application;
pub mod audit;
pub mod permission;
pub mod role;
pub mod user;

pub use application::{
    Application, ApplicationSummary, CreateApplicationRequest, UpdateApplicationRequest,
};
pub use audit::{AuditLogEntry, AuditQuery, AuditStatus, NewAuditEntry};
pub use permission::{CreatePermissionRequest, Permission, UpdatePermissionRequest};
pub use role::{CreateRoleRequest, Role, UpdateRoleRequest};
pub use user::{CreateUserRequest, LoginRequest, LoginResponse, RefreshRequest, UpdateUserRequest, User, UserSummary};

use validator::ValidationError;

/// Names, resources and actions: ASCII letters, digits and underscores.
pub fn validate_identifier(value: &str) -> Result<(), ValidationError> {
    if !value.is_empty()
        && value
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'_')
    {
        Ok(())
    } else {
        let mut err = ValidationError::new("identifier");
        err.message = Some("may only contain letters, numbers and underscores".into());
        Err(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identifier_charset() {
        assert!(validate_identifier("orders_read_2").is_ok());
        assert!(validate_identifier("orders-read").is_err());
        assert!(validate_identifier("orders read").is_err());
        assert!(validate_identifier("ordérs").is_err());
        assert!(validate_identifier("").is_err());
    }
}
