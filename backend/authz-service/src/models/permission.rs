use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Permission {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub resource: String,
    pub action: String,
    pub application_id: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreatePermissionRequest {
    #[validate(
        length(min = 3, max = 50, message = "must be between 3 and 50 characters"),
        custom(function = "crate::models::validate_identifier")
    )]
    pub name: String,
    #[validate(length(max = 200, message = "cannot exceed 200 characters"))]
    pub description: Option<String>,
    #[validate(
        length(min = 3, max = 50, message = "must be between 3 and 50 characters"),
        custom(function = "crate::models::validate_identifier")
    )]
    pub resource: String,
    #[validate(
        length(min = 3, max = 50, message = "must be between 3 and 50 characters"),
        custom(function = "crate::models::validate_identifier")
    )]
    pub action: String,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct UpdatePermissionRequest {
    #[validate(
        length(min = 3, max = 50, message = "must be between 3 and 50 characters"),
        custom(function = "crate::models::validate_identifier")
    )]
    pub name: Option<String>,
    #[validate(length(max = 200, message = "cannot exceed 200 characters"))]
    pub description: Option<String>,
    #[validate(
        length(min = 3, max = 50, message = "must be between 3 and 50 characters"),
        custom(function = "crate::models::validate_identifier")
    )]
    pub resource: Option<String>,
    #[validate(
        length(min = 3, max = 50, message = "must be between 3 and 50 characters"),
        custom(function = "crate::models::validate_identifier")
    )]
    pub action: Option<String>,
}

impl UpdatePermissionRequest {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.description.is_none()
            && self.resource.is_none()
            && self.action.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(name: &str, resource: &str, action: &str) -> CreatePermissionRequest {
        CreatePermissionRequest {
            name: name.into(),
            description: None,
            resource: resource.into(),
            action: action.into(),
        }
    }

    #[test]
    fn test_permission_field_rules() {
        assert!(request("orders_read", "orders", "read").validate().is_ok());
        assert!(request("orders_read", "or", "read").validate().is_err());
        assert!(request("orders_read", "orders", "re").validate().is_err());
        assert!(request("orders read", "orders", "read").validate().is_err());
        assert!(request("orders_read", "orders", &"r".repeat(51))
            .validate()
            .is_err());
    }
}
