use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Role {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub application_id: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateRoleRequest {
    #[validate(
        length(min = 3, max = 50, message = "must be between 3 and 50 characters"),
        custom(function = "crate::models::validate_identifier")
    )]
    pub name: String,
    #[validate(length(max = 200, message = "cannot exceed 200 characters"))]
    pub description: Option<String>,
}

/// Partial update; absent fields are left unchanged.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct UpdateRoleRequest {
    #[validate(
        length(min = 3, max = 50, message = "must be between 3 and 50 characters"),
        custom(function = "crate::models::validate_identifier")
    )]
    pub name: Option<String>,
    #[validate(length(max = 200, message = "cannot exceed 200 characters"))]
    pub description: Option<String>,
}

impl UpdateRoleRequest {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.description.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_name_rules() {
        let ok = CreateRoleRequest {
            name: "editor".into(),
            description: None,
        };
        assert!(ok.validate().is_ok());

        let short = CreateRoleRequest {
            name: "ed".into(),
            description: None,
        };
        assert!(short.validate().is_err());

        let bad_chars = CreateRoleRequest {
            name: "editor-in-chief".into(),
            description: None,
        };
        assert!(bad_chars.validate().is_err());

        let long_description = CreateRoleRequest {
            name: "editor".into(),
            description: Some("x".repeat(201)),
        };
        assert!(long_description.validate().is_err());
    }

    #[test]
    fn test_update_validates_present_fields_only() {
        assert!(UpdateRoleRequest::default().validate().is_ok());
        assert!(UpdateRoleRequest::default().is_empty());

        let bad = UpdateRoleRequest {
            name: Some("a".into()),
            description: None,
        };
        assert!(bad.validate().is_err());
    }
}
