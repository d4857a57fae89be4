use chrono::{DateTime, Utc};
use jwt_security::{TokenPair, TokenUser};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

/// User entity. Application membership is implied by role assignments.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub email: String,
    #[serde(skip_serializing, default)]
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn token_user(&self) -> TokenUser {
        TokenUser {
            id: self.id,
            username: self.username.clone(),
            email: self.email.clone(),
        }
    }

    pub fn summary(&self) -> UserSummary {
        UserSummary {
            id: self.id,
            username: self.username.clone(),
            email: self.email.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserSummary {
    pub id: i64,
    pub username: String,
    pub email: String,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateUserRequest {
    #[validate(
        length(min = 3, max = 50, message = "must be between 3 and 50 characters"),
        custom(function = "crate::models::validate_identifier")
    )]
    pub username: String,
    #[validate(email(message = "must be a valid email address"))]
    pub email: String,
    #[validate(length(min = 8, max = 128, message = "must be between 8 and 128 characters"))]
    pub password: String,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct UpdateUserRequest {
    #[validate(
        length(min = 3, max = 50, message = "must be between 3 and 50 characters"),
        custom(function = "crate::models::validate_identifier")
    )]
    pub username: Option<String>,
    #[validate(email(message = "must be a valid email address"))]
    pub email: Option<String>,
    #[validate(length(min = 8, max = 128, message = "must be between 8 and 128 characters"))]
    pub password: Option<String>,
}

impl UpdateUserRequest {
    pub fn is_empty(&self) -> bool {
        self.username.is_none() && self.email.is_none() && self.password.is_none()
    }
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(length(min = 1, max = 50))]
    pub username: String,
    #[validate(length(min = 1, max = 128))]
    pub password: String,
    pub application_id: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
    pub application_id: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginResponse {
    pub user: UserSummary,
    pub tokens: TokenPair,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_password_hash_never_serialized() {
        let user = User {
            id: 1,
            username: "alice".into(),
            email: "alice@example.com".into(),
            password_hash: "$argon2id$secret".into(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };

        let json = serde_json::to_string(&user).unwrap();
        assert!(!json.contains("argon2"));
        assert!(!json.contains("password"));
    }

    #[test]
    fn test_create_user_rules() {
        let valid = CreateUserRequest {
            username: "alice_01".into(),
            email: "alice@example.com".into(),
            password: "correct horse".into(),
        };
        assert!(valid.validate().is_ok());

        let bad_email = CreateUserRequest {
            email: "not-an-email".into(),
            ..valid.clone()
        };
        assert!(bad_email.validate().is_err());

        let short_password = CreateUserRequest {
            password: "short".into(),
            ..valid
        };
        assert!(short_password.validate().is_err());
    }
}
