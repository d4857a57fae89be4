use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

/// Tenancy root
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Application {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    /// 32 random bytes, hex encoded
    pub api_key: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateApplicationRequest {
    #[validate(length(min = 3, max = 100, message = "must be between 3 and 100 characters"))]
    pub name: String,
    #[validate(length(max = 500, message = "cannot exceed 500 characters"))]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct UpdateApplicationRequest {
    #[validate(length(min = 3, max = 100, message = "must be between 3 and 100 characters"))]
    pub name: Option<String>,
    #[validate(length(max = 500, message = "cannot exceed 500 characters"))]
    pub description: Option<String>,
}

impl UpdateApplicationRequest {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.description.is_none()
    }
}

/// Application as returned by reads; the API key is only shown on create
/// and regenerate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicationSummary {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Application> for ApplicationSummary {
    fn from(app: Application) -> Self {
        Self {
            id: app.id,
            name: app.name,
            description: app.description,
            created_at: app.created_at,
            updated_at: app.updated_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn test_name_length_rules() {
        let ok = CreateApplicationRequest {
            name: "storefront".into(),
            description: None,
        };
        assert!(ok.validate().is_ok());

        let short = CreateApplicationRequest {
            name: "ab".into(),
            description: None,
        };
        assert!(short.validate().is_err());

        let long_description = UpdateApplicationRequest {
            name: None,
            description: Some("x".repeat(501)),
        };
        assert!(long_description.validate().is_err());
    }

    #[test]
    fn test_summary_hides_api_key() {
        let app = Application {
            id: 1,
            name: "storefront".into(),
            description: None,
            api_key: "ab".repeat(32),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };

        let json = serde_json::to_value(ApplicationSummary::from(app)).unwrap();
        assert!(json.get("api_key").is_none());
        assert_eq!(json["name"], "storefront");
    }
}
