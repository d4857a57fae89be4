use crate::db::ApplicationRepository;
use crate::error::{AuthzError, Result};
use crate::models::{
    Application, ApplicationSummary, AuditStatus, CreateApplicationRequest,
    UpdateApplicationRequest,
};
use crate::security::generate_api_key;
use crate::services::audit_log::{AuditEvent, AuditLog, RequestContext};
use std::sync::Arc;
use validator::Validate;

const RESOURCE: &str = "applications";

/// Tenant lifecycle. Full `Application` rows (with API key) are only handed
/// out by `create` and `regenerate_api_key`.
pub struct ApplicationService {
    applications: Arc<dyn ApplicationRepository>,
    audit: Arc<AuditLog>,
}

impl ApplicationService {
    pub fn new(applications: Arc<dyn ApplicationRepository>, audit: Arc<AuditLog>) -> Self {
        Self {
            applications,
            audit,
        }
    }

    pub async fn create(
        &self,
        request: CreateApplicationRequest,
        ctx: &RequestContext,
    ) -> Result<Application> {
        request.validate()?;

        let api_key = generate_api_key();
        let application = self
            .applications
            .create(&request.name, request.description.as_deref(), &api_key)
            .await?;

        tracing::info!(application_id = application.id, "Application created");
        self.audit
            .record_best_effort(
                AuditEvent::new("application_created", RESOURCE, AuditStatus::Success, ctx)
                    .application(application.id)
                    .detail("name", application.name.clone()),
            )
            .await;

        Ok(application)
    }

    pub async fn update(
        &self,
        id: i64,
        request: UpdateApplicationRequest,
        ctx: &RequestContext,
    ) -> Result<ApplicationSummary> {
        request.validate()?;
        if request.is_empty() {
            return Err(AuthzError::Validation("no fields to update".to_string()));
        }

        let application = self
            .applications
            .update(id, request.name.as_deref(), request.description.as_deref())
            .await?
            .ok_or_else(|| AuthzError::NotFound("Application".to_string()))?;

        self.audit
            .record_best_effort(
                AuditEvent::new("application_updated", RESOURCE, AuditStatus::Success, ctx)
                    .application(id),
            )
            .await;

        Ok(application.into())
    }

    /// Removes the application together with its roles and permissions.
    pub async fn delete(&self, id: i64, ctx: &RequestContext) -> Result<()> {
        if !self.applications.delete(id).await? {
            return Err(AuthzError::NotFound("Application".to_string()));
        }

        tracing::info!(application_id = id, "Application deleted");
        self.audit
            .record_best_effort(
                AuditEvent::new("application_deleted", RESOURCE, AuditStatus::Success, ctx)
                    .application(id),
            )
            .await;

        Ok(())
    }

    pub async fn get_by_id(&self, id: i64) -> Result<ApplicationSummary> {
        self.applications
            .find_by_id(id)
            .await?
            .map(ApplicationSummary::from)
            .ok_or_else(|| AuthzError::NotFound("Application".to_string()))
    }

    pub async fn get_by_api_key(&self, api_key: &str) -> Result<ApplicationSummary> {
        self.applications
            .find_by_api_key(api_key)
            .await?
            .map(ApplicationSummary::from)
            .ok_or_else(|| AuthzError::NotFound("Application".to_string()))
    }

    /// Replace the API key; the previous key stops matching immediately.
    pub async fn regenerate_api_key(&self, id: i64, ctx: &RequestContext) -> Result<Application> {
        let api_key = generate_api_key();
        let application = self
            .applications
            .set_api_key(id, &api_key)
            .await?
            .ok_or_else(|| AuthzError::NotFound("Application".to_string()))?;

        tracing::info!(application_id = id, "API key regenerated");
        self.audit
            .record_best_effort(
                AuditEvent::new("api_key_regenerated", RESOURCE, AuditStatus::Success, ctx)
                    .application(id),
            )
            .await;

        Ok(application)
    }
}
