use super::PermissionRepository;
use crate::error::Result;
use crate::models::{Permission, UpdatePermissionRequest};
use async_trait::async_trait;
use sqlx::PgPool;
use std::sync::Arc;

pub struct PgPermissionRepository {
    pool: Arc<PgPool>,
}

impl PgPermissionRepository {
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PermissionRepository for PgPermissionRepository {
    async fn create(
        &self,
        application_id: i64,
        name: &str,
        description: Option<&str>,
        resource: &str,
        action: &str,
    ) -> Result<Permission> {
        let permission = sqlx::query_as::<_, Permission>(
            r#"
            INSERT INTO permissions (name, description, resource, action, application_id, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, NOW(), NOW())
            RETURNING id, name, description, resource, action, application_id, created_at, updated_at
            "#,
        )
        .bind(name)
        .bind(description)
        .bind(resource)
        .bind(action)
        .bind(application_id)
        .fetch_one(&*self.pool)
        .await?;

        Ok(permission)
    }

    async fn update(
        &self,
        id: i64,
        changes: &UpdatePermissionRequest,
    ) -> Result<Option<Permission>> {
        let permission = sqlx::query_as::<_, Permission>(
            r#"
            UPDATE permissions
            SET name = COALESCE($2, name),
                description = COALESCE($3, description),
                resource = COALESCE($4, resource),
                action = COALESCE($5, action),
                updated_at = NOW()
            WHERE id = $1
            RETURNING id, name, description, resource, action, application_id, created_at, updated_at
            "#,
        )
        .bind(id)
        .bind(changes.name.as_deref())
        .bind(changes.description.as_deref())
        .bind(changes.resource.as_deref())
        .bind(changes.action.as_deref())
        .fetch_optional(&*self.pool)
        .await?;

        Ok(permission)
    }

    async fn delete(&self, id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM permissions WHERE id = $1")
            .bind(id)
            .execute(&*self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<Permission>> {
        let permission = sqlx::query_as::<_, Permission>(
            r#"
            SELECT id, name, description, resource, action, application_id, created_at, updated_at
            FROM permissions
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&*self.pool)
        .await?;

        Ok(permission)
    }

    async fn list_by_application(&self, application_id: i64) -> Result<Vec<Permission>> {
        let permissions = sqlx::query_as::<_, Permission>(
            r#"
            SELECT id, name, description, resource, action, application_id, created_at, updated_at
            FROM permissions
            WHERE application_id = $1
            ORDER BY resource ASC, action ASC
            "#,
        )
        .bind(application_id)
        .fetch_all(&*self.pool)
        .await?;

        Ok(permissions)
    }

    async fn count_role_assignments(&self, permission_id: i64) -> Result<i64> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM role_permissions WHERE permission_id = $1",
        )
        .bind(permission_id)
        .fetch_one(&*self.pool)
        .await?;

        Ok(count)
    }

    async fn assign_to_role(&self, permission_id: i64, role_id: i64) -> Result<bool> {
        let result = sqlx::query(
            r#"
            INSERT INTO role_permissions (role_id, permission_id, created_at)
            VALUES ($1, $2, NOW())
            ON CONFLICT (role_id, permission_id) DO NOTHING
            "#,
        )
        .bind(role_id)
        .bind(permission_id)
        .execute(&*self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn remove_from_role(&self, permission_id: i64, role_id: i64) -> Result<bool> {
        let result =
            sqlx::query("DELETE FROM role_permissions WHERE role_id = $1 AND permission_id = $2")
                .bind(role_id)
                .bind(permission_id)
                .execute(&*self.pool)
                .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn permissions_for_role(
        &self,
        role_id: i64,
        application_id: i64,
    ) -> Result<Vec<Permission>> {
        let permissions = sqlx::query_as::<_, Permission>(
            r#"
            SELECT p.id, p.name, p.description, p.resource, p.action, p.application_id,
                   p.created_at, p.updated_at
            FROM permissions p
            JOIN role_permissions rp ON rp.permission_id = p.id
            WHERE rp.role_id = $1 AND p.application_id = $2
            ORDER BY p.resource ASC, p.action ASC
            "#,
        )
        .bind(role_id)
        .bind(application_id)
        .fetch_all(&*self.pool)
        .await?;

        Ok(permissions)
    }

    async fn user_has_permission(
        &self,
        user_id: i64,
        resource: &str,
        action: &str,
        application_id: i64,
    ) -> Result<bool> {
        let granted = sqlx::query_scalar::<_, bool>(
            r#"
            SELECT EXISTS(
                SELECT 1
                FROM permissions p
                JOIN role_permissions rp ON rp.permission_id = p.id
                JOIN user_roles ur ON ur.role_id = rp.role_id
                WHERE ur.user_id = $1
                  AND p.resource = $2
                  AND p.action = $3
                  AND p.application_id = $4
            )
            "#,
        )
        .bind(user_id)
        .bind(resource)
        .bind(action)
        .bind(application_id)
        .fetch_one(&*self.pool)
        .await?;

        Ok(granted)
    }
}
