use super::RoleRepository;
use crate::error::Result;
use crate::models::{Role, UpdateRoleRequest};
use async_trait::async_trait;
use sqlx::PgPool;
use std::sync::Arc;

pub struct PgRoleRepository {
    pool: Arc<PgPool>,
}

impl PgRoleRepository {
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RoleRepository for PgRoleRepository {
    async fn create(
        &self,
        application_id: i64,
        name: &str,
        description: Option<&str>,
    ) -> Result<Role> {
        let role = sqlx::query_as::<_, Role>(
            r#"
            INSERT INTO roles (name, description, application_id, created_at, updated_at)
            VALUES ($1, $2, $3, NOW(), NOW())
            RETURNING id, name, description, application_id, created_at, updated_at
            "#,
        )
        .bind(name)
        .bind(description)
        .bind(application_id)
        .fetch_one(&*self.pool)
        .await?;

        Ok(role)
    }

    async fn update(&self, id: i64, changes: &UpdateRoleRequest) -> Result<Option<Role>> {
        let role = sqlx::query_as::<_, Role>(
            r#"
            UPDATE roles
            SET name = COALESCE($2, name),
                description = COALESCE($3, description),
                updated_at = NOW()
            WHERE id = $1
            RETURNING id, name, description, application_id, created_at, updated_at
            "#,
        )
        .bind(id)
        .bind(changes.name.as_deref())
        .bind(changes.description.as_deref())
        .fetch_optional(&*self.pool)
        .await?;

        Ok(role)
    }

    async fn delete(&self, id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM roles WHERE id = $1")
            .bind(id)
            .execute(&*self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<Role>> {
        let role = sqlx::query_as::<_, Role>(
            r#"
            SELECT id, name, description, application_id, created_at, updated_at
            FROM roles
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&*self.pool)
        .await?;

        Ok(role)
    }

    async fn list_by_application(&self, application_id: i64) -> Result<Vec<Role>> {
        let roles = sqlx::query_as::<_, Role>(
            r#"
            SELECT id, name, description, application_id, created_at, updated_at
            FROM roles
            WHERE application_id = $1
            ORDER BY name ASC
            "#,
        )
        .bind(application_id)
        .fetch_all(&*self.pool)
        .await?;

        Ok(roles)
    }

    async fn count_user_assignments(&self, role_id: i64) -> Result<i64> {
        let count =
            sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM user_roles WHERE role_id = $1")
                .bind(role_id)
                .fetch_one(&*self.pool)
                .await?;

        Ok(count)
    }

    async fn assign_to_user(&self, role_id: i64, user_id: i64) -> Result<bool> {
        let result = sqlx::query(
            r#"
            INSERT INTO user_roles (user_id, role_id, created_at)
            VALUES ($1, $2, NOW())
            ON CONFLICT (user_id, role_id) DO NOTHING
            "#,
        )
        .bind(user_id)
        .bind(role_id)
        .execute(&*self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn remove_from_user(&self, role_id: i64, user_id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM user_roles WHERE user_id = $1 AND role_id = $2")
            .bind(user_id)
            .bind(role_id)
            .execute(&*self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn roles_for_user(&self, user_id: i64, application_id: i64) -> Result<Vec<Role>> {
        let roles = sqlx::query_as::<_, Role>(
            r#"
            SELECT r.id, r.name, r.description, r.application_id, r.created_at, r.updated_at
            FROM roles r
            JOIN user_roles ur ON ur.role_id = r.id
            WHERE ur.user_id = $1 AND r.application_id = $2
            ORDER BY r.name ASC
            "#,
        )
        .bind(user_id)
        .bind(application_id)
        .fetch_all(&*self.pool)
        .await?;

        Ok(roles)
    }
}
