use super::ApplicationRepository;
use crate::error::Result;
use crate::models::Application;
use async_trait::async_trait;
use sqlx::PgPool;
use std::sync::Arc;

pub struct PgApplicationRepository {
    pool: Arc<PgPool>,
}

impl PgApplicationRepository {
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ApplicationRepository for PgApplicationRepository {
    async fn create(
        &self,
        name: &str,
        description: Option<&str>,
        api_key: &str,
    ) -> Result<Application> {
        let application = sqlx::query_as::<_, Application>(
            r#"
            INSERT INTO applications (name, description, api_key, created_at, updated_at)
            VALUES ($1, $2, $3, NOW(), NOW())
            RETURNING id, name, description, api_key, created_at, updated_at
            "#,
        )
        .bind(name)
        .bind(description)
        .bind(api_key)
        .fetch_one(&*self.pool)
        .await?;

        Ok(application)
    }

    async fn update(
        &self,
        id: i64,
        name: Option<&str>,
        description: Option<&str>,
    ) -> Result<Option<Application>> {
        let application = sqlx::query_as::<_, Application>(
            r#"
            UPDATE applications
            SET name = COALESCE($2, name),
                description = COALESCE($3, description),
                updated_at = NOW()
            WHERE id = $1
            RETURNING id, name, description, api_key, created_at, updated_at
            "#,
        )
        .bind(id)
        .bind(name)
        .bind(description)
        .fetch_optional(&*self.pool)
        .await?;

        Ok(application)
    }

    async fn delete(&self, id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM applications WHERE id = $1")
            .bind(id)
            .execute(&*self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<Application>> {
        let application = sqlx::query_as::<_, Application>(
            r#"
            SELECT id, name, description, api_key, created_at, updated_at
            FROM applications
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&*self.pool)
        .await?;

        Ok(application)
    }

    async fn find_by_api_key(&self, api_key: &str) -> Result<Option<Application>> {
        let application = sqlx::query_as::<_, Application>(
            r#"
            SELECT id, name, description, api_key, created_at, updated_at
            FROM applications
            WHERE api_key = $1
            "#,
        )
        .bind(api_key)
        .fetch_optional(&*self.pool)
        .await?;

        Ok(application)
    }

    async fn set_api_key(&self, id: i64, api_key: &str) -> Result<Option<Application>> {
        let application = sqlx::query_as::<_, Application>(
            r#"
            UPDATE applications
            SET api_key = $2, updated_at = NOW()
            WHERE id = $1
            RETURNING id, name, description, api_key, created_at, updated_at
            "#,
        )
        .bind(id)
        .bind(api_key)
        .fetch_optional(&*self.pool)
        .await?;

        Ok(application)
    }
}
