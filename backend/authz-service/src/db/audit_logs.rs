use super::AuditRepository;
use crate::error::Result;
use crate::models::{AuditLogEntry, AuditQuery, NewAuditEntry};
use async_trait::async_trait;
use sqlx::{PgPool, Postgres, QueryBuilder};
use std::sync::Arc;

/// Append-only audit storage: inserts and reads only.
pub struct PgAuditRepository {
    pool: Arc<PgPool>,
}

impl PgAuditRepository {
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AuditRepository for PgAuditRepository {
    async fn insert(&self, entry: &NewAuditEntry) -> Result<i64> {
        let id = sqlx::query_scalar::<_, i64>(
            r#"
            INSERT INTO audit_logs (
                user_id, application_id, action, resource, ip_address,
                user_agent, status, details, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, NOW())
            RETURNING id
            "#,
        )
        .bind(entry.user_id)
        .bind(entry.application_id)
        .bind(&entry.action)
        .bind(&entry.resource)
        .bind(&entry.ip_address)
        .bind(entry.user_agent.as_deref())
        .bind(entry.status.as_str())
        .bind(sqlx::types::Json(&entry.details))
        .fetch_one(&*self.pool)
        .await?;

        Ok(id)
    }

    async fn query(
        &self,
        query: &AuditQuery,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<AuditLogEntry>> {
        let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(
            r#"
            SELECT id, application_id, user_id, action, resource, ip_address,
                   user_agent, status, details, created_at
            FROM audit_logs
            WHERE application_id = "#,
        );
        builder.push_bind(query.application_id);

        if let Some(user_id) = query.user_id {
            builder.push(" AND user_id = ").push_bind(user_id);
        }
        if let Some(action) = &query.action {
            builder.push(" AND action = ").push_bind(action.clone());
        }
        if let Some(start) = query.start_date {
            builder.push(" AND created_at >= ").push_bind(start);
        }
        if let Some(end) = query.end_date {
            builder.push(" AND created_at <= ").push_bind(end);
        }

        builder
            .push(" ORDER BY created_at DESC, id DESC LIMIT ")
            .push_bind(limit)
            .push(" OFFSET ")
            .push_bind(offset);

        let entries = builder
            .build_query_as::<AuditLogEntry>()
            .fetch_all(&*self.pool)
            .await?;

        Ok(entries)
    }

    async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(&*self.pool).await?;
        Ok(())
    }
}
