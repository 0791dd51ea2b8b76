use crate::database::error::DatabaseError;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

/// Activity log entry
///
/// One row per meaningful transition. Duplicate webhook deliveries
/// short-circuit before reaching this repository, so rows never
/// double-count.
#[derive(Debug, Clone, FromRow, serde::Serialize)]
pub struct ActivityLog {
    pub id: Uuid,
    pub user_id: Option<Uuid>,
    pub action: String,
    pub details: serde_json::Value,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

pub struct ActivityLogRepository {
    pool: PgPool,
}

impl ActivityLogRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn record(
        &self,
        user_id: Option<Uuid>,
        action: &str,
        details: serde_json::Value,
    ) -> Result<ActivityLog, DatabaseError> {
        sqlx::query_as::<_, ActivityLog>(
            "INSERT INTO activity_logs (user_id, action, details)
             VALUES ($1, $2, $3)
             RETURNING id, user_id, action, details, created_at",
        )
        .bind(user_id)
        .bind(action)
        .bind(details)
        .fetch_one(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)
    }
}
