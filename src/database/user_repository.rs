use crate::database::error::DatabaseError;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

/// User entity, VIP-relevant subset
#[derive(Debug, Clone, FromRow, serde::Serialize)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub is_vip: bool,
    /// NULL means lifetime membership; the upgrade path always writes NULL.
    pub vip_until: Option<chrono::DateTime<chrono::Utc>>,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

/// Repository for user rows
pub struct UserRepository {
    pool: PgPool,
}

impl UserRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, DatabaseError> {
        sqlx::query_as::<_, User>(
            "SELECT id, email, is_vip, vip_until, created_at, updated_at
             FROM users WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)
    }

    /// Grant lifetime VIP as an idempotent set
    ///
    /// An absolute SET rather than any read-modify-write, so concurrent
    /// webhook deliveries converge on the same row state. Returns whether a
    /// row was matched.
    pub async fn grant_vip(&self, id: Uuid) -> Result<bool, DatabaseError> {
        let result = sqlx::query(
            "UPDATE users SET is_vip = TRUE, vip_until = NULL, updated_at = NOW() WHERE id = $1",
        )
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)?;

        Ok(result.rows_affected() > 0)
    }
}
