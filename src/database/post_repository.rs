use crate::database::error::DatabaseError;
use sqlx::PgPool;
use uuid::Uuid;

/// Repository for scheduled post publication
pub struct PostRepository {
    pool: PgPool,
}

impl PostRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Flip every due, not-yet-published post in one statement
    ///
    /// Idempotent by construction: a concurrent second invocation matches
    /// zero rows. Returns the ids that were published this pass.
    pub async fn publish_due(&self) -> Result<Vec<Uuid>, DatabaseError> {
        sqlx::query_scalar::<_, Uuid>(
            "UPDATE posts
             SET is_published = TRUE, updated_at = NOW()
             WHERE is_published = FALSE AND publish_at <= NOW()
             RETURNING id",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)
    }
}
