use crate::database::error::{DatabaseError, DatabaseErrorKind};
use crate::database::repository::{Repository, TransactionalRepository};
use async_trait::async_trait;
use sqlx::{types::BigDecimal, FromRow, PgPool};
use uuid::Uuid;

/// Payment entity
///
/// One row per attempted purchase. `transaction_id` is the provider's track
/// id and is written at most once; `status` only ever leaves `pending`
/// through a conditional write, so terminal rows cannot be overwritten by a
/// late or duplicate callback.
#[derive(Debug, Clone, FromRow, serde::Serialize)]
pub struct Payment {
    pub id: Uuid,
    pub user_id: Uuid,
    pub amount: BigDecimal,
    pub currency: String,
    pub status: String,
    pub purpose: String,
    pub payment_method: String,
    pub transaction_id: Option<String>,
    pub description: Option<String>,
    pub metadata: serde_json::Value,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

/// Repository for payment rows
pub struct PaymentRepository {
    pool: PgPool,
}

impl PaymentRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create a new pending payment
    pub async fn create(
        &self,
        user_id: Uuid,
        amount: BigDecimal,
        currency: &str,
        purpose: &str,
        payment_method: &str,
        description: Option<&str>,
        metadata: serde_json::Value,
    ) -> Result<Payment, DatabaseError> {
        sqlx::query_as::<_, Payment>(
            "INSERT INTO payments
             (user_id, amount, currency, status, purpose, payment_method, description, metadata)
             VALUES ($1, $2, $3, 'pending', $4, $5, $6, $7)
             RETURNING id, user_id, amount, currency, status, purpose, payment_method,
                       transaction_id, description, metadata, created_at, updated_at",
        )
        .bind(user_id)
        .bind(amount)
        .bind(currency)
        .bind(purpose)
        .bind(payment_method)
        .bind(description)
        .bind(metadata)
        .fetch_one(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)
    }

    /// Attach the provider track id, write-once
    ///
    /// The conditional `transaction_id IS NULL` guard means the value never
    /// changes after the first gateway response. Returns `None` if the row
    /// is absent or the track id was already set.
    pub async fn attach_provider_reference(
        &self,
        id: Uuid,
        track_id: &str,
        metadata_patch: serde_json::Value,
    ) -> Result<Option<Payment>, DatabaseError> {
        sqlx::query_as::<_, Payment>(
            "UPDATE payments
             SET transaction_id = $2,
                 metadata = metadata || $3,
                 updated_at = NOW()
             WHERE id = $1 AND transaction_id IS NULL
             RETURNING id, user_id, amount, currency, status, purpose, payment_method,
                       transaction_id, description, metadata, created_at, updated_at",
        )
        .bind(id)
        .bind(track_id)
        .bind(metadata_patch)
        .fetch_optional(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)
    }

    /// Merge fields into the metadata audit bag, regardless of status
    pub async fn merge_metadata(
        &self,
        id: Uuid,
        metadata_patch: serde_json::Value,
    ) -> Result<Option<Payment>, DatabaseError> {
        sqlx::query_as::<_, Payment>(
            "UPDATE payments
             SET metadata = metadata || $2,
                 updated_at = NOW()
             WHERE id = $1
             RETURNING id, user_id, amount, currency, status, purpose, payment_method,
                       transaction_id, description, metadata, created_at, updated_at",
        )
        .bind(id)
        .bind(metadata_patch)
        .fetch_optional(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)
    }

    /// Conditionally transition a pending payment to a new status
    ///
    /// Returns `None` when the row is absent or no longer pending, which is
    /// how concurrent and out-of-order callbacks converge without
    /// overwriting a terminal status.
    pub async fn transition_from_pending(
        &self,
        id: Uuid,
        new_status: &str,
        metadata_patch: serde_json::Value,
    ) -> Result<Option<Payment>, DatabaseError> {
        sqlx::query_as::<_, Payment>(
            "UPDATE payments
             SET status = $2,
                 metadata = metadata || $3,
                 updated_at = NOW()
             WHERE id = $1 AND status = 'pending'
             RETURNING id, user_id, amount, currency, status, purpose, payment_method,
                       transaction_id, description, metadata, created_at, updated_at",
        )
        .bind(id)
        .bind(new_status)
        .bind(metadata_patch)
        .fetch_optional(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)
    }

    /// Find a payment scoped to its owner
    ///
    /// Absent and not-owned are indistinguishable to the caller.
    pub async fn find_by_id_for_user(
        &self,
        id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<Payment>, DatabaseError> {
        sqlx::query_as::<_, Payment>(
            "SELECT id, user_id, amount, currency, status, purpose, payment_method,
                    transaction_id, description, metadata, created_at, updated_at
             FROM payments
             WHERE id = $1 AND user_id = $2",
        )
        .bind(id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)
    }

    /// List a user's pending payments, newest first
    pub async fn find_pending_for_user(
        &self,
        user_id: Uuid,
    ) -> Result<Vec<Payment>, DatabaseError> {
        sqlx::query_as::<_, Payment>(
            "SELECT id, user_id, amount, currency, status, purpose, payment_method,
                    transaction_id, description, metadata, created_at, updated_at
             FROM payments
             WHERE user_id = $1 AND status = 'pending'
             ORDER BY created_at DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)
    }
}

#[async_trait]
impl Repository for PaymentRepository {
    type Entity = Payment;

    async fn find_by_id(&self, id: &str) -> Result<Option<Self::Entity>, DatabaseError> {
        let uuid = Uuid::parse_str(id).map_err(|e| {
            DatabaseError::new(DatabaseErrorKind::Unknown {
                message: format!("Invalid UUID: {}", e),
            })
        })?;
        sqlx::query_as::<_, Payment>(
            "SELECT id, user_id, amount, currency, status, purpose, payment_method,
                    transaction_id, description, metadata, created_at, updated_at
             FROM payments WHERE id = $1",
        )
        .bind(uuid)
        .fetch_optional(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)
    }

    async fn find_all(&self) -> Result<Vec<Self::Entity>, DatabaseError> {
        sqlx::query_as::<_, Payment>(
            "SELECT id, user_id, amount, currency, status, purpose, payment_method,
                    transaction_id, description, metadata, created_at, updated_at
             FROM payments ORDER BY created_at DESC",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)
    }
}

impl TransactionalRepository for PaymentRepository {
    fn pool(&self) -> &PgPool {
        &self.pool
    }
}
