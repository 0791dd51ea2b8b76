//! Shared repository traits
//!
//! Entities with guarded state machines (payments, chat requests) expose
//! bespoke conditional-write methods instead of generic update/delete, so
//! the read side is the only surface shared across repositories.

use async_trait::async_trait;
use sqlx::PgPool;

use super::error::DatabaseError;

#[async_trait]
pub trait Repository {
    type Entity;

    async fn find_by_id(&self, id: &str) -> Result<Option<Self::Entity>, DatabaseError>;

    async fn find_all(&self) -> Result<Vec<Self::Entity>, DatabaseError>;
}

/// Repositories that can participate in multi-statement transactions
pub trait TransactionalRepository {
    fn pool(&self) -> &PgPool;
}
