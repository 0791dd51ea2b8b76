use crate::database::error::DatabaseError;
use crate::database::repository::TransactionalRepository;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

/// Chat entity
///
/// One row per unordered member pair: `member_one` always holds the smaller
/// uuid, backed by a unique constraint. `last_message_*` is a denormalized
/// preview of the messages table for list rendering, never authoritative.
#[derive(Debug, Clone, FromRow, serde::Serialize)]
pub struct Chat {
    pub id: Uuid,
    pub member_one: Uuid,
    pub member_two: Uuid,
    pub is_accepted: bool,
    pub is_support: bool,
    pub last_message_at: Option<chrono::DateTime<chrono::Utc>>,
    pub last_message_text: Option<String>,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

impl Chat {
    pub fn has_member(&self, user_id: Uuid) -> bool {
        self.member_one == user_id || self.member_two == user_id
    }
}

/// Chat request entity
///
/// `chat_id` goes NULL when a rejected chat is deleted; the request row
/// itself survives as the audit record of the rejection.
#[derive(Debug, Clone, FromRow, serde::Serialize)]
pub struct ChatRequest {
    pub id: Uuid,
    pub chat_id: Option<Uuid>,
    pub sender_id: Uuid,
    pub receiver_id: Uuid,
    pub status: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatRequestStatus {
    Pending,
    Accepted,
    Rejected,
}

impl ChatRequestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChatRequestStatus::Pending => "pending",
            ChatRequestStatus::Accepted => "accepted",
            ChatRequestStatus::Rejected => "rejected",
        }
    }
}

/// Message entity
#[derive(Debug, Clone, FromRow, serde::Serialize)]
pub struct Message {
    pub id: Uuid,
    pub chat_id: Uuid,
    pub sender_id: Uuid,
    pub content: String,
    pub read: bool,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

/// Canonical storage order for an unordered member pair
pub fn canonical_pair(a: Uuid, b: Uuid) -> (Uuid, Uuid) {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}

/// Repository for chats, chat requests and messages
pub struct ChatRepository {
    pool: PgPool,
}

impl ChatRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn find_chat(&self, id: Uuid) -> Result<Option<Chat>, DatabaseError> {
        sqlx::query_as::<_, Chat>(
            "SELECT id, member_one, member_two, is_accepted, is_support,
                    last_message_at, last_message_text, created_at, updated_at
             FROM chats WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)
    }

    /// Find the chat between two users, regardless of argument order
    pub async fn find_between(&self, a: Uuid, b: Uuid) -> Result<Option<Chat>, DatabaseError> {
        let (member_one, member_two) = canonical_pair(a, b);
        sqlx::query_as::<_, Chat>(
            "SELECT id, member_one, member_two, is_accepted, is_support,
                    last_message_at, last_message_text, created_at, updated_at
             FROM chats WHERE member_one = $1 AND member_two = $2",
        )
        .bind(member_one)
        .bind(member_two)
        .fetch_optional(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)
    }

    /// Create an unaccepted chat and its pending request in one transaction
    pub async fn create_with_request(
        &self,
        sender_id: Uuid,
        receiver_id: Uuid,
    ) -> Result<(Chat, ChatRequest), DatabaseError> {
        let (member_one, member_two) = canonical_pair(sender_id, receiver_id);
        let mut tx = self.pool.begin().await.map_err(DatabaseError::from_sqlx)?;

        let chat = sqlx::query_as::<_, Chat>(
            "INSERT INTO chats (member_one, member_two, is_accepted, is_support)
             VALUES ($1, $2, FALSE, FALSE)
             RETURNING id, member_one, member_two, is_accepted, is_support,
                       last_message_at, last_message_text, created_at, updated_at",
        )
        .bind(member_one)
        .bind(member_two)
        .fetch_one(&mut *tx)
        .await
        .map_err(DatabaseError::from_sqlx)?;

        let request = sqlx::query_as::<_, ChatRequest>(
            "INSERT INTO chat_requests (chat_id, sender_id, receiver_id, status)
             VALUES ($1, $2, $3, 'pending')
             RETURNING id, chat_id, sender_id, receiver_id, status, created_at, updated_at",
        )
        .bind(chat.id)
        .bind(sender_id)
        .bind(receiver_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(DatabaseError::from_sqlx)?;

        tx.commit().await.map_err(DatabaseError::from_sqlx)?;
        Ok((chat, request))
    }

    /// Bootstrap a support chat: born accepted, with a welcome message
    pub async fn create_support_chat(
        &self,
        user_id: Uuid,
        support_user_id: Uuid,
        welcome: &str,
    ) -> Result<Chat, DatabaseError> {
        let (member_one, member_two) = canonical_pair(user_id, support_user_id);
        let mut tx = self.pool.begin().await.map_err(DatabaseError::from_sqlx)?;

        let chat = sqlx::query_as::<_, Chat>(
            "INSERT INTO chats (member_one, member_two, is_accepted, is_support)
             VALUES ($1, $2, TRUE, TRUE)
             RETURNING id, member_one, member_two, is_accepted, is_support,
                       last_message_at, last_message_text, created_at, updated_at",
        )
        .bind(member_one)
        .bind(member_two)
        .fetch_one(&mut *tx)
        .await
        .map_err(DatabaseError::from_sqlx)?;

        let message = sqlx::query_as::<_, Message>(
            "INSERT INTO messages (chat_id, sender_id, content)
             VALUES ($1, $2, $3)
             RETURNING id, chat_id, sender_id, content, read, created_at",
        )
        .bind(chat.id)
        .bind(support_user_id)
        .bind(welcome)
        .fetch_one(&mut *tx)
        .await
        .map_err(DatabaseError::from_sqlx)?;

        let chat = sqlx::query_as::<_, Chat>(
            "UPDATE chats
             SET last_message_at = $2, last_message_text = $3, updated_at = NOW()
             WHERE id = $1
             RETURNING id, member_one, member_two, is_accepted, is_support,
                       last_message_at, last_message_text, created_at, updated_at",
        )
        .bind(chat.id)
        .bind(message.created_at)
        .bind(&message.content)
        .fetch_one(&mut *tx)
        .await
        .map_err(DatabaseError::from_sqlx)?;

        tx.commit().await.map_err(DatabaseError::from_sqlx)?;
        Ok(chat)
    }

    pub async fn find_request(&self, id: Uuid) -> Result<Option<ChatRequest>, DatabaseError> {
        sqlx::query_as::<_, ChatRequest>(
            "SELECT id, chat_id, sender_id, receiver_id, status, created_at, updated_at
             FROM chat_requests WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)
    }

    /// Accept a pending request: request and chat flip together or not at all
    ///
    /// Returns false when the request was no longer pending (lost race).
    pub async fn accept_request(&self, request_id: Uuid) -> Result<bool, DatabaseError> {
        let mut tx = self.pool.begin().await.map_err(DatabaseError::from_sqlx)?;

        let chat_id: Option<Option<Uuid>> = sqlx::query_scalar(
            "UPDATE chat_requests
             SET status = 'accepted', updated_at = NOW()
             WHERE id = $1 AND status = 'pending'
             RETURNING chat_id",
        )
        .bind(request_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(DatabaseError::from_sqlx)?;

        let Some(Some(chat_id)) = chat_id else {
            tx.rollback().await.map_err(DatabaseError::from_sqlx)?;
            return Ok(false);
        };

        sqlx::query("UPDATE chats SET is_accepted = TRUE, updated_at = NOW() WHERE id = $1")
            .bind(chat_id)
            .execute(&mut *tx)
            .await
            .map_err(DatabaseError::from_sqlx)?;

        tx.commit().await.map_err(DatabaseError::from_sqlx)?;
        Ok(true)
    }

    /// Reject a pending request, then delete the chat and its messages
    ///
    /// The request row survives with status `rejected` (its chat_id is set
    /// NULL by the foreign key); the chat deletion is non-recoverable.
    pub async fn reject_request(&self, request_id: Uuid) -> Result<bool, DatabaseError> {
        let mut tx = self.pool.begin().await.map_err(DatabaseError::from_sqlx)?;

        let chat_id: Option<Option<Uuid>> = sqlx::query_scalar(
            "UPDATE chat_requests
             SET status = 'rejected', updated_at = NOW()
             WHERE id = $1 AND status = 'pending'
             RETURNING chat_id",
        )
        .bind(request_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(DatabaseError::from_sqlx)?;

        let Some(chat_id) = chat_id else {
            tx.rollback().await.map_err(DatabaseError::from_sqlx)?;
            return Ok(false);
        };

        if let Some(chat_id) = chat_id {
            sqlx::query("DELETE FROM chats WHERE id = $1")
                .bind(chat_id)
                .execute(&mut *tx)
                .await
                .map_err(DatabaseError::from_sqlx)?;
        }

        tx.commit().await.map_err(DatabaseError::from_sqlx)?;
        Ok(true)
    }

    pub async fn insert_message(
        &self,
        chat_id: Uuid,
        sender_id: Uuid,
        content: &str,
    ) -> Result<Message, DatabaseError> {
        sqlx::query_as::<_, Message>(
            "INSERT INTO messages (chat_id, sender_id, content)
             VALUES ($1, $2, $3)
             RETURNING id, chat_id, sender_id, content, read, created_at",
        )
        .bind(chat_id)
        .bind(sender_id)
        .bind(content)
        .fetch_one(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)
    }

    /// Refresh the denormalized chat preview
    pub async fn update_preview(
        &self,
        chat_id: Uuid,
        at: chrono::DateTime<chrono::Utc>,
        text: &str,
    ) -> Result<(), DatabaseError> {
        sqlx::query(
            "UPDATE chats
             SET last_message_at = $2, last_message_text = $3, updated_at = NOW()
             WHERE id = $1",
        )
        .bind(chat_id)
        .bind(at)
        .bind(text)
        .execute(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)?;
        Ok(())
    }

    /// Mark every unread message from the other party as read
    ///
    /// Scoped to `sender_id <> reader` so the reader's own sent messages
    /// are never touched. Returns the number of rows flipped.
    pub async fn mark_read(&self, chat_id: Uuid, reader: Uuid) -> Result<u64, DatabaseError> {
        let result = sqlx::query(
            "UPDATE messages
             SET read = TRUE
             WHERE chat_id = $1 AND sender_id <> $2 AND read = FALSE",
        )
        .bind(chat_id)
        .bind(reader)
        .execute(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)?;

        Ok(result.rows_affected())
    }

    /// List a user's accepted chats, most recently active first
    pub async fn list_accepted_for_user(&self, user_id: Uuid) -> Result<Vec<Chat>, DatabaseError> {
        sqlx::query_as::<_, Chat>(
            "SELECT id, member_one, member_two, is_accepted, is_support,
                    last_message_at, last_message_text, created_at, updated_at
             FROM chats
             WHERE (member_one = $1 OR member_two = $1) AND is_accepted = TRUE
             ORDER BY last_message_at DESC NULLS LAST, created_at DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)
    }

    pub async fn list_pending_requests_for_receiver(
        &self,
        user_id: Uuid,
    ) -> Result<Vec<ChatRequest>, DatabaseError> {
        sqlx::query_as::<_, ChatRequest>(
            "SELECT id, chat_id, sender_id, receiver_id, status, created_at, updated_at
             FROM chat_requests
             WHERE receiver_id = $1 AND status = 'pending'
             ORDER BY created_at DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)
    }

    /// Messages in display order
    pub async fn list_messages(&self, chat_id: Uuid) -> Result<Vec<Message>, DatabaseError> {
        sqlx::query_as::<_, Message>(
            "SELECT id, chat_id, sender_id, content, read, created_at
             FROM messages
             WHERE chat_id = $1
             ORDER BY created_at ASC",
        )
        .bind(chat_id)
        .fetch_all(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)
    }

    pub async fn count_pending_requests(&self, user_id: Uuid) -> Result<i64, DatabaseError> {
        sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM chat_requests WHERE receiver_id = $1 AND status = 'pending'",
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)
    }

    /// Unread messages addressed to the user across all their chats
    pub async fn count_unread_from_others(&self, user_id: Uuid) -> Result<i64, DatabaseError> {
        sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*)
             FROM messages m
             JOIN chats c ON c.id = m.chat_id
             WHERE (c.member_one = $1 OR c.member_two = $1)
               AND m.sender_id <> $1
               AND m.read = FALSE",
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)
    }
}

impl TransactionalRepository for ChatRepository {
    fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_pair_orders_uuids() {
        let a = Uuid::parse_str("00000000-0000-0000-0000-000000000001").unwrap();
        let b = Uuid::parse_str("00000000-0000-0000-0000-000000000002").unwrap();

        assert_eq!(canonical_pair(a, b), (a, b));
        assert_eq!(canonical_pair(b, a), (a, b));
    }

    #[test]
    fn canonical_pair_is_stable_for_equal_inputs() {
        let a = Uuid::new_v4();
        assert_eq!(canonical_pair(a, a), (a, a));
    }

    #[test]
    fn chat_membership_check() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let outsider = Uuid::new_v4();
        let (member_one, member_two) = canonical_pair(a, b);

        let chat = Chat {
            id: Uuid::new_v4(),
            member_one,
            member_two,
            is_accepted: false,
            is_support: false,
            last_message_at: None,
            last_message_text: None,
            created_at: chrono::Utc::now(),
            updated_at: chrono::Utc::now(),
        };

        assert!(chat.has_member(a));
        assert!(chat.has_member(b));
        assert!(!chat.has_member(outsider));
    }

    #[test]
    fn request_status_round_trips_as_str() {
        assert_eq!(ChatRequestStatus::Pending.as_str(), "pending");
        assert_eq!(ChatRequestStatus::Accepted.as_str(), "accepted");
        assert_eq!(ChatRequestStatus::Rejected.as_str(), "rejected");
    }
}
