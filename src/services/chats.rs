//! Chat request workflow and message send path
//!
//! First contact between two users is gated behind a pending request; the
//! receiver accepts or rejects. Support chats are born accepted. Listing
//! endpoints are served through a per-service TTL cache invalidated by
//! member prefix on every mutation.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tracing::{error, info};
use uuid::Uuid;

use crate::cache::keys::chat as chat_keys;
use crate::cache::{Clock, TtlCache};
use crate::config::SupportConfig;
use crate::database::chat_repository::{
    Chat, ChatRepository, ChatRequest, ChatRequestStatus, Message,
};
use crate::error::{AppError, AppResult, DomainError, ValidationError};

/// Result of a create-or-get chat call
///
/// `request` is present only when the chat was newly created; an existing
/// chat is returned as-is, whatever its acceptance state.
#[derive(Debug, Serialize)]
pub struct ChatOpening {
    pub chat: Chat,
    pub request: Option<ChatRequest>,
}

/// Aggregate badge counts for the inbox icon
#[derive(Debug, Clone, Serialize)]
pub struct UnreadSummary {
    pub pending_requests: i64,
    pub unread_messages: i64,
    pub total: i64,
}

pub struct ChatService {
    chats: ChatRepository,
    support: SupportConfig,
    listing_cache: TtlCache<Vec<Chat>>,
    unread_cache: TtlCache<UnreadSummary>,
}

impl ChatService {
    pub fn new(
        chats: ChatRepository,
        support: SupportConfig,
        cache_ttl: Duration,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            chats,
            support,
            listing_cache: TtlCache::new(cache_ttl, clock.clone()),
            unread_cache: TtlCache::new(cache_ttl, clock),
        }
    }

    /// Create-or-get the chat between two users
    ///
    /// The existing chat is always looked up first, so calling this twice
    /// for the same pair returns the same chat id both times.
    pub async fn open_chat(&self, sender_id: Uuid, receiver_id: Uuid) -> AppResult<ChatOpening> {
        if sender_id == receiver_id {
            return Err(AppError::validation(ValidationError::InvalidField {
                field: "receiver_id".to_string(),
                reason: "cannot open a chat with yourself".to_string(),
            }));
        }

        if let Some(chat) = self.chats.find_between(sender_id, receiver_id).await? {
            return Ok(ChatOpening {
                chat,
                request: None,
            });
        }

        let (chat, request) = self.chats.create_with_request(sender_id, receiver_id).await?;
        info!(
            chat_id = %chat.id,
            sender_id = %sender_id,
            receiver_id = %receiver_id,
            "Chat request created"
        );

        self.invalidate_members(&chat);
        Ok(ChatOpening {
            chat,
            request: Some(request),
        })
    }

    /// Create-or-get the user's support chat; born accepted, seeded with a
    /// welcome message
    pub async fn open_support_chat(&self, user_id: Uuid) -> AppResult<Chat> {
        if let Some(chat) = self
            .chats
            .find_between(user_id, self.support.support_user_id)
            .await?
        {
            return Ok(chat);
        }

        let chat = self
            .chats
            .create_support_chat(
                user_id,
                self.support.support_user_id,
                &self.support.welcome_message,
            )
            .await?;
        info!(chat_id = %chat.id, user_id = %user_id, "Support chat bootstrapped");

        self.invalidate_members(&chat);
        Ok(chat)
    }

    /// Accept a pending request; only the receiver may act
    pub async fn accept_request(&self, request_id: Uuid, acting_user: Uuid) -> AppResult<()> {
        let request = self.guarded_request(request_id, acting_user).await?;

        if !self.chats.accept_request(request_id).await? {
            // Lost a race between the guard read and the conditional write;
            // report the status that actually won
            let fresh = self.chats.find_request(request_id).await?;
            return Err(state_conflict(fresh.as_ref().unwrap_or(&request)));
        }

        info!(request_id = %request_id, "Chat request accepted");
        self.invalidate_pair(request.sender_id, request.receiver_id);
        Ok(())
    }

    /// Reject a pending request and delete the chat outright
    pub async fn reject_request(&self, request_id: Uuid, acting_user: Uuid) -> AppResult<()> {
        let request = self.guarded_request(request_id, acting_user).await?;

        if !self.chats.reject_request(request_id).await? {
            let fresh = self.chats.find_request(request_id).await?;
            return Err(state_conflict(fresh.as_ref().unwrap_or(&request)));
        }

        info!(request_id = %request_id, "Chat request rejected, chat deleted");
        self.invalidate_pair(request.sender_id, request.receiver_id);
        Ok(())
    }

    /// Send a message into an accepted chat
    pub async fn send_message(
        &self,
        chat_id: Uuid,
        sender_id: Uuid,
        content: &str,
    ) -> AppResult<Message> {
        if content.trim().is_empty() {
            return Err(AppError::validation(ValidationError::MissingField {
                field: "content".to_string(),
            }));
        }

        let chat = self.member_chat(chat_id, sender_id).await?;

        if !chat.is_accepted {
            return Err(AppError::domain(DomainError::ChatNotAccepted {
                chat_id: chat_id.to_string(),
            }));
        }

        let message = self.chats.insert_message(chat.id, sender_id, content).await?;

        // The preview is a display cache: a failed refresh is logged and
        // self-heals on the next message, but never rolls the message back.
        if let Err(e) = self
            .chats
            .update_preview(chat.id, message.created_at, &message.content)
            .await
        {
            error!(chat_id = %chat.id, error = %e, "Chat preview update failed; preview is stale");
        }

        self.invalidate_members(&chat);
        Ok(message)
    }

    /// Mark all messages from the other party as read
    pub async fn mark_read(&self, chat_id: Uuid, acting_user: Uuid) -> AppResult<u64> {
        let chat = self.member_chat(chat_id, acting_user).await?;

        let flipped = self.chats.mark_read(chat.id, acting_user).await?;
        if flipped > 0 {
            self.unread_cache
                .invalidate_prefix(&chat_keys::user_prefix(acting_user));
        }

        Ok(flipped)
    }

    /// The user's accepted chats, cached
    pub async fn list_chats(&self, user_id: Uuid) -> AppResult<Vec<Chat>> {
        let key = chat_keys::ChatListKey::new(user_id).to_string();
        if let Some(chats) = self.listing_cache.get(&key) {
            return Ok(chats);
        }

        let chats = self.chats.list_accepted_for_user(user_id).await?;
        self.listing_cache.insert(key, chats.clone());
        Ok(chats)
    }

    /// Requests awaiting the user's decision
    pub async fn list_pending_requests(&self, user_id: Uuid) -> AppResult<Vec<ChatRequest>> {
        Ok(self.chats.list_pending_requests_for_receiver(user_id).await?)
    }

    /// Messages in display order, visible to members only
    pub async fn list_messages(&self, chat_id: Uuid, acting_user: Uuid) -> AppResult<Vec<Message>> {
        let chat = self.member_chat(chat_id, acting_user).await?;
        Ok(self.chats.list_messages(chat.id).await?)
    }

    /// Pending requests + unread messages from others, cached
    pub async fn unread_summary(&self, user_id: Uuid) -> AppResult<UnreadSummary> {
        let key = chat_keys::UnreadSummaryKey::new(user_id).to_string();
        if let Some(summary) = self.unread_cache.get(&key) {
            return Ok(summary);
        }

        let pending_requests = self.chats.count_pending_requests(user_id).await?;
        let unread_messages = self.chats.count_unread_from_others(user_id).await?;
        let summary = UnreadSummary {
            pending_requests,
            unread_messages,
            total: pending_requests + unread_messages,
        };

        self.unread_cache.insert(key, summary.clone());
        Ok(summary)
    }

    /// Explicit cache cleanup trigger, wired to the housekeeping tick
    pub fn purge_expired_cache(&self) -> usize {
        self.listing_cache.purge_expired() + self.unread_cache.purge_expired()
    }

    /// Fetch a request only if the actor is its receiver; absent and
    /// not-yours are the same NotFound
    async fn guarded_request(&self, request_id: Uuid, acting_user: Uuid) -> AppResult<ChatRequest> {
        let request = self.chats.find_request(request_id).await?.ok_or_else(|| {
            AppError::domain(DomainError::ChatRequestNotFound {
                request_id: request_id.to_string(),
            })
        })?;

        if request.receiver_id != acting_user {
            return Err(AppError::domain(DomainError::ChatRequestNotFound {
                request_id: request_id.to_string(),
            }));
        }

        if request.status != ChatRequestStatus::Pending.as_str() {
            return Err(state_conflict(&request));
        }

        Ok(request)
    }

    /// Fetch a chat only if the actor is a member
    async fn member_chat(&self, chat_id: Uuid, acting_user: Uuid) -> AppResult<Chat> {
        let chat = self.chats.find_chat(chat_id).await?.ok_or_else(|| {
            AppError::domain(DomainError::ChatNotFound {
                chat_id: chat_id.to_string(),
            })
        })?;

        if !chat.has_member(acting_user) {
            return Err(AppError::domain(DomainError::ChatNotFound {
                chat_id: chat_id.to_string(),
            }));
        }

        Ok(chat)
    }

    fn invalidate_members(&self, chat: &Chat) {
        self.invalidate_pair(chat.member_one, chat.member_two);
    }

    fn invalidate_pair(&self, a: Uuid, b: Uuid) {
        for user_id in [a, b] {
            let prefix = chat_keys::user_prefix(user_id);
            self.listing_cache.invalidate_prefix(&prefix);
            self.unread_cache.invalidate_prefix(&prefix);
        }
    }
}

fn state_conflict(request: &ChatRequest) -> AppError {
    AppError::domain(DomainError::ChatRequestStateConflict {
        request_id: request.id.to_string(),
        status: request.status.clone(),
    })
}
