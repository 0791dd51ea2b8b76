use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use crate::api::require_user_id;
use crate::database::chat_repository::{Chat, ChatRequest, Message};
use crate::middleware::error::{app_error_response, get_request_id_from_headers, ErrorResponse};
use crate::services::chats::{ChatOpening, ChatService, UnreadSummary};

#[derive(Clone)]
pub struct ChatsState {
    pub service: Arc<ChatService>,
}

#[derive(Debug, Deserialize)]
pub struct OpenChatRequest {
    pub receiver_id: Uuid,
}

#[derive(Debug, Deserialize)]
pub struct SendMessageRequest {
    pub content: String,
}

#[derive(Debug, Serialize)]
pub struct RequestDecisionResponse {
    pub request_id: Uuid,
    pub status: &'static str,
}

#[derive(Debug, Serialize)]
pub struct MarkReadResponse {
    pub marked_read: u64,
}

/// POST /api/chats — create-or-get the chat with another user
pub async fn open_chat(
    State(state): State<ChatsState>,
    headers: HeaderMap,
    Json(payload): Json<OpenChatRequest>,
) -> Result<Json<ChatOpening>, (StatusCode, Json<ErrorResponse>)> {
    let request_id = get_request_id_from_headers(&headers);
    let user_id = require_user_id(&headers, request_id.clone())?;

    state
        .service
        .open_chat(user_id, payload.receiver_id)
        .await
        .map(Json)
        .map_err(|e| app_error_response(e, request_id))
}

/// POST /api/chats/support — create-or-get the user's support chat
pub async fn open_support_chat(
    State(state): State<ChatsState>,
    headers: HeaderMap,
) -> Result<Json<Chat>, (StatusCode, Json<ErrorResponse>)> {
    let request_id = get_request_id_from_headers(&headers);
    let user_id = require_user_id(&headers, request_id.clone())?;

    state
        .service
        .open_support_chat(user_id)
        .await
        .map(Json)
        .map_err(|e| app_error_response(e, request_id))
}

/// GET /api/chats — the user's accepted chats
pub async fn list_chats(
    State(state): State<ChatsState>,
    headers: HeaderMap,
) -> Result<Json<Vec<Chat>>, (StatusCode, Json<ErrorResponse>)> {
    let request_id = get_request_id_from_headers(&headers);
    let user_id = require_user_id(&headers, request_id.clone())?;

    state
        .service
        .list_chats(user_id)
        .await
        .map(Json)
        .map_err(|e| app_error_response(e, request_id))
}

/// GET /api/chats/requests — requests awaiting this user's decision
pub async fn list_pending_requests(
    State(state): State<ChatsState>,
    headers: HeaderMap,
) -> Result<Json<Vec<ChatRequest>>, (StatusCode, Json<ErrorResponse>)> {
    let request_id = get_request_id_from_headers(&headers);
    let user_id = require_user_id(&headers, request_id.clone())?;

    state
        .service
        .list_pending_requests(user_id)
        .await
        .map(Json)
        .map_err(|e| app_error_response(e, request_id))
}

/// POST /api/chats/requests/{id}/accept
pub async fn accept_request(
    State(state): State<ChatsState>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
) -> Result<Json<RequestDecisionResponse>, (StatusCode, Json<ErrorResponse>)> {
    let request_id = get_request_id_from_headers(&headers);
    let user_id = require_user_id(&headers, request_id.clone())?;

    state
        .service
        .accept_request(id, user_id)
        .await
        .map(|_| {
            Json(RequestDecisionResponse {
                request_id: id,
                status: "accepted",
            })
        })
        .map_err(|e| app_error_response(e, request_id))
}

/// POST /api/chats/requests/{id}/reject
pub async fn reject_request(
    State(state): State<ChatsState>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
) -> Result<Json<RequestDecisionResponse>, (StatusCode, Json<ErrorResponse>)> {
    let request_id = get_request_id_from_headers(&headers);
    let user_id = require_user_id(&headers, request_id.clone())?;

    state
        .service
        .reject_request(id, user_id)
        .await
        .map(|_| {
            Json(RequestDecisionResponse {
                request_id: id,
                status: "rejected",
            })
        })
        .map_err(|e| app_error_response(e, request_id))
}

/// GET /api/chats/{id}/messages
pub async fn list_messages(
    State(state): State<ChatsState>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
) -> Result<Json<Vec<Message>>, (StatusCode, Json<ErrorResponse>)> {
    let request_id = get_request_id_from_headers(&headers);
    let user_id = require_user_id(&headers, request_id.clone())?;

    state
        .service
        .list_messages(id, user_id)
        .await
        .map(Json)
        .map_err(|e| app_error_response(e, request_id))
}

/// POST /api/chats/{id}/messages
pub async fn send_message(
    State(state): State<ChatsState>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
    Json(payload): Json<SendMessageRequest>,
) -> Result<Json<Message>, (StatusCode, Json<ErrorResponse>)> {
    let request_id = get_request_id_from_headers(&headers);
    let user_id = require_user_id(&headers, request_id.clone())?;

    state
        .service
        .send_message(id, user_id, &payload.content)
        .await
        .map(Json)
        .map_err(|e| app_error_response(e, request_id))
}

/// POST /api/chats/{id}/read
pub async fn mark_read(
    State(state): State<ChatsState>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
) -> Result<Json<MarkReadResponse>, (StatusCode, Json<ErrorResponse>)> {
    let request_id = get_request_id_from_headers(&headers);
    let user_id = require_user_id(&headers, request_id.clone())?;

    state
        .service
        .mark_read(id, user_id)
        .await
        .map(|marked_read| Json(MarkReadResponse { marked_read }))
        .map_err(|e| app_error_response(e, request_id))
}

/// GET /api/chats/unread-count
pub async fn unread_count(
    State(state): State<ChatsState>,
    headers: HeaderMap,
) -> Result<Json<UnreadSummary>, (StatusCode, Json<ErrorResponse>)> {
    let request_id = get_request_id_from_headers(&headers);
    let user_id = require_user_id(&headers, request_id.clone())?;

    state
        .service
        .unread_summary(user_id)
        .await
        .map(Json)
        .map_err(|e| app_error_response(e, request_id))
}
