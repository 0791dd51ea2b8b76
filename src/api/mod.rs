pub mod chats;
pub mod payments;
pub mod webhooks;

use axum::{http::StatusCode, Json};
use uuid::Uuid;

use crate::middleware::error::{json_error_response, ErrorResponse};

/// Resolve the acting user from the `x-user-id` header
///
/// Session/cookie plumbing lives upstream of this service; by the time a
/// request reaches these handlers the authenticated user id is carried in
/// a trusted header.
pub(crate) fn require_user_id(
    headers: &axum::http::HeaderMap,
    request_id: Option<String>,
) -> Result<Uuid, (StatusCode, Json<ErrorResponse>)> {
    headers
        .get("x-user-id")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| Uuid::parse_str(v).ok())
        .ok_or_else(|| {
            json_error_response(
                StatusCode::UNAUTHORIZED,
                "x-user-id header is required",
                request_id,
            )
        })
}
