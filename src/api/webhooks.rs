use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    Json,
};
use std::sync::Arc;
use tracing::info;

use crate::gateway::types::PaymentCallback;
use crate::middleware::error::{app_error_response, get_request_id_from_headers, ErrorResponse};
use crate::services::webhooks::{WebhookOutcome, WebhookService};

#[derive(Clone)]
pub struct WebhookState {
    pub service: Arc<WebhookService>,
}

/// POST /api/webhooks/payment
///
/// Unknown order ids are 404; callbacks for payments that are not VIP
/// upgrades are 400. Duplicate deliveries return 200 with the stored
/// status so the provider stops retrying.
pub async fn handle_payment_webhook(
    State(state): State<WebhookState>,
    headers: HeaderMap,
    Json(callback): Json<PaymentCallback>,
) -> Result<Json<WebhookOutcome>, (StatusCode, Json<ErrorResponse>)> {
    let request_id = get_request_id_from_headers(&headers);
    info!(
        order_id = %callback.order_id,
        status = %callback.status,
        "Received payment webhook"
    );

    state
        .service
        .process_callback(callback)
        .await
        .map(Json)
        .map_err(|e| app_error_response(e, request_id))
}
