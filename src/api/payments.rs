use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use serde::Deserialize;
use std::sync::Arc;
use uuid::Uuid;

use crate::api::require_user_id;
use crate::database::payment_repository::Payment;
use crate::middleware::error::{app_error_response, get_request_id_from_headers, ErrorResponse};
use crate::services::payments::{PaymentService, VipPurchase, VipWhiteLabelPurchase};

#[derive(Clone)]
pub struct PaymentsState {
    pub service: Arc<PaymentService>,
}

#[derive(Debug, Deserialize)]
pub struct WhiteLabelPurchaseRequest {
    pub pay_currency: String,
    pub network: Option<String>,
}

/// POST /api/vip/purchase
pub async fn purchase_vip(
    State(state): State<PaymentsState>,
    headers: HeaderMap,
) -> Result<Json<VipPurchase>, (StatusCode, Json<ErrorResponse>)> {
    let request_id = get_request_id_from_headers(&headers);
    let user_id = require_user_id(&headers, request_id.clone())?;

    state
        .service
        .purchase_vip(user_id)
        .await
        .map(Json)
        .map_err(|e| app_error_response(e, request_id))
}

/// POST /api/vip/purchase/white-label
pub async fn purchase_vip_white_label(
    State(state): State<PaymentsState>,
    headers: HeaderMap,
    Json(payload): Json<WhiteLabelPurchaseRequest>,
) -> Result<Json<VipWhiteLabelPurchase>, (StatusCode, Json<ErrorResponse>)> {
    let request_id = get_request_id_from_headers(&headers);
    let user_id = require_user_id(&headers, request_id.clone())?;

    state
        .service
        .purchase_vip_white_label(user_id, &payload.pay_currency, payload.network.as_deref())
        .await
        .map(Json)
        .map_err(|e| app_error_response(e, request_id))
}

/// GET /api/payments/{order_id}/status
pub async fn payment_status(
    State(state): State<PaymentsState>,
    Path(order_id): Path<Uuid>,
    headers: HeaderMap,
) -> Result<Json<Payment>, (StatusCode, Json<ErrorResponse>)> {
    let request_id = get_request_id_from_headers(&headers);
    let user_id = require_user_id(&headers, request_id.clone())?;

    state
        .service
        .payment_status(order_id, user_id)
        .await
        .map(Json)
        .map_err(|e| app_error_response(e, request_id))
}

/// GET /api/payments/pending
pub async fn pending_payments(
    State(state): State<PaymentsState>,
    headers: HeaderMap,
) -> Result<Json<Vec<Payment>>, (StatusCode, Json<ErrorResponse>)> {
    let request_id = get_request_id_from_headers(&headers);
    let user_id = require_user_id(&headers, request_id.clone())?;

    state
        .service
        .pending_payments(user_id)
        .await
        .map(Json)
        .map_err(|e| app_error_response(e, request_id))
}

/// POST /api/payments/{order_id}/cancel
pub async fn cancel_payment(
    State(state): State<PaymentsState>,
    Path(order_id): Path<Uuid>,
    headers: HeaderMap,
) -> Result<Json<Payment>, (StatusCode, Json<ErrorResponse>)> {
    let request_id = get_request_id_from_headers(&headers);
    let user_id = require_user_id(&headers, request_id.clone())?;

    state
        .service
        .cancel_payment(order_id, user_id)
        .await
        .map(Json)
        .map_err(|e| app_error_response(e, request_id))
}
