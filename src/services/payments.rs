//! VIP purchase lifecycle
//!
//! Creates the durable payment record, drives the gateway call, and owns
//! the ordering invariant: provider references are persisted before the
//! caller ever sees a pay link, so a webhook arriving immediately after
//! invoice creation always finds a fully populated row.

use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::config::{ServerConfig, VipConfig};
use crate::database::activity_log_repository::ActivityLogRepository;
use crate::database::payment_repository::{Payment, PaymentRepository};
use crate::database::user_repository::UserRepository;
use crate::error::{
    AppError, AppErrorKind, AppResult, DomainError, InfrastructureError, ValidationError,
};
use crate::gateway::client::GatewayClient;
use crate::gateway::types::{InvoiceRequest, WhiteLabelRequest};
use crate::services::notification::NotificationService;

/// Purpose tag stamped on VIP upgrade payments; the webhook reconciler
/// refuses callbacks for any other tag.
pub const PURPOSE_VIP_UPGRADE: &str = "vip_upgrade";

const METHOD_INVOICE: &str = "crypto_invoice";
const METHOD_WHITE_LABEL: &str = "crypto_address";

#[derive(Debug, Serialize)]
pub struct VipPurchase {
    pub payment: Payment,
    pub pay_link: String,
}

#[derive(Debug, Serialize)]
pub struct VipWhiteLabelPurchase {
    pub payment: Payment,
    pub address: String,
    pub pay_amount: String,
    pub pay_currency: String,
    pub qr_code: Option<String>,
    pub expired_at: Option<i64>,
}

pub struct PaymentService {
    payments: PaymentRepository,
    users: UserRepository,
    activity: ActivityLogRepository,
    gateway: Arc<GatewayClient>,
    notifications: NotificationService,
    vip: VipConfig,
    callback_url: String,
    return_url: String,
}

impl PaymentService {
    pub fn new(
        payments: PaymentRepository,
        users: UserRepository,
        activity: ActivityLogRepository,
        gateway: Arc<GatewayClient>,
        notifications: NotificationService,
        vip: VipConfig,
        server: &ServerConfig,
    ) -> Self {
        Self {
            payments,
            users,
            activity,
            gateway,
            notifications,
            vip,
            callback_url: server.webhook_callback_url(),
            return_url: server.payment_return_url(),
        }
    }

    /// Start a VIP purchase through a hosted invoice
    pub async fn purchase_vip(&self, user_id: Uuid) -> AppResult<VipPurchase> {
        let user = self.check_eligibility(user_id).await?;

        let payment = self
            .payments
            .create(
                user.id,
                self.vip.price.clone(),
                &self.vip.currency,
                PURPOSE_VIP_UPGRADE,
                METHOD_INVOICE,
                Some("VIP membership"),
                serde_json::json!({}),
            )
            .await?;

        let invoice = self
            .gateway
            .create_invoice(InvoiceRequest {
                amount: payment.amount.clone(),
                currency: payment.currency.clone(),
                order_id: payment.id.to_string(),
                callback_url: self.callback_url.clone(),
                return_url: self.return_url.clone(),
                description: payment.description.clone(),
                email: Some(user.email.clone()),
            })
            .await;

        let invoice = match invoice {
            Ok(invoice) => invoice,
            Err(e) => return Err(self.record_gateway_failure(&payment, e).await),
        };

        let payment = self
            .attach_reference(
                payment.id,
                &invoice.track_id,
                serde_json::json!({
                    "track_id": &invoice.track_id,
                    "pay_link": &invoice.pay_link,
                    "invoice_created_at": Utc::now().to_rfc3339(),
                }),
            )
            .await?;

        info!(
            order_id = %payment.id,
            user_id = %payment.user_id,
            track_id = %invoice.track_id,
            "VIP purchase initiated"
        );

        self.notifications
            .notify_admin_invoice_created(&payment, Some(&invoice.pay_link))
            .await;

        Ok(VipPurchase {
            payment,
            pay_link: invoice.pay_link,
        })
    }

    /// Start a VIP purchase against a raw deposit address in the payer's
    /// chosen crypto
    pub async fn purchase_vip_white_label(
        &self,
        user_id: Uuid,
        pay_currency: &str,
        network: Option<&str>,
    ) -> AppResult<VipWhiteLabelPurchase> {
        if pay_currency.trim().is_empty() {
            return Err(AppError::validation(ValidationError::MissingField {
                field: "pay_currency".to_string(),
            }));
        }

        let user = self.check_eligibility(user_id).await?;

        let payment = self
            .payments
            .create(
                user.id,
                self.vip.price.clone(),
                &self.vip.currency,
                PURPOSE_VIP_UPGRADE,
                METHOD_WHITE_LABEL,
                Some("VIP membership"),
                serde_json::json!({ "pay_currency": pay_currency, "network": network }),
            )
            .await?;

        let white_label = self
            .gateway
            .create_white_label_payment(WhiteLabelRequest {
                amount: payment.amount.clone(),
                currency: payment.currency.clone(),
                pay_currency: pay_currency.to_string(),
                network: network.map(str::to_string),
                order_id: payment.id.to_string(),
                callback_url: self.callback_url.clone(),
                email: Some(user.email.clone()),
            })
            .await;

        let white_label = match white_label {
            Ok(response) => response,
            Err(e) => return Err(self.record_gateway_failure(&payment, e).await),
        };

        let payment = self
            .attach_reference(
                payment.id,
                &white_label.track_id,
                serde_json::json!({
                    "track_id": &white_label.track_id,
                    "pay_address": &white_label.address,
                    "pay_amount": &white_label.pay_amount,
                    "pay_currency": &white_label.pay_currency,
                    "expired_at": white_label.expired_at,
                    "invoice_created_at": Utc::now().to_rfc3339(),
                }),
            )
            .await?;

        info!(
            order_id = %payment.id,
            user_id = %payment.user_id,
            track_id = %white_label.track_id,
            pay_currency = %white_label.pay_currency,
            "VIP white-label purchase initiated"
        );

        self.notifications
            .notify_admin_invoice_created(&payment, None)
            .await;

        Ok(VipWhiteLabelPurchase {
            payment,
            address: white_label.address,
            pay_amount: white_label.pay_amount,
            pay_currency: white_label.pay_currency,
            qr_code: white_label.qr_code,
            expired_at: white_label.expired_at,
        })
    }

    /// Current status of a payment, visible only to its owner
    pub async fn payment_status(&self, order_id: Uuid, user_id: Uuid) -> AppResult<Payment> {
        self.payments
            .find_by_id_for_user(order_id, user_id)
            .await?
            .ok_or_else(|| {
                AppError::domain(DomainError::PaymentNotFound {
                    order_id: order_id.to_string(),
                })
            })
    }

    /// The owner's pending payments
    pub async fn pending_payments(&self, user_id: Uuid) -> AppResult<Vec<Payment>> {
        Ok(self.payments.find_pending_for_user(user_id).await?)
    }

    /// User-initiated cancellation of a pending payment
    ///
    /// Cancelling a payment that already left PENDING is a conflict, not a
    /// silent success: it means a webhook won the race.
    pub async fn cancel_payment(&self, order_id: Uuid, user_id: Uuid) -> AppResult<Payment> {
        let payment = self
            .payments
            .find_by_id_for_user(order_id, user_id)
            .await?
            .ok_or_else(|| {
                AppError::domain(DomainError::PaymentNotFound {
                    order_id: order_id.to_string(),
                })
            })?;

        let cancelled = self
            .payments
            .transition_from_pending(
                payment.id,
                "failed",
                serde_json::json!({
                    "cancelled_by_user": true,
                    "cancelled_at": Utc::now().to_rfc3339(),
                }),
            )
            .await?;

        let cancelled = cancelled.ok_or_else(|| {
            AppError::domain(DomainError::PaymentStateConflict {
                order_id: order_id.to_string(),
                status: payment.status.clone(),
            })
        })?;

        if let Err(e) = self
            .activity
            .record(
                Some(user_id),
                "payment_cancelled",
                serde_json::json!({ "order_id": order_id }),
            )
            .await
        {
            warn!(order_id = %order_id, error = %e, "Failed to record cancellation");
        }

        info!(order_id = %order_id, user_id = %user_id, "Payment cancelled by owner");
        Ok(cancelled)
    }

    async fn check_eligibility(
        &self,
        user_id: Uuid,
    ) -> AppResult<crate::database::user_repository::User> {
        let user = self.users.find_by_id(user_id).await?.ok_or_else(|| {
            AppError::domain(DomainError::UserNotFound {
                user_id: user_id.to_string(),
            })
        })?;

        if user.is_vip {
            return Err(AppError::domain(DomainError::AlreadyVip {
                user_id: user_id.to_string(),
            }));
        }

        Ok(user)
    }

    /// Leave a durable FAILED record behind a gateway failure, then surface
    /// the gateway error. The row is never deleted and never retried here.
    async fn record_gateway_failure(
        &self,
        payment: &Payment,
        err: crate::gateway::error::GatewayError,
    ) -> AppError {
        error!(
            order_id = %payment.id,
            error = %err,
            "Gateway call failed; marking payment failed"
        );

        let patch = serde_json::json!({
            "gateway_error": err.to_string(),
            "failed_at": Utc::now().to_rfc3339(),
        });
        match self
            .payments
            .transition_from_pending(payment.id, "failed", patch)
            .await
        {
            Ok(Some(_)) => {}
            Ok(None) => {
                warn!(order_id = %payment.id, "Payment left pending state before failure record")
            }
            Err(db_err) => {
                error!(order_id = %payment.id, error = %db_err, "Failed to persist failure record")
            }
        }

        err.into()
    }

    async fn attach_reference(
        &self,
        order_id: Uuid,
        track_id: &str,
        metadata_patch: serde_json::Value,
    ) -> AppResult<Payment> {
        self.payments
            .attach_provider_reference(order_id, track_id, metadata_patch)
            .await?
            .ok_or_else(|| {
                error!(order_id = %order_id, "Track id already attached or payment row missing");
                AppError::new(AppErrorKind::Infrastructure(InfrastructureError::Database {
                    message: format!("could not attach provider reference to payment {}", order_id),
                    is_retryable: false,
                }))
            })
    }
}
