//! Webhook reconciliation
//!
//! The provider delivers callbacks at least once and in no guaranteed
//! order. Reconciliation therefore never trusts delivery count or arrival
//! order: the status transition is a conditional write away from
//! `pending`, and the VIP grant is an idempotent set. A delivery that
//! finds the payment already terminal updates the audit metadata and
//! nothing else.
//!
//! The callback body carries no signature; the stored purpose tag is the
//! only spoofing guard (see DESIGN.md).

use chrono::Utc;
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::database::activity_log_repository::ActivityLogRepository;
use crate::database::payment_repository::{Payment, PaymentRepository};
use crate::database::repository::Repository;
use crate::database::user_repository::UserRepository;
use crate::error::{AppError, AppResult, DomainError};
use crate::gateway::types::{
    map_provider_status, PaymentCallback, PaymentStatus, RAW_STATUS_PAID,
};
use crate::services::payments::PURPOSE_VIP_UPGRADE;

/// Verdict of the pure reconciliation step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reconciliation {
    /// Payment already terminal; record nothing beyond the audit metadata
    AlreadyFinal,
    /// Provider reports an intermediate state; no transition
    StillPending,
    /// Transition to COMPLETED; grant VIP only on the exact paid sentinel
    Complete { grant_vip: bool },
    /// Transition to FAILED
    Fail,
}

/// Decide what a callback means against the stored status
///
/// The grant requires both the mapped status AND the raw `"Paid"` sentinel:
/// two independent conditions so an ambiguous intermediate status can never
/// be misread as completion.
pub fn reconcile(current: PaymentStatus, raw_status: &str) -> Reconciliation {
    if current.is_terminal() {
        return Reconciliation::AlreadyFinal;
    }

    match map_provider_status(raw_status) {
        PaymentStatus::Completed => Reconciliation::Complete {
            grant_vip: raw_status == RAW_STATUS_PAID,
        },
        PaymentStatus::Failed => Reconciliation::Fail,
        _ => Reconciliation::StillPending,
    }
}

/// Response body returned to the provider
#[derive(Debug, Clone, Serialize)]
pub struct WebhookOutcome {
    pub success: bool,
    pub status: PaymentStatus,
}

pub struct WebhookService {
    payments: PaymentRepository,
    users: UserRepository,
    activity: ActivityLogRepository,
}

impl WebhookService {
    pub fn new(
        payments: PaymentRepository,
        users: UserRepository,
        activity: ActivityLogRepository,
    ) -> Self {
        Self {
            payments,
            users,
            activity,
        }
    }

    /// Reconcile one provider callback; safe to invoke any number of times
    /// with the same payload
    pub async fn process_callback(&self, callback: PaymentCallback) -> AppResult<WebhookOutcome> {
        // A webhook never creates a payment, so an unparseable order id is
        // the same 404 as an unknown one.
        if Uuid::parse_str(&callback.order_id).is_err() {
            return Err(not_found(&callback.order_id));
        }

        let payment = self
            .payments
            .find_by_id(&callback.order_id)
            .await?
            .ok_or_else(|| not_found(&callback.order_id))?;

        if payment.purpose != PURPOSE_VIP_UPGRADE {
            warn!(
                order_id = %payment.id,
                purpose = %payment.purpose,
                "Webhook for non-VIP payment rejected"
            );
            return Err(AppError::domain(DomainError::PurposeMismatch {
                order_id: payment.id.to_string(),
                purpose: payment.purpose.clone(),
            }));
        }

        // Audit trail first, unconditionally: duplicates and stale
        // deliveries still leave their raw payload behind.
        self.payments
            .merge_metadata(
                payment.id,
                serde_json::json!({
                    "webhook_status": &callback.status,
                    "webhook_payload": &callback,
                    "webhook_received_at": Utc::now().to_rfc3339(),
                }),
            )
            .await?;

        let current = PaymentStatus::from_db(&payment.status).unwrap_or(PaymentStatus::Pending);

        match reconcile(current, &callback.status) {
            Reconciliation::AlreadyFinal => {
                info!(
                    order_id = %payment.id,
                    status = %payment.status,
                    incoming = %callback.status,
                    "Duplicate or stale webhook delivery; payment already terminal"
                );
                Ok(WebhookOutcome {
                    success: true,
                    status: current,
                })
            }
            Reconciliation::StillPending => Ok(WebhookOutcome {
                success: true,
                status: PaymentStatus::Pending,
            }),
            Reconciliation::Complete { grant_vip } => {
                self.complete(&payment, &callback, grant_vip).await
            }
            Reconciliation::Fail => self.fail(&payment, &callback).await,
        }
    }

    async fn complete(
        &self,
        payment: &Payment,
        callback: &PaymentCallback,
        grant_vip: bool,
    ) -> AppResult<WebhookOutcome> {
        let updated = self
            .payments
            .transition_from_pending(
                payment.id,
                PaymentStatus::Completed.as_str(),
                serde_json::json!({ "completed_at": Utc::now().to_rfc3339() }),
            )
            .await?;

        let Some(updated) = updated else {
            // A concurrent delivery won the conditional write; converge
            // without re-running side effects.
            return self.already_settled(payment.id).await;
        };

        if grant_vip {
            let granted = self.users.grant_vip(updated.user_id).await?;
            if !granted {
                warn!(
                    order_id = %updated.id,
                    user_id = %updated.user_id,
                    "Payment completed but owner row is missing"
                );
            }
        } else {
            warn!(
                order_id = %updated.id,
                raw_status = %callback.status,
                "Completed status without the paid sentinel; VIP not granted"
            );
        }

        self.activity
            .record(
                Some(updated.user_id),
                "payment_completed",
                serde_json::json!({
                    "order_id": updated.id,
                    "track_id": &callback.track_id,
                    "amount": updated.amount.to_string(),
                    "currency": &updated.currency,
                    "vip_granted": grant_vip,
                }),
            )
            .await?;

        info!(
            order_id = %updated.id,
            user_id = %updated.user_id,
            vip_granted = grant_vip,
            "Payment completed"
        );

        Ok(WebhookOutcome {
            success: true,
            status: PaymentStatus::Completed,
        })
    }

    async fn fail(&self, payment: &Payment, callback: &PaymentCallback) -> AppResult<WebhookOutcome> {
        let updated = self
            .payments
            .transition_from_pending(
                payment.id,
                PaymentStatus::Failed.as_str(),
                serde_json::json!({
                    "failed_at": Utc::now().to_rfc3339(),
                    "failure_status": &callback.status,
                }),
            )
            .await?;

        let Some(updated) = updated else {
            return self.already_settled(payment.id).await;
        };

        self.activity
            .record(
                Some(updated.user_id),
                "payment_failed",
                serde_json::json!({
                    "order_id": updated.id,
                    "track_id": &callback.track_id,
                    "provider_status": &callback.status,
                }),
            )
            .await?;

        info!(
            order_id = %updated.id,
            provider_status = %callback.status,
            "Payment failed"
        );

        Ok(WebhookOutcome {
            success: true,
            status: PaymentStatus::Failed,
        })
    }

    /// Report the stored terminal status after losing a transition race
    async fn already_settled(&self, order_id: Uuid) -> AppResult<WebhookOutcome> {
        let fresh = self
            .payments
            .find_by_id(&order_id.to_string())
            .await?
            .ok_or_else(|| not_found(&order_id.to_string()))?;

        info!(
            order_id = %order_id,
            status = %fresh.status,
            "Concurrent delivery already settled this payment"
        );

        Ok(WebhookOutcome {
            success: true,
            status: PaymentStatus::from_db(&fresh.status).unwrap_or(PaymentStatus::Pending),
        })
    }
}

fn not_found(order_id: &str) -> AppError {
    AppError::domain(DomainError::PaymentNotFound {
        order_id: order_id.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paid_callback_completes_and_grants_vip() {
        assert_eq!(
            reconcile(PaymentStatus::Pending, "Paid"),
            Reconciliation::Complete { grant_vip: true }
        );
    }

    #[test]
    fn failure_vocabulary_fails_the_payment() {
        assert_eq!(reconcile(PaymentStatus::Pending, "Expired"), Reconciliation::Fail);
        assert_eq!(reconcile(PaymentStatus::Pending, "Failed"), Reconciliation::Fail);
    }

    #[test]
    fn intermediate_vocabulary_leaves_payment_pending() {
        assert_eq!(
            reconcile(PaymentStatus::Pending, "Waiting"),
            Reconciliation::StillPending
        );
        assert_eq!(
            reconcile(PaymentStatus::Pending, "Confirming"),
            Reconciliation::StillPending
        );
    }

    #[test]
    fn unknown_vocabulary_leaves_payment_pending() {
        assert_eq!(
            reconcile(PaymentStatus::Pending, "SomethingNew"),
            Reconciliation::StillPending
        );
    }

    #[test]
    fn duplicate_paid_delivery_is_a_no_op() {
        // Second identical "Paid" delivery: the payment is already
        // completed, so no grant and no activity row may follow.
        assert_eq!(
            reconcile(PaymentStatus::Completed, "Paid"),
            Reconciliation::AlreadyFinal
        );
    }

    #[test]
    fn stale_expiry_cannot_overwrite_a_completed_payment() {
        assert_eq!(
            reconcile(PaymentStatus::Completed, "Expired"),
            Reconciliation::AlreadyFinal
        );
    }

    #[test]
    fn late_paid_cannot_resurrect_a_failed_payment() {
        assert_eq!(
            reconcile(PaymentStatus::Failed, "Paid"),
            Reconciliation::AlreadyFinal
        );
    }

    #[test]
    fn refunded_payments_are_terminal_too() {
        assert_eq!(
            reconcile(PaymentStatus::Refunded, "Paid"),
            Reconciliation::AlreadyFinal
        );
    }
}
