use crate::database::activity_log_repository::ActivityLogRepository;
use crate::database::payment_repository::Payment;
use tracing::{info, warn};

/// Best-effort admin notifications
///
/// Failure here must never fail the request that triggered it; errors are
/// logged and swallowed.
pub struct NotificationService {
    activity: ActivityLogRepository,
}

impl NotificationService {
    pub fn new(activity: ActivityLogRepository) -> Self {
        Self { activity }
    }

    pub async fn notify_admin_invoice_created(&self, payment: &Payment, pay_link: Option<&str>) {
        info!(
            order_id = %payment.id,
            user_id = %payment.user_id,
            amount = %payment.amount,
            currency = %payment.currency,
            "🔔 NOTIFICATION: VIP invoice created"
        );

        let details = serde_json::json!({
            "order_id": payment.id,
            "user_id": payment.user_id,
            "amount": payment.amount.to_string(),
            "currency": &payment.currency,
            "pay_link": pay_link,
        });

        if let Err(e) = self
            .activity
            .record(Some(payment.user_id), "admin_invoice_notification", details)
            .await
        {
            warn!(order_id = %payment.id, error = %e, "Failed to record admin notification");
        }
    }
}
