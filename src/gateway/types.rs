use bigdecimal::BigDecimal;
use serde::{Deserialize, Serialize};

/// Internal payment status vocabulary
///
/// Persisted lowercase in the payments table. `Refunded` exists in the
/// taxonomy but no webhook-driven transition reaches it; only a manual
/// back-office path could.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Completed,
    Failed,
    Refunded,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Completed => "completed",
            PaymentStatus::Failed => "failed",
            PaymentStatus::Refunded => "refunded",
        }
    }

    /// Parse a persisted status column value
    pub fn from_db(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(PaymentStatus::Pending),
            "completed" => Some(PaymentStatus::Completed),
            "failed" => Some(PaymentStatus::Failed),
            "refunded" => Some(PaymentStatus::Refunded),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, PaymentStatus::Pending)
    }
}

impl std::fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The provider's raw status string that alone authorizes a VIP grant
pub const RAW_STATUS_PAID: &str = "Paid";

/// Map the provider's status vocabulary to the internal one
///
/// Unrecognized strings map to `Pending`: failing an in-flight payment on
/// vocabulary the provider added later would be worse than waiting for the
/// next callback.
pub fn map_provider_status(raw: &str) -> PaymentStatus {
    match raw {
        "Paid" => PaymentStatus::Completed,
        "Waiting" | "Confirming" => PaymentStatus::Pending,
        "Expired" | "Failed" => PaymentStatus::Failed,
        _ => PaymentStatus::Pending,
    }
}

/// Hosted-invoice creation request
#[derive(Debug, Clone)]
pub struct InvoiceRequest {
    pub amount: BigDecimal,
    pub currency: String,
    pub order_id: String,
    pub callback_url: String,
    pub return_url: String,
    pub description: Option<String>,
    pub email: Option<String>,
}

/// Hosted-invoice creation response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvoiceResponse {
    pub track_id: String,
    pub pay_link: String,
}

/// White-label (direct deposit address) payment request
#[derive(Debug, Clone)]
pub struct WhiteLabelRequest {
    pub amount: BigDecimal,
    pub currency: String,
    pub pay_currency: String,
    pub network: Option<String>,
    pub order_id: String,
    pub callback_url: String,
    pub email: Option<String>,
}

/// White-label payment response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WhiteLabelResponse {
    pub track_id: String,
    pub address: String,
    pub pay_amount: String,
    pub pay_currency: String,
    pub qr_code: Option<String>,
    pub expired_at: Option<i64>,
    pub rate: Option<f64>,
}

/// Inbound webhook body from the payment provider
///
/// No signature accompanies this payload; the purpose tag on the stored
/// payment is the only spoofing guard (see DESIGN.md).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentCallback {
    #[serde(default)]
    pub track_id: Option<String>,
    pub order_id: String,
    pub status: String,
    #[serde(default)]
    pub amount: Option<String>,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub pay_amount: Option<String>,
    #[serde(default)]
    pub pay_currency: Option<String>,
    #[serde(rename = "txID", default)]
    pub tx_id: Option<String>,
    #[serde(default)]
    pub network: Option<String>,
    #[serde(default)]
    pub date: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_every_known_provider_status() {
        assert_eq!(map_provider_status("Paid"), PaymentStatus::Completed);
        assert_eq!(map_provider_status("Waiting"), PaymentStatus::Pending);
        assert_eq!(map_provider_status("Confirming"), PaymentStatus::Pending);
        assert_eq!(map_provider_status("Expired"), PaymentStatus::Failed);
        assert_eq!(map_provider_status("Failed"), PaymentStatus::Failed);
    }

    #[test]
    fn unknown_status_fails_open_to_pending() {
        assert_eq!(map_provider_status("Refunding"), PaymentStatus::Pending);
        assert_eq!(map_provider_status(""), PaymentStatus::Pending);
        assert_eq!(map_provider_status("paid"), PaymentStatus::Pending); // case-sensitive
    }

    #[test]
    fn db_round_trip() {
        for status in [
            PaymentStatus::Pending,
            PaymentStatus::Completed,
            PaymentStatus::Failed,
            PaymentStatus::Refunded,
        ] {
            assert_eq!(PaymentStatus::from_db(status.as_str()), Some(status));
        }
        assert_eq!(PaymentStatus::from_db("unknown"), None);
    }

    #[test]
    fn terminal_states() {
        assert!(!PaymentStatus::Pending.is_terminal());
        assert!(PaymentStatus::Completed.is_terminal());
        assert!(PaymentStatus::Failed.is_terminal());
        assert!(PaymentStatus::Refunded.is_terminal());
    }

    #[test]
    fn callback_deserializes_from_provider_json() {
        let payload = serde_json::json!({
            "trackId": "777",
            "orderId": "2d9b7f51-9f2e-41da-b0a3-0b9fd7a4a2e1",
            "status": "Paid",
            "amount": "50",
            "currency": "USD",
            "payAmount": "0.00081",
            "payCurrency": "BTC",
            "txID": "abcdef",
            "network": "bitcoin",
            "date": "1754400000"
        });
        let parsed: PaymentCallback =
            serde_json::from_value(payload).expect("callback should deserialize");
        assert_eq!(parsed.track_id.as_deref(), Some("777"));
        assert_eq!(parsed.status, "Paid");
        assert_eq!(parsed.tx_id.as_deref(), Some("abcdef"));
    }

    #[test]
    fn callback_tolerates_missing_optional_fields() {
        let payload = serde_json::json!({
            "orderId": "2d9b7f51-9f2e-41da-b0a3-0b9fd7a4a2e1",
            "status": "Expired"
        });
        let parsed: PaymentCallback =
            serde_json::from_value(payload).expect("callback should deserialize");
        assert!(parsed.track_id.is_none());
        assert_eq!(parsed.status, "Expired");
    }
}
