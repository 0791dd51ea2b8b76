use crate::config::GatewayConfig;
use crate::gateway::error::{GatewayError, GatewayResult};
use crate::gateway::http::GatewayHttpClient;
use crate::gateway::types::{
    InvoiceRequest, InvoiceResponse, WhiteLabelRequest, WhiteLabelResponse,
};
use serde::Deserialize;
use std::time::Duration;
use tracing::info;

/// Provider result code signalling success
const RESULT_OK: i64 = 100;

/// Client for the external crypto payment provider
pub struct GatewayClient {
    config: GatewayConfig,
    http: GatewayHttpClient,
}

impl GatewayClient {
    pub fn new(config: GatewayConfig) -> GatewayResult<Self> {
        let http =
            GatewayHttpClient::new(Duration::from_secs(config.timeout_secs), config.max_retries)?;
        Ok(Self { config, http })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url.trim_end_matches('/'), path)
    }

    /// Create a hosted invoice; the payer completes checkout on the pay link
    pub async fn create_invoice(&self, request: InvoiceRequest) -> GatewayResult<InvoiceResponse> {
        validate_amount(&request.amount)?;
        if request.order_id.trim().is_empty() {
            return Err(GatewayError::ValidationError {
                message: "order_id is required".to_string(),
                field: Some("order_id".to_string()),
            });
        }

        let payload = serde_json::json!({
            "merchant": &self.config.merchant_key,
            "amount": request.amount.to_string(),
            "currency": &request.currency,
            "orderId": &request.order_id,
            "callbackUrl": &request.callback_url,
            "returnUrl": &request.return_url,
            "description": &request.description,
            "email": &request.email,
            "underPaidCover": self.config.under_paid_cover,
            "feePaidByPayer": if self.config.fee_paid_by_payer { 1 } else { 0 },
            "lifeTime": self.config.invoice_lifetime_minutes,
        });

        let raw: InvoiceEnvelope = self
            .http
            .post_json(&self.endpoint("/invoice"), &payload)
            .await?;

        if raw.result != RESULT_OK {
            return Err(GatewayError::ProviderError {
                message: raw.message,
                result_code: Some(raw.result),
                retryable: false,
            });
        }

        let track_id = raw
            .track_id
            .map(NumberOrString::into_string)
            .filter(|v| !v.is_empty())
            .ok_or(GatewayError::ProviderError {
                message: "provider response missing trackId".to_string(),
                result_code: Some(raw.result),
                retryable: false,
            })?;
        let pay_link = raw.pay_link.ok_or(GatewayError::ProviderError {
            message: "provider response missing payLink".to_string(),
            result_code: Some(raw.result),
            retryable: false,
        })?;

        info!(track_id = %track_id, order_id = %request.order_id, "gateway invoice created");

        Ok(InvoiceResponse {
            track_id,
            pay_link,
        })
    }

    /// Create a white-label payment: a raw deposit address, exact crypto
    /// amount and QR code, rendered by our own checkout page
    pub async fn create_white_label_payment(
        &self,
        request: WhiteLabelRequest,
    ) -> GatewayResult<WhiteLabelResponse> {
        validate_amount(&request.amount)?;
        if request.pay_currency.trim().is_empty() {
            return Err(GatewayError::ValidationError {
                message: "pay_currency is required".to_string(),
                field: Some("pay_currency".to_string()),
            });
        }

        let payload = serde_json::json!({
            "merchant": &self.config.merchant_key,
            "amount": request.amount.to_string(),
            "currency": &request.currency,
            "payCurrency": &request.pay_currency,
            "network": &request.network,
            "orderId": &request.order_id,
            "callbackUrl": &request.callback_url,
            "email": &request.email,
            "underPaidCover": self.config.under_paid_cover,
            "feePaidByPayer": if self.config.fee_paid_by_payer { 1 } else { 0 },
            "lifeTime": self.config.invoice_lifetime_minutes,
        });

        let raw: WhiteLabelEnvelope = self
            .http
            .post_json(&self.endpoint("/request/whitelabel"), &payload)
            .await?;

        if raw.result != RESULT_OK {
            return Err(GatewayError::ProviderError {
                message: raw.message,
                result_code: Some(raw.result),
                retryable: false,
            });
        }

        let track_id = raw
            .track_id
            .map(NumberOrString::into_string)
            .filter(|v| !v.is_empty())
            .ok_or(GatewayError::ProviderError {
                message: "provider response missing trackId".to_string(),
                result_code: Some(raw.result),
                retryable: false,
            })?;
        let address = raw.address.ok_or(GatewayError::ProviderError {
            message: "provider response missing address".to_string(),
            result_code: Some(raw.result),
            retryable: false,
        })?;
        let pay_amount = raw
            .pay_amount
            .map(NumberOrString::into_string)
            .unwrap_or_default();

        info!(
            track_id = %track_id,
            order_id = %request.order_id,
            pay_currency = %request.pay_currency,
            "gateway white-label payment created"
        );

        Ok(WhiteLabelResponse {
            track_id,
            address,
            pay_amount,
            pay_currency: request.pay_currency,
            qr_code: raw.qr_code,
            expired_at: raw.expired_at,
            rate: raw.rate,
        })
    }
}

fn validate_amount(amount: &bigdecimal::BigDecimal) -> GatewayResult<()> {
    if amount <= &bigdecimal::BigDecimal::from(0) {
        return Err(GatewayError::ValidationError {
            message: "amount must be greater than zero".to_string(),
            field: Some("amount".to_string()),
        });
    }
    Ok(())
}

/// Provider fields that arrive as either JSON numbers or strings
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum NumberOrString {
    Num(i64),
    Float(f64),
    Text(String),
}

impl NumberOrString {
    fn into_string(self) -> String {
        match self {
            NumberOrString::Num(v) => v.to_string(),
            NumberOrString::Float(v) => v.to_string(),
            NumberOrString::Text(v) => v,
        }
    }
}

#[derive(Debug, Deserialize)]
struct InvoiceEnvelope {
    result: i64,
    #[serde(default)]
    message: String,
    #[serde(rename = "trackId", default)]
    track_id: Option<NumberOrString>,
    #[serde(rename = "payLink", default)]
    pay_link: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WhiteLabelEnvelope {
    result: i64,
    #[serde(default)]
    message: String,
    #[serde(rename = "trackId", default)]
    track_id: Option<NumberOrString>,
    #[serde(default)]
    address: Option<String>,
    #[serde(rename = "payAmount", default)]
    pay_amount: Option<NumberOrString>,
    #[serde(rename = "QRCode", default)]
    qr_code: Option<String>,
    #[serde(rename = "expiredAt", default)]
    expired_at: Option<i64>,
    #[serde(default)]
    rate: Option<f64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invoice_envelope_accepts_numeric_track_id() {
        let raw = serde_json::json!({
            "result": 100,
            "message": "success",
            "trackId": 777,
            "payLink": "https://pay.example.com/t/777"
        });
        let parsed: InvoiceEnvelope = serde_json::from_value(raw).expect("should deserialize");
        assert_eq!(parsed.result, 100);
        assert_eq!(
            parsed.track_id.map(NumberOrString::into_string).as_deref(),
            Some("777")
        );
    }

    #[test]
    fn white_label_envelope_parses_provider_shape() {
        let raw = serde_json::json!({
            "result": 100,
            "message": "success",
            "trackId": "888",
            "address": "bc1qexampleaddress",
            "payAmount": "0.00081",
            "QRCode": "data:image/png;base64,xyz",
            "expiredAt": 1754403600,
            "rate": 61728.4
        });
        let parsed: WhiteLabelEnvelope = serde_json::from_value(raw).expect("should deserialize");
        assert_eq!(parsed.result, 100);
        assert_eq!(parsed.address.as_deref(), Some("bc1qexampleaddress"));
        assert_eq!(parsed.expired_at, Some(1754403600));
    }

    #[test]
    fn non_success_result_code_is_an_error() {
        // The envelope carries the provider's failure code; the client turns
        // any non-100 result into a ProviderError.
        let raw = serde_json::json!({
            "result": 135,
            "message": "Invalid merchant key"
        });
        let parsed: InvoiceEnvelope = serde_json::from_value(raw).expect("should deserialize");
        assert_ne!(parsed.result, RESULT_OK);
        assert!(parsed.track_id.is_none());
    }
}
