//! Unified error handling for the backend
//!
//! This module provides a single error system with HTTP status mapping,
//! user-facing messages, and structured error codes for client handling.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Error codes for programmatic client handling
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum ErrorCode {
    // Domain errors (4xx)
    #[serde(rename = "ALREADY_VIP")]
    AlreadyVip,
    #[serde(rename = "PAYMENT_NOT_FOUND")]
    PaymentNotFound,
    #[serde(rename = "PAYMENT_STATE_CONFLICT")]
    PaymentStateConflict,
    #[serde(rename = "PURPOSE_MISMATCH")]
    PurposeMismatch,
    #[serde(rename = "USER_NOT_FOUND")]
    UserNotFound,
    #[serde(rename = "CHAT_NOT_FOUND")]
    ChatNotFound,
    #[serde(rename = "CHAT_REQUEST_NOT_FOUND")]
    ChatRequestNotFound,
    #[serde(rename = "CHAT_REQUEST_STATE_CONFLICT")]
    ChatRequestStateConflict,
    #[serde(rename = "CHAT_NOT_ACCEPTED")]
    ChatNotAccepted,

    // Infrastructure errors (5xx)
    #[serde(rename = "DATABASE_ERROR")]
    DatabaseError,
    #[serde(rename = "CONFIGURATION_ERROR")]
    ConfigurationError,

    // External errors (502, 429, 504)
    #[serde(rename = "PAYMENT_GATEWAY_ERROR")]
    PaymentGatewayError,
    #[serde(rename = "RATE_LIMIT_ERROR")]
    RateLimitError,
    #[serde(rename = "EXTERNAL_SERVICE_TIMEOUT")]
    ExternalServiceTimeout,

    // Generic
    #[serde(rename = "INTERNAL_ERROR")]
    InternalError,
    #[serde(rename = "VALIDATION_ERROR")]
    ValidationError,
}

/// Domain-specific business logic errors
#[derive(Debug, Clone)]
pub enum DomainError {
    /// Purchase attempted by a user who already holds the VIP tier
    AlreadyVip { user_id: String },
    /// Payment absent, or present but not owned by the acting user
    PaymentNotFound { order_id: String },
    /// Action attempted against a payment that already left PENDING
    PaymentStateConflict { order_id: String, status: String },
    /// Webhook callback for a payment whose purpose tag is not the expected product
    PurposeMismatch { order_id: String, purpose: String },
    /// User row absent
    UserNotFound { user_id: String },
    /// Chat absent, or present but the actor is not a member
    ChatNotFound { chat_id: String },
    /// Request absent, or present but the actor is not the receiver
    ChatRequestNotFound { request_id: String },
    /// Accept/reject attempted against a request that already left PENDING
    ChatRequestStateConflict { request_id: String, status: String },
    /// Message send attempted before the receiver accepted the chat
    ChatNotAccepted { chat_id: String },
}

/// Infrastructure-level errors (database, configuration)
#[derive(Debug, Clone)]
pub enum InfrastructureError {
    /// Database connection or query failure
    Database { message: String, is_retryable: bool },
    /// Missing or invalid configuration
    Configuration { message: String },
}

/// External service errors (payment gateway)
#[derive(Debug, Clone)]
pub enum ExternalError {
    /// Payment gateway error
    PaymentGateway { message: String, is_retryable: bool },
    /// Rate limit exceeded
    RateLimit {
        service: String,
        retry_after: Option<u64>,
    },
    /// External service timeout
    Timeout { service: String, timeout_secs: u64 },
}

/// Input validation errors
#[derive(Debug, Clone)]
pub enum ValidationError {
    /// Required field missing
    MissingField { field: String },
    /// Field present but unusable
    InvalidField { field: String, reason: String },
}

/// Unified application error type
#[derive(Debug, Clone)]
pub struct AppError {
    pub kind: AppErrorKind,
    pub request_id: Option<String>,
    pub context: Option<String>,
}

#[derive(Debug, Clone)]
pub enum AppErrorKind {
    Domain(DomainError),
    Infrastructure(InfrastructureError),
    External(ExternalError),
    Validation(ValidationError),
}

impl AppError {
    pub fn new(kind: AppErrorKind) -> Self {
        Self {
            kind,
            request_id: None,
            context: None,
        }
    }

    pub fn domain(err: DomainError) -> Self {
        Self::new(AppErrorKind::Domain(err))
    }

    pub fn validation(err: ValidationError) -> Self {
        Self::new(AppErrorKind::Validation(err))
    }

    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    /// Map error to HTTP status code
    pub fn status_code(&self) -> u16 {
        match &self.kind {
            AppErrorKind::Domain(err) => match err {
                DomainError::AlreadyVip { .. } => 409,
                DomainError::PaymentNotFound { .. } => 404,
                DomainError::PaymentStateConflict { .. } => 409,
                DomainError::PurposeMismatch { .. } => 400,
                DomainError::UserNotFound { .. } => 404,
                DomainError::ChatNotFound { .. } => 404,
                DomainError::ChatRequestNotFound { .. } => 404,
                DomainError::ChatRequestStateConflict { .. } => 409,
                DomainError::ChatNotAccepted { .. } => 409,
            },
            AppErrorKind::Infrastructure(err) => match err {
                InfrastructureError::Database { .. } => 500,
                InfrastructureError::Configuration { .. } => 500,
            },
            AppErrorKind::External(err) => match err {
                ExternalError::PaymentGateway { .. } => 502,
                ExternalError::RateLimit { .. } => 429,
                ExternalError::Timeout { .. } => 504,
            },
            AppErrorKind::Validation(_) => 400,
        }
    }

    /// Get error code for client handling
    pub fn error_code(&self) -> ErrorCode {
        match &self.kind {
            AppErrorKind::Domain(err) => match err {
                DomainError::AlreadyVip { .. } => ErrorCode::AlreadyVip,
                DomainError::PaymentNotFound { .. } => ErrorCode::PaymentNotFound,
                DomainError::PaymentStateConflict { .. } => ErrorCode::PaymentStateConflict,
                DomainError::PurposeMismatch { .. } => ErrorCode::PurposeMismatch,
                DomainError::UserNotFound { .. } => ErrorCode::UserNotFound,
                DomainError::ChatNotFound { .. } => ErrorCode::ChatNotFound,
                DomainError::ChatRequestNotFound { .. } => ErrorCode::ChatRequestNotFound,
                DomainError::ChatRequestStateConflict { .. } => {
                    ErrorCode::ChatRequestStateConflict
                }
                DomainError::ChatNotAccepted { .. } => ErrorCode::ChatNotAccepted,
            },
            AppErrorKind::Infrastructure(err) => match err {
                InfrastructureError::Database { .. } => ErrorCode::DatabaseError,
                InfrastructureError::Configuration { .. } => ErrorCode::ConfigurationError,
            },
            AppErrorKind::External(err) => match err {
                ExternalError::PaymentGateway { .. } => ErrorCode::PaymentGatewayError,
                ExternalError::RateLimit { .. } => ErrorCode::RateLimitError,
                ExternalError::Timeout { .. } => ErrorCode::ExternalServiceTimeout,
            },
            AppErrorKind::Validation(_) => ErrorCode::ValidationError,
        }
    }

    /// Get user-facing error message
    pub fn user_message(&self) -> String {
        match &self.kind {
            AppErrorKind::Domain(err) => match err {
                DomainError::AlreadyVip { .. } => "You are already a member".to_string(),
                DomainError::PaymentNotFound { order_id } => {
                    format!("Payment '{}' not found", order_id)
                }
                DomainError::PaymentStateConflict { order_id, status } => {
                    format!("Payment '{}' is already {}", order_id, status)
                }
                DomainError::PurposeMismatch { order_id, .. } => {
                    format!("Payment '{}' is not eligible for this callback", order_id)
                }
                DomainError::UserNotFound { user_id } => {
                    format!("User '{}' not found", user_id)
                }
                DomainError::ChatNotFound { chat_id } => {
                    format!("Chat '{}' not found", chat_id)
                }
                DomainError::ChatRequestNotFound { request_id } => {
                    format!("Chat request '{}' not found", request_id)
                }
                DomainError::ChatRequestStateConflict { request_id, status } => {
                    format!("Chat request '{}' is already {}", request_id, status)
                }
                DomainError::ChatNotAccepted { .. } => {
                    "This chat has not been accepted yet".to_string()
                }
            },
            AppErrorKind::Infrastructure(_) => {
                "Service temporarily unavailable. Please try again later".to_string()
            }
            AppErrorKind::External(err) => match err {
                ExternalError::PaymentGateway { is_retryable, .. } => {
                    if *is_retryable {
                        "Payment gateway is temporarily unavailable. Please try again"
                            .to_string()
                    } else {
                        "Payment processing failed. Please contact support".to_string()
                    }
                }
                ExternalError::RateLimit {
                    service,
                    retry_after,
                } => {
                    if let Some(secs) = retry_after {
                        format!(
                            "Rate limit exceeded for {}. Please try again in {} seconds",
                            service, secs
                        )
                    } else {
                        format!("Rate limit exceeded for {}. Please try again later", service)
                    }
                }
                ExternalError::Timeout {
                    service,
                    timeout_secs,
                } => {
                    format!(
                        "{} request timed out after {} seconds. Please try again",
                        service, timeout_secs
                    )
                }
            },
            AppErrorKind::Validation(err) => match err {
                ValidationError::MissingField { field } => {
                    format!("Required field '{}' is missing", field)
                }
                ValidationError::InvalidField { field, reason } => {
                    format!("Invalid field '{}': {}", field, reason)
                }
            },
        }
    }

    /// Check if error is retryable
    pub fn is_retryable(&self) -> bool {
        match &self.kind {
            AppErrorKind::Domain(_) => false,
            AppErrorKind::Infrastructure(err) => match err {
                InfrastructureError::Database { is_retryable, .. } => *is_retryable,
                InfrastructureError::Configuration { .. } => false,
            },
            AppErrorKind::External(err) => match err {
                ExternalError::PaymentGateway { is_retryable, .. } => *is_retryable,
                ExternalError::RateLimit { .. } => true,
                ExternalError::Timeout { .. } => true,
            },
            AppErrorKind::Validation(_) => false,
        }
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.user_message())
    }
}

impl std::error::Error for AppError {}

/// Result type for operations that can fail with AppError
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn already_vip_is_a_conflict() {
        let error = AppError::domain(DomainError::AlreadyVip {
            user_id: "u1".to_string(),
        });

        assert_eq!(error.status_code(), 409);
        assert_eq!(error.error_code(), ErrorCode::AlreadyVip);
        assert!(error.user_message().contains("already a member"));
        assert!(!error.is_retryable());
    }

    #[test]
    fn not_found_does_not_distinguish_ownership() {
        // Absent payment and not-owned payment produce the same error
        let absent = AppError::domain(DomainError::PaymentNotFound {
            order_id: "p1".to_string(),
        });
        let not_owned = AppError::domain(DomainError::PaymentNotFound {
            order_id: "p1".to_string(),
        });

        assert_eq!(absent.status_code(), not_owned.status_code());
        assert_eq!(absent.user_message(), not_owned.user_message());
    }

    #[test]
    fn purpose_mismatch_is_a_bad_request() {
        let error = AppError::domain(DomainError::PurposeMismatch {
            order_id: "p1".to_string(),
            purpose: "tip".to_string(),
        });

        assert_eq!(error.status_code(), 400);
        assert_eq!(error.error_code(), ErrorCode::PurposeMismatch);
    }

    #[test]
    fn gateway_error_maps_to_bad_gateway() {
        let error = AppError::new(AppErrorKind::External(ExternalError::PaymentGateway {
            message: "boom".to_string(),
            is_retryable: true,
        }));

        assert_eq!(error.status_code(), 502);
        assert!(error.is_retryable());
    }

    #[test]
    fn validation_error_maps_to_bad_request() {
        let error = AppError::validation(ValidationError::MissingField {
            field: "content".to_string(),
        });

        assert_eq!(error.status_code(), 400);
        assert_eq!(error.error_code(), ErrorCode::ValidationError);
        assert!(!error.is_retryable());
    }
}
