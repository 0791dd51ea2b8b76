//! Application configuration module
//! Handles environment variable loading, configuration validation, and application settings

use std::env;
use std::str::FromStr;

use bigdecimal::BigDecimal;
use uuid::Uuid;

/// Main application configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub gateway: GatewayConfig,
    pub vip: VipConfig,
    pub support: SupportConfig,
    pub logging: LoggingConfig,
}

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub public_base_url: String,
}

/// Database configuration
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub connection_timeout: u64,   // seconds
    pub idle_timeout: Option<u64>, // seconds
}

/// Crypto payment gateway configuration
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub merchant_key: String,
    pub base_url: String,
    pub timeout_secs: u64,
    pub max_retries: u32,
    /// Percentage of underpayment the merchant absorbs (provider `underPaidCover`).
    pub under_paid_cover: f64,
    pub fee_paid_by_payer: bool,
    /// White-label deposit address lifetime, in minutes.
    pub invoice_lifetime_minutes: u32,
}

/// VIP tier pricing
#[derive(Debug, Clone)]
pub struct VipConfig {
    pub price: BigDecimal,
    pub currency: String,
}

/// Support-chat bootstrap settings
#[derive(Debug, Clone)]
pub struct SupportConfig {
    pub support_user_id: Uuid,
    pub welcome_message: String,
}

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

/// Log format options
#[derive(Debug, Clone)]
pub enum LogFormat {
    Json,
    Plain,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing environment variable: {0}")]
    MissingVariable(String),
    #[error("invalid configuration value: {0}")]
    InvalidValue(String),
}

impl AppConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if it exists
        let _ = dotenv::dotenv().ok();

        Ok(AppConfig {
            server: ServerConfig::from_env()?,
            database: DatabaseConfig::from_env()?,
            gateway: GatewayConfig::from_env()?,
            vip: VipConfig::from_env()?,
            support: SupportConfig::from_env()?,
            logging: LoggingConfig::from_env()?,
        })
    }

    /// Validate the entire configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.server.validate()?;
        self.database.validate()?;
        self.gateway.validate()?;
        self.vip.validate()?;

        Ok(())
    }
}

impl ServerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(ServerConfig {
            host: env::var("SERVER_HOST").unwrap_or_else(|_| "127.0.0.1".to_string()),
            port: env::var("SERVER_PORT")
                .unwrap_or_else(|_| "8000".to_string())
                .parse()
                .map_err(|_| ConfigError::InvalidValue("SERVER_PORT".to_string()))?,
            public_base_url: env::var("PUBLIC_BASE_URL")
                .unwrap_or_else(|_| "http://127.0.0.1:8000".to_string()),
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.port == 0 {
            return Err(ConfigError::InvalidValue(
                "SERVER_PORT cannot be 0".to_string(),
            ));
        }

        if self.host.is_empty() {
            return Err(ConfigError::InvalidValue(
                "SERVER_HOST cannot be empty".to_string(),
            ));
        }

        Ok(())
    }

    /// Absolute URL the payment provider calls back on.
    pub fn webhook_callback_url(&self) -> String {
        format!(
            "{}/api/webhooks/payment",
            self.public_base_url.trim_end_matches('/')
        )
    }

    /// Absolute URL the provider redirects the payer back to.
    pub fn payment_return_url(&self) -> String {
        format!("{}/vip", self.public_base_url.trim_end_matches('/'))
    }
}

impl DatabaseConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(DatabaseConfig {
            url: env::var("DATABASE_URL")
                .map_err(|_| ConfigError::MissingVariable("DATABASE_URL".to_string()))?,
            max_connections: env::var("DB_MAX_CONNECTIONS")
                .unwrap_or_else(|_| "20".to_string())
                .parse()
                .map_err(|_| ConfigError::InvalidValue("DB_MAX_CONNECTIONS".to_string()))?,
            min_connections: env::var("DB_MIN_CONNECTIONS")
                .unwrap_or_else(|_| "5".to_string())
                .parse()
                .map_err(|_| ConfigError::InvalidValue("DB_MIN_CONNECTIONS".to_string()))?,
            connection_timeout: env::var("DB_CONNECTION_TIMEOUT")
                .unwrap_or_else(|_| "30".to_string())
                .parse()
                .map_err(|_| ConfigError::InvalidValue("DB_CONNECTION_TIMEOUT".to_string()))?,
            idle_timeout: env::var("DB_IDLE_TIMEOUT")
                .ok()
                .and_then(|val| val.parse().ok()),
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.url.is_empty() {
            return Err(ConfigError::InvalidValue("DATABASE_URL".to_string()));
        }

        if self.max_connections == 0 {
            return Err(ConfigError::InvalidValue("DB_MAX_CONNECTIONS".to_string()));
        }

        if self.min_connections > self.max_connections {
            return Err(ConfigError::InvalidValue(
                "DB_MIN_CONNECTIONS must be <= DB_MAX_CONNECTIONS".to_string(),
            ));
        }

        Ok(())
    }
}

impl GatewayConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(GatewayConfig {
            merchant_key: env::var("GATEWAY_MERCHANT_KEY")
                .map_err(|_| ConfigError::MissingVariable("GATEWAY_MERCHANT_KEY".to_string()))?,
            base_url: env::var("GATEWAY_BASE_URL")
                .unwrap_or_else(|_| "https://api.oxapay.com/merchants".to_string()),
            timeout_secs: env::var("GATEWAY_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(30),
            max_retries: env::var("GATEWAY_MAX_RETRIES")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(3),
            under_paid_cover: env::var("GATEWAY_UNDER_PAID_COVER")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(5.0),
            fee_paid_by_payer: env::var("GATEWAY_FEE_PAID_BY_PAYER")
                .unwrap_or_else(|_| "true".to_string())
                .to_lowercase()
                != "false",
            invoice_lifetime_minutes: env::var("GATEWAY_INVOICE_LIFETIME_MINUTES")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(60),
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.merchant_key.trim().is_empty() {
            return Err(ConfigError::InvalidValue(
                "GATEWAY_MERCHANT_KEY cannot be empty".to_string(),
            ));
        }

        if self.base_url.trim().is_empty() {
            return Err(ConfigError::InvalidValue(
                "GATEWAY_BASE_URL cannot be empty".to_string(),
            ));
        }

        Ok(())
    }
}

impl VipConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let raw_price = env::var("VIP_PRICE").unwrap_or_else(|_| "50".to_string());
        Ok(VipConfig {
            price: BigDecimal::from_str(&raw_price)
                .map_err(|_| ConfigError::InvalidValue("VIP_PRICE".to_string()))?,
            currency: env::var("VIP_CURRENCY").unwrap_or_else(|_| "USD".to_string()),
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.price <= BigDecimal::from(0) {
            return Err(ConfigError::InvalidValue(
                "VIP_PRICE must be greater than 0".to_string(),
            ));
        }

        if self.currency.trim().is_empty() {
            return Err(ConfigError::InvalidValue(
                "VIP_CURRENCY cannot be empty".to_string(),
            ));
        }

        Ok(())
    }
}

impl SupportConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(SupportConfig {
            support_user_id: env::var("SUPPORT_USER_ID")
                .map_err(|_| ConfigError::MissingVariable("SUPPORT_USER_ID".to_string()))
                .and_then(|v| {
                    Uuid::parse_str(&v)
                        .map_err(|_| ConfigError::InvalidValue("SUPPORT_USER_ID".to_string()))
                })?,
            welcome_message: env::var("SUPPORT_WELCOME_MESSAGE").unwrap_or_else(|_| {
                "Welcome! A member of our support team will reply here.".to_string()
            }),
        })
    }
}

impl LoggingConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let format = match env::var("LOG_FORMAT")
            .unwrap_or_else(|_| "plain".to_string())
            .to_lowercase()
            .as_str()
        {
            "json" => LogFormat::Json,
            _ => LogFormat::Plain,
        };

        Ok(LoggingConfig {
            level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            format,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn webhook_callback_url_strips_trailing_slash() {
        let config = ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 8000,
            public_base_url: "https://example.com/".to_string(),
        };
        assert_eq!(
            config.webhook_callback_url(),
            "https://example.com/api/webhooks/payment"
        );
    }

    #[test]
    fn server_config_rejects_port_zero() {
        let config = ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 0,
            public_base_url: "http://127.0.0.1".to_string(),
        };
        assert!(config.validate().is_err());
    }
}
