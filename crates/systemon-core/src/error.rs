// ── Core error types ──
//
// Domain errors from systemon-core. Consumers never match on reqwest or
// serde errors directly; the `From<systemon_api::Error>` impl translates
// transport-layer failures into these variants.

use thiserror::Error;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Connection errors ────────────────────────────────────────────
    #[error("Cannot reach gateway at {url}: {reason}")]
    ConnectionFailed { url: String, reason: String },

    #[error("Authentication failed: {message}")]
    AuthenticationFailed { message: String },

    #[error("Gateway request timed out")]
    Timeout,

    // ── Device errors ────────────────────────────────────────────────
    #[error("Device not found: {identifier}")]
    DeviceNotFound { identifier: String },

    /// The detail payload could not be turned into a record (no model,
    /// no hardware id). The device is evicted when this happens.
    #[error("Unable to retrieve device {hardware_id}: {message}")]
    DeviceRetrieval {
        hardware_id: String,
        message: String,
    },

    /// Still not initialized after the single initialize-and-retry.
    #[error("Device {hardware_id} not initialized: {message}")]
    DeviceNotInitialized {
        hardware_id: String,
        message: String,
    },

    // ── Gateway errors (wrapped, not exposed raw) ────────────────────
    #[error("Gateway error: {message}")]
    Api {
        message: String,
        /// Structured error code from the response body, when present.
        code: Option<String>,
        /// HTTP status code (if applicable).
        status: Option<u16>,
    },

    #[error("Malformed gateway payload: {message}")]
    MalformedPayload { message: String },

    // ── Caller errors ────────────────────────────────────────────────
    #[error("Invalid argument: {message}")]
    InvalidArgument { message: String },

    #[error("Validation failed: {message}")]
    ValidationFailed { message: String },

    // ── Configuration errors ─────────────────────────────────────────
    #[error("Configuration error: {message}")]
    Config { message: String },

    // ── Internal errors ──────────────────────────────────────────────
    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoreError {
    /// Category half of an error-tracker key (`<category>[<hardwareId>]`).
    pub fn category(&self) -> &'static str {
        match self {
            Self::DeviceRetrieval { .. } | Self::DeviceNotFound { .. } => {
                "DeviceRetrievalException"
            }
            Self::ConnectionFailed { .. } | Self::Timeout => "TransportException",
            Self::AuthenticationFailed { .. } => "AuthenticationException",
            Self::DeviceNotInitialized { .. } => "DeviceNotInitializedException",
            Self::Api { .. } => "GatewayException",
            Self::MalformedPayload { .. } => "MalformedPayloadException",
            Self::InvalidArgument { .. } | Self::ValidationFailed { .. } => {
                "IllegalArgumentException"
            }
            Self::Config { .. } => "ConfigurationException",
            Self::Internal(_) => "InternalException",
        }
    }
}

// ── Conversion from transport-layer errors ───────────────────────────

impl From<systemon_api::Error> for CoreError {
    fn from(err: systemon_api::Error) -> Self {
        match err {
            systemon_api::Error::Authentication { message } => {
                CoreError::AuthenticationFailed { message }
            }
            systemon_api::Error::Transport(ref e) => {
                if e.is_timeout() {
                    CoreError::Timeout
                } else if e.is_connect() {
                    CoreError::ConnectionFailed {
                        url: e
                            .url()
                            .map_or_else(|| "<unknown>".into(), ToString::to_string),
                        reason: e.to_string(),
                    }
                } else {
                    CoreError::Api {
                        message: e.to_string(),
                        code: None,
                        status: e.status().map(|s| s.as_u16()),
                    }
                }
            }
            systemon_api::Error::InvalidUrl(e) => CoreError::Config {
                message: format!("Invalid URL: {e}"),
            },
            systemon_api::Error::Tls(msg) => CoreError::ConnectionFailed {
                url: String::new(),
                reason: format!("TLS error: {msg}"),
            },
            systemon_api::Error::DeviceNotInitialized { message, .. } => {
                CoreError::DeviceNotInitialized {
                    hardware_id: String::new(),
                    message,
                }
            }
            systemon_api::Error::Gateway {
                status: 404,
                message,
                ..
            } => CoreError::DeviceNotFound {
                identifier: message,
            },
            systemon_api::Error::Gateway {
                status,
                code,
                message,
                body: _,
            } => CoreError::Api {
                message,
                code,
                status: Some(status),
            },
            systemon_api::Error::Deserialization { message, body: _ } => {
                CoreError::MalformedPayload { message }
            }
        }
    }
}
