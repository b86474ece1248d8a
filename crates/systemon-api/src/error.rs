use thiserror::Error;

/// Top-level error type for the `systemon-api` crate.
///
/// Every gateway interaction ends in one of these variants. The
/// "device not initialized" rejection gets its own variant so callers can
/// match the recovery path explicitly instead of inspecting bodies.
/// `systemon-core` maps the rest into domain diagnostics.
#[derive(Debug, Error)]
pub enum Error {
    // ── Authentication ──────────────────────────────────────────────
    /// The gateway rejected the configured API key (HTTP 401).
    #[error("Authentication failed: {message}")]
    Authentication { message: String },

    // ── Transport ───────────────────────────────────────────────────
    /// HTTP transport error (connection refused, DNS failure, timeout, etc.)
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// TLS setup or certificate error.
    #[error("TLS error: {0}")]
    Tls(String),

    // ── Gateway ─────────────────────────────────────────────────────
    /// The device refuses commands until `POST /devices/{id}/initialize`
    /// has been issued for the current session.
    #[error("Device not initialized (HTTP {status}): {message}")]
    DeviceNotInitialized { status: u16, message: String },

    /// Any other non-2xx response. `code` is populated when the body is a
    /// structured JSON error; `body` is kept verbatim for diagnostics.
    #[error("Gateway error (HTTP {status}): {message}")]
    Gateway {
        status: u16,
        code: Option<String>,
        message: String,
        body: String,
    },

    // ── Data ────────────────────────────────────────────────────────
    /// JSON deserialization failed, with the raw body for debugging.
    #[error("Deserialization error: {message}")]
    Deserialization { message: String, body: String },
}

impl Error {
    /// Returns `true` if the gateway asked for device initialization.
    pub fn is_device_not_initialized(&self) -> bool {
        matches!(self, Self::DeviceNotInitialized { .. })
    }

    /// Returns `true` if this is a transient error worth retrying on the
    /// next poll cycle.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport(e) => e.is_timeout() || e.is_connect(),
            Self::Gateway { status, .. } => *status >= 500,
            _ => false,
        }
    }

    /// Returns `true` if this is a "not found" error.
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::Transport(e) => e.status() == Some(reqwest::StatusCode::NOT_FOUND),
            Self::Gateway { status: 404, .. } => true,
            _ => false,
        }
    }

    /// Extract the gateway error code, if available.
    pub fn api_error_code(&self) -> Option<&str> {
        match self {
            Self::Gateway { code, .. } => code.as_deref(),
            Self::DeviceNotInitialized { .. } => Some(crate::DEVICE_NOT_INITIALIZED),
            _ => None,
        }
    }

    /// HTTP status of the rejected request, when the gateway answered.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Gateway { status, .. } | Self::DeviceNotInitialized { status, .. } => {
                Some(*status)
            }
            Self::Authentication { .. } => Some(401),
            Self::Transport(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_initialized_exposes_its_code() {
        let err = Error::DeviceNotInitialized {
            status: 409,
            message: "initialize first".into(),
        };
        assert!(err.is_device_not_initialized());
        assert_eq!(err.api_error_code(), Some("DeviceNotInitialized"));
        assert_eq!(err.status(), Some(409));
    }

    #[test]
    fn server_errors_are_transient() {
        let err = Error::Gateway {
            status: 503,
            code: None,
            message: "busy".into(),
            body: String::new(),
        };
        assert!(err.is_transient());
        assert!(!err.is_device_not_initialized());
    }

    #[test]
    fn gateway_404_is_not_found() {
        let err = Error::Gateway {
            status: 404,
            code: Some("DeviceNotFound".into()),
            message: "no such device".into(),
            body: String::new(),
        };
        assert!(err.is_not_found());
        assert!(!err.is_transient());
        assert_eq!(err.api_error_code(), Some("DeviceNotFound"));
    }
}
