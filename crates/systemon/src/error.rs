//! CLI error types with miette diagnostics.
//!
//! Maps `CoreError` and `ConfigError` into user-facing errors with
//! actionable help text.

use miette::Diagnostic;
use thiserror::Error;

use systemon_config::ConfigError;
use systemon_core::CoreError;

/// Process exit codes.
pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const AUTH: i32 = 3;
    pub const NOT_FOUND: i32 = 4;
    pub const DEVICE_STATE: i32 = 6;
    pub const CONNECTION: i32 = 7;
    pub const TIMEOUT: i32 = 8;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Connection ───────────────────────────────────────────────────
    #[error("Could not reach gateway at {url}: {reason}")]
    #[diagnostic(
        code(systemon::connection_failed),
        help(
            "Check that the gateway is running and reachable.\n\
             URL: {url}\n\
             Gateways usually listen on port 10000 with a self-signed certificate: try --insecure"
        )
    )]
    ConnectionFailed { url: String, reason: String },

    #[error("Poll cycle returned no devices")]
    #[diagnostic(
        code(systemon::poll_failed),
        help("The gateway reported:\n{details}\nRe-run with -v for request logs.")
    )]
    PollFailed { details: String },

    // ── Authentication ───────────────────────────────────────────────
    #[error("Authentication failed")]
    #[diagnostic(
        code(systemon::auth_failed),
        help(
            "Verify the API key configured for this profile.\n\
             Run: systemon config set-key"
        )
    )]
    AuthFailed,

    // ── Devices ──────────────────────────────────────────────────────
    #[error("device '{identifier}' not found")]
    #[diagnostic(
        code(systemon::not_found),
        help("Run: systemon devices list to see discovered devices")
    )]
    NotFound { identifier: String },

    #[error("device '{identifier}' is not initialized: {message}")]
    #[diagnostic(
        code(systemon::not_initialized),
        help("The gateway refused the command after one initialize attempt. Check the device in SystemOn.")
    )]
    NotInitialized { identifier: String, message: String },

    #[error("'{property}' is not a control this tool knows")]
    #[diagnostic(
        code(systemon::unknown_control),
        help("Known controls: {known}")
    )]
    UnknownControl { property: String, known: String },

    // ── API ──────────────────────────────────────────────────────────
    #[error("API error ({code}): {message}")]
    #[diagnostic(code(systemon::api_error))]
    ApiError { code: String, message: String },

    // ── Validation ───────────────────────────────────────────────────
    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(systemon::validation))]
    Validation { field: String, reason: String },

    // ── Configuration ────────────────────────────────────────────────
    #[error("Profile '{name}' not found in configuration")]
    #[diagnostic(
        code(systemon::profile_not_found),
        help(
            "Available profiles: {available}\n\
             Create one with: systemon config init"
        )
    )]
    ProfileNotFound { name: String, available: String },

    #[error("No gateway configured")]
    #[diagnostic(
        code(systemon::no_config),
        help(
            "Create a profile with: systemon config init\n\
             Or pass --host. Expected config at: {path}"
        )
    )]
    NoConfig { path: String },

    #[error("Configuration error: {message}")]
    #[diagnostic(code(systemon::config))]
    Config { message: String },

    // ── Interactive ──────────────────────────────────────────────────
    #[error("Destructive operation '{action}' requires confirmation")]
    #[diagnostic(
        code(systemon::confirmation_required),
        help("Use --yes (-y) to skip confirmation in non-interactive contexts.")
    )]
    NonInteractiveRequiresYes { action: String },

    // ── Timeout ──────────────────────────────────────────────────────
    #[error("Request timed out")]
    #[diagnostic(
        code(systemon::timeout),
        help("Increase timeout with --timeout or check gateway responsiveness.")
    )]
    Timeout,

    // ── IO / Serialization ───────────────────────────────────────────
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Serialization failed: {0}")]
    #[diagnostic(code(systemon::json))]
    Json(#[from] serde_json::Error),

    #[error("Serialization failed: {0}")]
    #[diagnostic(code(systemon::yaml))]
    Yaml(#[from] serde_yaml::Error),
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::ConnectionFailed { .. } | Self::PollFailed { .. } => exit_code::CONNECTION,
            Self::AuthFailed => exit_code::AUTH,
            Self::NotFound { .. } => exit_code::NOT_FOUND,
            Self::NotInitialized { .. } => exit_code::DEVICE_STATE,
            Self::Timeout => exit_code::TIMEOUT,
            Self::Validation { .. }
            | Self::UnknownControl { .. }
            | Self::NonInteractiveRequiresYes { .. } => exit_code::USAGE,
            _ => exit_code::GENERAL,
        }
    }
}

// ── CoreError → CliError mapping ─────────────────────────────────────

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::ConnectionFailed { url, reason } => Self::ConnectionFailed { url, reason },

            CoreError::AuthenticationFailed { .. } => Self::AuthFailed,

            CoreError::Timeout => Self::Timeout,

            CoreError::DeviceNotFound { identifier } => Self::NotFound { identifier },

            CoreError::DeviceNotInitialized {
                hardware_id,
                message,
            } => Self::NotInitialized {
                identifier: hardware_id,
                message,
            },

            CoreError::ValidationFailed { message } | CoreError::InvalidArgument { message } => {
                Self::Validation {
                    field: "input".into(),
                    reason: message,
                }
            }

            CoreError::Api { message, code, .. } => Self::ApiError {
                code: code.unwrap_or_else(|| "gateway".into()),
                message,
            },

            CoreError::Config { message } => Self::Config { message },

            other => Self::ApiError {
                code: other.category().into(),
                message: other.to_string(),
            },
        }
    }
}

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::Validation { field, reason } => Self::Validation { field, reason },
            ConfigError::UnknownProfile { name } => Self::ProfileNotFound {
                name,
                available: "(see: systemon config profiles)".into(),
            },
            ConfigError::Io(e) => Self::Io(e),
            other => Self::Config {
                message: other.to_string(),
            },
        }
    }
}
