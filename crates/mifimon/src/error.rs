//! CLI error types with miette diagnostics.
//!
//! Maps `CoreError` and `ConfigError` into user-facing errors with
//! actionable help text and stable process exit codes.

use miette::Diagnostic;
use thiserror::Error;

use mifimon_config::ConfigError;
use mifimon_core::CoreError;

pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const AUTH: i32 = 3;
    pub const CONNECTION: i32 = 7;
    pub const TIMEOUT: i32 = 8;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Connection ───────────────────────────────────────────────────
    #[error("Could not reach the router at {addr}")]
    #[diagnostic(
        code(mifimon::connection_failed),
        help(
            "Check that the hotspot is powered on and this machine is joined to its Wi-Fi.\n\
             Reason: {reason}\n\
             Try: mifimon latency --host <router-ip>"
        )
    )]
    ConnectionFailed { addr: String, reason: String },

    #[error("Router did not answer within {seconds}s")]
    #[diagnostic(
        code(mifimon::timeout),
        help("Increase the timeout with --timeout or check the router's signal and load.")
    )]
    Timeout { seconds: u64 },

    // ── Authentication ───────────────────────────────────────────────
    #[error("Authentication failed: {message}")]
    #[diagnostic(
        code(mifimon::auth_failed),
        help(
            "Verify the username and password for this profile.\n\
             Run: mifimon config set-password"
        )
    )]
    AuthFailed { message: String },

    #[error("Router session expired and logging in again did not restore it")]
    #[diagnostic(
        code(mifimon::session_expired),
        help("Another client may have taken over the admin session. Retry in a few seconds.")
    )]
    SessionExpired,

    #[error("No password available for profile '{profile}'")]
    #[diagnostic(
        code(mifimon::no_password),
        help(
            "Store one with: mifimon config set-password --profile {profile}\n\
             Or set the MIFIMON_PASSWORD environment variable."
        )
    )]
    NoPassword { profile: String },

    // ── Router data ──────────────────────────────────────────────────
    #[error("Router sent an unexpected response: {message}")]
    #[diagnostic(
        code(mifimon::malformed_response),
        help("Run again with -vv to log the raw exchange.")
    )]
    MalformedResponse { message: String },

    #[error("No device with MAC '{mac}' has usage history")]
    #[diagnostic(
        code(mifimon::unknown_device),
        help("Run: mifimon devices to see connected devices")
    )]
    UnknownDevice { mac: String },

    // ── Configuration ────────────────────────────────────────────────
    #[error("Profile '{name}' not found in configuration")]
    #[diagnostic(
        code(mifimon::profile_not_found),
        help(
            "Available profiles: {available}\n\
             Create one with: mifimon config init"
        )
    )]
    ProfileNotFound { name: String, available: String },

    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(mifimon::validation))]
    Validation { field: String, reason: String },

    #[error("{0}")]
    #[diagnostic(code(mifimon::config))]
    Config(String),

    #[error("Keyring error: {0}")]
    #[diagnostic(
        code(mifimon::keyring),
        help("Set MIFIMON_PASSWORD or store the password in the profile instead.")
    )]
    Keyring(String),

    // ── Interactive ──────────────────────────────────────────────────
    #[error("Destructive operation '{action}' requires confirmation")]
    #[diagnostic(
        code(mifimon::confirmation_required),
        help("Use --yes (-y) to skip confirmation in non-interactive contexts.")
    )]
    NonInteractiveRequiresYes { action: String },

    // ── IO / Serialization ───────────────────────────────────────────
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Failed to render output: {0}")]
    #[diagnostic(code(mifimon::render))]
    Render(String),

    #[error("Internal error: {0}")]
    #[diagnostic(code(mifimon::internal))]
    Internal(String),
}

impl CliError {
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::ConnectionFailed { .. } => exit_code::CONNECTION,
            Self::Timeout { .. } => exit_code::TIMEOUT,
            Self::AuthFailed { .. } | Self::SessionExpired | Self::NoPassword { .. } => {
                exit_code::AUTH
            }
            Self::Validation { .. }
            | Self::ProfileNotFound { .. }
            | Self::NonInteractiveRequiresYes { .. } => exit_code::USAGE,
            _ => exit_code::GENERAL,
        }
    }
}

// ── CoreError → CliError mapping ─────────────────────────────────────

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::ConnectionFailed { addr, reason } => Self::ConnectionFailed {
                addr: if addr.is_empty() {
                    "(router)".into()
                } else {
                    addr
                },
                reason,
            },
            CoreError::Timeout { timeout_secs } => Self::Timeout {
                seconds: timeout_secs,
            },
            CoreError::AuthenticationFailed { message } => Self::AuthFailed { message },
            CoreError::SessionExpired => Self::SessionExpired,
            CoreError::MalformedResponse { message, body } => {
                tracing::debug!(%body, "malformed response body");
                Self::MalformedResponse { message }
            }
            CoreError::Config { message } => Self::Config(message),
            CoreError::Internal(message) => Self::Internal(message),
        }
    }
}

// ── ConfigError → CliError mapping ───────────────────────────────────

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::Validation { field, reason } => Self::Validation { field, reason },
            ConfigError::NoPassword { profile } => Self::NoPassword { profile },
            ConfigError::UnknownProfile { profile } => Self::ProfileNotFound {
                name: profile,
                available: "(none)".into(),
            },
            ConfigError::Keyring(e) => Self::Keyring(e.to_string()),
            ConfigError::Io(e) => Self::Io(e),
            other @ (ConfigError::Serialization(_) | ConfigError::Figment(_)) => {
                Self::Config(other.to_string())
            }
        }
    }
}
