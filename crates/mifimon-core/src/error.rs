// ── Core error types ──
//
// User-facing errors from mifimon-core. Consumers never see raw socket
// or parse errors directly; the `From<mifimon_api::Error>` impl maps them
// into domain-appropriate variants.

use thiserror::Error;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Connection errors ────────────────────────────────────────────
    #[error("Cannot reach router at {addr}: {reason}")]
    ConnectionFailed { addr: String, reason: String },

    #[error("Router did not respond within {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    // ── Session errors ───────────────────────────────────────────────
    #[error("Authentication failed: {message}")]
    AuthenticationFailed { message: String },

    #[error("Session expired and a fresh login did not restore it")]
    SessionExpired,

    // ── Data errors ──────────────────────────────────────────────────
    #[error("Router sent a malformed response: {message}")]
    MalformedResponse { message: String, body: String },

    // ── Configuration errors ─────────────────────────────────────────
    #[error("Configuration error: {message}")]
    Config { message: String },

    // ── Internal errors ──────────────────────────────────────────────
    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoreError {
    /// Short category label for status displays.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::ConnectionFailed { .. } => "connection",
            Self::Timeout { .. } => "timeout",
            Self::AuthenticationFailed { .. } => "auth",
            Self::SessionExpired => "session",
            Self::MalformedResponse { .. } => "malformed",
            Self::Config { .. } => "config",
            Self::Internal(_) => "internal",
        }
    }
}

// ── Conversion from transport-layer errors ───────────────────────────

impl From<mifimon_api::Error> for CoreError {
    fn from(err: mifimon_api::Error) -> Self {
        match err {
            mifimon_api::Error::ConnectTimeout { addr, timeout_secs } => {
                CoreError::ConnectionFailed {
                    addr,
                    reason: format!("connect timed out after {timeout_secs}s"),
                }
            }
            mifimon_api::Error::ReadTimeout { timeout_secs, .. } => {
                CoreError::Timeout { timeout_secs }
            }
            mifimon_api::Error::Socket(e) => CoreError::ConnectionFailed {
                addr: String::new(),
                reason: e.to_string(),
            },
            mifimon_api::Error::MalformedResponse { message, body } => {
                CoreError::MalformedResponse { message, body }
            }
            mifimon_api::Error::AuthenticationFailed { message } => {
                CoreError::AuthenticationFailed { message }
            }
            mifimon_api::Error::SessionExpired => CoreError::SessionExpired,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transport_errors_map_to_connection_variants() {
        let err: CoreError = mifimon_api::Error::ConnectTimeout {
            addr: "192.168.1.1:80".into(),
            timeout_secs: 5,
        }
        .into();
        assert!(matches!(err, CoreError::ConnectionFailed { ref addr, .. } if addr == "192.168.1.1:80"));

        let err: CoreError = mifimon_api::Error::ReadTimeout {
            addr: String::new(),
            timeout_secs: 5,
        }
        .into();
        assert!(matches!(err, CoreError::Timeout { timeout_secs: 5 }));
        assert_eq!(err.kind(), "timeout");
    }
}
