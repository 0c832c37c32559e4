// ── API error types ──
//
// Transport, parse, and session failures surfaced by the router client.
// Latency probes never produce an error; they report a sentinel instead.

use thiserror::Error;

/// Top-level error type for the `mifimon-api` crate.
#[derive(Debug, Error)]
pub enum Error {
    // ── Transport ───────────────────────────────────────────────────
    /// The TCP connection did not establish within the configured bound.
    #[error("Connection to {addr} timed out after {timeout_secs}s")]
    ConnectTimeout { addr: String, timeout_secs: u64 },

    /// The peer never closed the stream within the configured bound.
    #[error("Reading from {addr} timed out after {timeout_secs}s")]
    ReadTimeout { addr: String, timeout_secs: u64 },

    /// Any other connection-level I/O failure.
    #[error("Socket error: {0}")]
    Socket(#[from] std::io::Error),

    // ── Response ────────────────────────────────────────────────────
    /// Body was neither JSON nor carried an embedded JSON object.
    #[error("Malformed response: {message}")]
    MalformedResponse {
        message: String,
        /// Excerpt of the offending body (at most 200 characters).
        body: String,
    },

    // ── Session ─────────────────────────────────────────────────────
    /// Login was attempted but no session cookie came back.
    #[error("Authentication failed: {message}")]
    AuthenticationFailed { message: String },

    /// The device list came back empty in a way that suggests the
    /// session cookie is no longer honoured.
    #[error("Session expired")]
    SessionExpired,
}

impl Error {
    /// Build a `MalformedResponse` carrying a bounded excerpt of `body`.
    pub(crate) fn malformed(message: impl Into<String>, body: &str) -> Self {
        Self::MalformedResponse {
            message: message.into(),
            body: excerpt(body),
        }
    }
}

const EXCERPT_CHARS: usize = 200;

fn excerpt(body: &str) -> String {
    body.chars().take(EXCERPT_CHARS).collect()
}
