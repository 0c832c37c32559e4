// ── Session manager ──
//
// Owns the router session cookie. Login is single-flight: the token slot
// is held behind an async mutex for the duration of a login, and callers
// that queued behind an attempt take its outcome instead of starting
// another one.

use std::sync::atomic::{AtomicU64, Ordering};

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use secrecy::{ExposeSecret, SecretString};
use tokio::sync::{Mutex, watch};
use tracing::{debug, info, warn};

use crate::endpoints;
use crate::error::Error;
use crate::response::RawResponse;
use crate::transport::Transport;

/// Router login credentials.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub username: String,
    pub password: SecretString,
}

/// Observable session state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Unauthenticated,
    Authenticating,
    Authenticated,
}

/// Exclusive owner of the session token.
pub struct SessionManager {
    transport: Transport,
    origin: String,
    credentials: Option<Credentials>,
    token: Mutex<Option<String>>,
    /// Bumped every time a login attempt finishes, whatever its outcome.
    logins: AtomicU64,
    state: watch::Sender<SessionState>,
}

impl SessionManager {
    pub fn new(transport: Transport, credentials: Option<Credentials>) -> Self {
        let origin = format!("http://{}", transport.config().host_header());
        let (state, _) = watch::channel(SessionState::Unauthenticated);
        Self {
            transport,
            origin,
            credentials,
            token: Mutex::new(None),
            logins: AtomicU64::new(0),
            state,
        }
    }

    /// Current token, logging in first if there is none.
    ///
    /// Login failure is not an error here: `None` is returned and the
    /// caller carries on unauthenticated.
    pub async fn ensure_token(&self) -> Option<String> {
        let seen = self.logins.load(Ordering::Acquire);
        let mut slot = self.token.lock().await;

        if let Some(ref token) = *slot {
            return Some(token.clone());
        }
        if self.logins.load(Ordering::Acquire) != seen {
            // An attempt finished while we were queued and left no token.
            return None;
        }

        *slot = self.run_login().await;
        slot.clone()
    }

    /// Drop the token and log in again, unconditionally.
    pub async fn relogin(&self) -> Option<String> {
        let mut slot = self.token.lock().await;
        *slot = None;
        *slot = self.run_login().await;
        slot.clone()
    }

    /// Forget the token so the next cycle starts from a clean login.
    pub async fn invalidate(&self) {
        let mut slot = self.token.lock().await;
        if slot.take().is_some() {
            debug!("session token invalidated");
        }
        self.state.send_replace(SessionState::Unauthenticated);
    }

    /// Token currently held, without logging in.
    pub async fn token(&self) -> Option<String> {
        self.token.lock().await.clone()
    }

    pub fn state(&self) -> SessionState {
        *self.state.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    pub fn has_credentials(&self) -> bool {
        self.credentials.is_some()
    }

    /// Perform one login request.
    ///
    /// Returns `AuthenticationFailed` when the router answered without a
    /// `Set-Cookie` header; transport errors pass through unchanged.
    pub async fn login(&self) -> Result<String, Error> {
        let Some(ref creds) = self.credentials else {
            return Err(Error::AuthenticationFailed {
                message: "no credentials configured".into(),
            });
        };

        let body = endpoints::login_body(
            &encode_credential(&creds.username),
            &encode_credential(creds.password.expose_secret()),
        );
        let request = endpoints::post(body, &self.origin);

        debug!(username = %creds.username, "logging in");
        let raw = self.transport.send(&request).await?;

        RawResponse::parse(&raw)
            .session_cookie()
            .ok_or_else(|| Error::AuthenticationFailed {
                message: "router reply carried no session cookie".into(),
            })
    }

    async fn run_login(&self) -> Option<String> {
        if self.credentials.is_none() {
            self.logins.fetch_add(1, Ordering::AcqRel);
            return None;
        }

        self.state.send_replace(SessionState::Authenticating);
        let outcome = match self.login().await {
            Ok(token) => {
                info!("router session established");
                self.state.send_replace(SessionState::Authenticated);
                Some(token)
            }
            Err(e) => {
                warn!(error = %e, "login failed, continuing unauthenticated");
                self.state.send_replace(SessionState::Unauthenticated);
                None
            }
        };
        self.logins.fetch_add(1, Ordering::AcqRel);
        outcome
    }
}

/// Base64, then URL-encode, one credential value.
pub fn encode_credential(raw: &str) -> String {
    let b64 = STANDARD.encode(raw.as_bytes());
    url::form_urlencoded::byte_serialize(b64.as_bytes()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn credentials_are_base64_then_urlencoded() {
        // "admin" -> "YWRtaW4=" -> '=' escaped
        assert_eq!(encode_credential("admin"), "YWRtaW4%3D");
        // '>' and '?' produce '+' and '/' in base64
        assert_eq!(STANDARD.encode(">>>???"), "Pj4+Pz8/");
        assert_eq!(encode_credential(">>>???"), "Pj4%2BPz8%2F");
    }

    #[tokio::test]
    async fn no_credentials_means_no_token_and_no_traffic() {
        let transport = Transport::new(crate::transport::TransportConfig {
            host: "127.0.0.1".into(),
            port: 9,
            timeout: std::time::Duration::from_millis(50),
        });
        let session = SessionManager::new(transport, None);

        assert_eq!(session.ensure_token().await, None);
        assert_eq!(session.state(), SessionState::Unauthenticated);
        assert!(matches!(
            session.login().await,
            Err(Error::AuthenticationFailed { .. })
        ));
    }
}
