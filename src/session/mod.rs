//! Session custodian
//!
//! The [`SessionManager`] is the single owner of session state: it installs
//! an authentication outcome as an encrypted session cookie, clears it on
//! logout, and exposes a readable view for the route guard. It also carries
//! the two transient payloads the login flow needs between requests: the
//! serialized flow state and the one-shot pending-login marker.
//!
//! Both `install` and `logout` are idempotent: installing the same outcome
//! twice yields an equivalent session, and logging out without a session is
//! a no-op on the client.

pub mod cookie;

use actix_web::{cookie::Cookie, HttpRequest};
use anyhow::{anyhow, Result};
use chrono::Utc;
use log::debug;
use std::sync::Mutex;

use crate::flow::{FlowState, SessionInstaller};
use crate::models::{AuthOutcome, GatehouseSession, PendingLogin};
use crate::session::cookie::{
    create_expired_cookie, CookieFactory, FLOW_COOKIE, PENDING_COOKIE, SESSION_COOKIE,
};
use crate::utils::crypto::{decrypt_data, derive_encryption_key};

/// Session manager for stateless encrypted session handling.
#[derive(Clone)]
pub struct SessionManager {
    encryption_key: [u8; 32],
    cookie_secure: bool,
    cookie_factory: CookieFactory,
}

impl SessionManager {
    #[must_use]
    pub fn new(key: &[u8], cookie_secure: bool, session_duration_hours: u64) -> Self {
        let encryption_key = derive_encryption_key(key);
        let cookie_factory =
            CookieFactory::new(encryption_key, cookie_secure, session_duration_hours);

        Self {
            encryption_key,
            cookie_secure,
            cookie_factory,
        }
    }

    #[must_use]
    pub fn cookie_secure(&self) -> bool {
        self.cookie_secure
    }

    // -------------------------------------------------------------------
    // Session install / logout / read
    // -------------------------------------------------------------------

    /// Materialize an authentication outcome as the session cookie.
    ///
    /// An absent user record still establishes the session, with an empty
    /// object in its place.
    ///
    /// # Errors
    ///
    /// Returns an error when the outcome carries no tokens or encryption
    /// fails.
    pub fn install(&self, outcome: &AuthOutcome) -> Result<Cookie<'static>> {
        let tokens = outcome
            .tokens
            .clone()
            .ok_or_else(|| anyhow!("cannot install a session without tokens"))?;
        let session = GatehouseSession {
            tokens,
            user: outcome.user.clone().unwrap_or_else(|| serde_json::json!({})),
            established_at: Utc::now(),
        };
        self.cookie_factory.create_session_cookie(&session)
    }

    /// Expired session cookie clearing any established session. Safe to
    /// call when no session exists.
    #[must_use]
    pub fn logout(&self) -> Cookie<'static> {
        create_expired_cookie(SESSION_COOKIE, self.cookie_secure)
    }

    /// Decrypt the session cookie from a request, if present and intact.
    ///
    /// An undecryptable cookie is treated as no session rather than an
    /// error; the guard will send the visitor back through sign-in.
    #[must_use]
    pub fn session_from_request(&self, req: &HttpRequest) -> Option<GatehouseSession> {
        let cookie = req.cookie(SESSION_COOKIE)?;
        if cookie.value().is_empty() {
            return None;
        }
        match decrypt_data::<GatehouseSession>(cookie.value(), &self.encryption_key) {
            Ok(session) => Some(session),
            Err(e) => {
                debug!("failed to decrypt session cookie: {e}");
                None
            }
        }
    }

    /// Readable authentication view for the route guard.
    #[must_use]
    pub fn is_authenticated(&self, req: &HttpRequest) -> bool {
        self.session_from_request(req).is_some()
    }

    // -------------------------------------------------------------------
    // Flow state persistence
    // -------------------------------------------------------------------

    /// Encrypt a flow-state snapshot into its cookie.
    ///
    /// # Errors
    ///
    /// Returns an error if encryption fails
    pub fn flow_cookie(&self, state: &FlowState) -> Result<Cookie<'static>> {
        self.cookie_factory.create_flow_cookie(state)
    }

    /// Rehydrate the flow state from a request; a missing or undecryptable
    /// cookie yields a fresh flow at the initial stage.
    #[must_use]
    pub fn flow_from_request(&self, req: &HttpRequest) -> FlowState {
        let Some(cookie) = req.cookie(FLOW_COOKIE) else {
            return FlowState::default();
        };
        if cookie.value().is_empty() {
            return FlowState::default();
        }
        match decrypt_data::<FlowState>(cookie.value(), &self.encryption_key) {
            Ok(state) => state,
            Err(e) => {
                debug!("failed to decrypt flow cookie; starting fresh: {e}");
                FlowState::default()
            }
        }
    }

    #[must_use]
    pub fn clear_flow_cookie(&self) -> Cookie<'static> {
        create_expired_cookie(FLOW_COOKIE, self.cookie_secure)
    }

    // -------------------------------------------------------------------
    // Pending-login one-shot
    // -------------------------------------------------------------------

    /// Encrypt the pending-login marker written before the provider
    /// redirect.
    ///
    /// # Errors
    ///
    /// Returns an error if encryption fails
    pub fn pending_cookie(&self, pending: &PendingLogin) -> Result<Cookie<'static>> {
        self.cookie_factory.create_pending_cookie(pending)
    }

    /// Read the pending-login marker, if one survived the round trip.
    #[must_use]
    pub fn pending_from_request(&self, req: &HttpRequest) -> Option<PendingLogin> {
        let cookie = req.cookie(PENDING_COOKIE)?;
        if cookie.value().is_empty() {
            return None;
        }
        match decrypt_data::<PendingLogin>(cookie.value(), &self.encryption_key) {
            Ok(pending) => Some(pending),
            Err(e) => {
                debug!("failed to decrypt pending-login cookie: {e}");
                None
            }
        }
    }

    #[must_use]
    pub fn clear_pending_cookie(&self) -> Cookie<'static> {
        create_expired_cookie(PENDING_COOKIE, self.cookie_secure)
    }
}

/// Per-request installer that captures the issued session cookie so the
/// HTTP layer can attach it to the response it is building.
pub struct IssuedSession {
    manager: SessionManager,
    slot: Mutex<Option<Cookie<'static>>>,
}

impl IssuedSession {
    #[must_use]
    pub fn new(manager: SessionManager) -> Self {
        Self {
            manager,
            slot: Mutex::new(None),
        }
    }

    /// Take the cookie issued by a successful install, if any.
    #[must_use]
    pub fn take(&self) -> Option<Cookie<'static>> {
        self.slot.lock().ok().and_then(|mut slot| slot.take())
    }
}

impl SessionInstaller for IssuedSession {
    fn install(&self, outcome: &AuthOutcome) -> Result<()> {
        let cookie = self.manager.install(outcome)?;
        let mut slot = self
            .slot
            .lock()
            .map_err(|_| anyhow!("session installer lock poisoned"))?;
        *slot = Some(cookie);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::test::TestRequest;
    use serde_json::json;

    fn manager() -> SessionManager {
        SessionManager::new(b"test_secret_key_32_bytes_long!!!", false, 24)
    }

    fn outcome() -> AuthOutcome {
        AuthOutcome {
            tokens: Some(json!({"access": "t"})),
            user: Some(json!({"id": 1})),
        }
    }

    #[test]
    fn test_install_then_read_roundtrip() {
        let manager = manager();
        let cookie = manager.install(&outcome()).unwrap();

        let req = TestRequest::default().cookie(cookie).to_http_request();
        let session = manager.session_from_request(&req).unwrap();

        assert_eq!(session.tokens, json!({"access": "t"}));
        assert_eq!(session.user, json!({"id": 1}));
        assert!(manager.is_authenticated(&req));
    }

    #[test]
    fn test_install_without_user_keeps_empty_record() {
        let manager = manager();
        let cookie = manager
            .install(&AuthOutcome {
                tokens: Some(json!({"access": "t"})),
                user: None,
            })
            .unwrap();

        let req = TestRequest::default().cookie(cookie).to_http_request();
        let session = manager.session_from_request(&req).unwrap();
        assert_eq!(session.user, json!({}));
    }

    #[test]
    fn test_install_without_tokens_is_rejected() {
        let manager = manager();
        assert!(manager.install(&AuthOutcome::default()).is_err());
    }

    #[test]
    fn test_install_is_idempotent_for_identical_tokens() {
        let manager = manager();
        let first = manager.install(&outcome()).unwrap();
        let second = manager.install(&outcome()).unwrap();

        let read = |cookie: Cookie<'static>| {
            let req = TestRequest::default().cookie(cookie).to_http_request();
            manager.session_from_request(&req).unwrap()
        };
        let (a, b) = (read(first), read(second));
        assert_eq!(a.tokens, b.tokens);
        assert_eq!(a.user, b.user);
    }

    #[test]
    fn test_logout_is_idempotent() {
        let manager = manager();
        let first = manager.logout();
        let second = manager.logout();

        assert_eq!(first.value(), "");
        assert_eq!(first.value(), second.value());
        assert_eq!(first.max_age(), second.max_age());
    }

    #[test]
    fn test_unauthenticated_without_cookie() {
        let manager = manager();
        let req = TestRequest::default().to_http_request();
        assert!(!manager.is_authenticated(&req));
    }

    #[test]
    fn test_tampered_session_cookie_is_no_session() {
        let manager = manager();
        let cookie = Cookie::new(cookie::SESSION_COOKIE, "tampered-value");
        let req = TestRequest::default().cookie(cookie).to_http_request();
        assert!(!manager.is_authenticated(&req));
    }

    #[test]
    fn test_flow_state_roundtrip_and_fresh_fallback() {
        let manager = manager();
        let mut state = FlowState::default();
        state.form.email = "a@b.com".to_string();

        let cookie = manager.flow_cookie(&state).unwrap();
        let req = TestRequest::default().cookie(cookie).to_http_request();
        assert_eq!(manager.flow_from_request(&req).form.email, "a@b.com");

        // Garbage flows fall back to a fresh machine, not an error.
        let req = TestRequest::default()
            .cookie(Cookie::new(cookie::FLOW_COOKIE, "garbage"))
            .to_http_request();
        assert_eq!(manager.flow_from_request(&req).form.email, "");
    }

    #[test]
    fn test_pending_login_roundtrip() {
        let manager = manager();
        let pending = PendingLogin {
            provider: "google".to_string(),
            issued_at: Utc::now(),
        };
        let cookie = manager.pending_cookie(&pending).unwrap();
        let req = TestRequest::default().cookie(cookie).to_http_request();

        let read = manager.pending_from_request(&req).unwrap();
        assert_eq!(read.provider, "google");
    }

    #[test]
    fn test_issued_session_captures_cookie_once() {
        let manager = manager();
        let installer = IssuedSession::new(manager.clone());

        installer.install(&outcome()).unwrap();
        assert!(installer.take().is_some());
        // The slot is drained after take.
        assert!(installer.take().is_none());
    }
}
