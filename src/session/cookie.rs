//! Cookie construction for the encrypted session, flow-state and
//! pending-login payloads.

use actix_web::cookie::{time::Duration, Cookie, SameSite};
use anyhow::Result;
use serde::Serialize;

use crate::utils::crypto::encrypt_data;

/// Common cookie names used across the application
pub const SESSION_COOKIE: &str = "gatehouse_session";
pub const FLOW_COOKIE: &str = "gatehouse_flow";
pub const PENDING_COOKIE: &str = "gatehouse_pending";

/// Options for cookie creation
pub struct CookieOptions {
    pub http_only: bool,
    pub secure: bool,
    pub same_site: SameSite,
    pub path: String,
    pub max_age: Duration,
}

impl Default for CookieOptions {
    fn default() -> Self {
        Self {
            http_only: true,
            secure: true,
            // Lax: the pending and session cookies must survive the
            // top-level navigation back from the provider redirect.
            same_site: SameSite::Lax,
            path: "/".to_string(),
            max_age: Duration::hours(1),
        }
    }
}

/// Cookie factory for creating encrypted cookies with proper configuration
///
/// Centralizes all cookie creation so the handlers never touch encryption
/// or cookie attributes directly.
#[derive(Clone)]
pub struct CookieFactory {
    encryption_key: [u8; 32],
    cookie_secure: bool,
    session_duration_hours: u64,
}

impl CookieFactory {
    #[must_use]
    pub fn new(encryption_key: [u8; 32], cookie_secure: bool, session_duration_hours: u64) -> Self {
        Self {
            encryption_key,
            cookie_secure,
            session_duration_hours,
        }
    }

    /// Generic method to create a cookie with encrypted data
    ///
    /// # Errors
    ///
    /// Returns an error if encryption fails
    pub fn create_cookie<T: Serialize>(
        &self,
        name: &str,
        data: Option<&T>,
        options: CookieOptions,
    ) -> Result<Cookie<'static>> {
        let value = match data {
            Some(data) => encrypt_data(data, &self.encryption_key)?,
            None => String::new(),
        };

        Ok(Cookie::build(name.to_owned(), value)
            .http_only(options.http_only)
            .secure(self.cookie_secure && options.secure)
            .same_site(options.same_site)
            .path(options.path)
            .max_age(options.max_age)
            .finish())
    }

    /// Create the encrypted session cookie, valid for the configured
    /// session duration.
    ///
    /// # Errors
    ///
    /// Returns an error if encryption fails
    pub fn create_session_cookie<T: Serialize>(&self, session: &T) -> Result<Cookie<'static>> {
        self.create_cookie(
            SESSION_COOKIE,
            Some(session),
            CookieOptions {
                max_age: Duration::hours(
                    i64::try_from(self.session_duration_hours).unwrap_or(24),
                ),
                ..Default::default()
            },
        )
    }

    /// Create the encrypted flow-state cookie carrying the login flow
    /// between requests.
    ///
    /// # Errors
    ///
    /// Returns an error if encryption fails
    pub fn create_flow_cookie<T: Serialize>(&self, state: &T) -> Result<Cookie<'static>> {
        self.create_cookie(FLOW_COOKIE, Some(state), CookieOptions::default())
    }

    /// Create the encrypted one-shot pending-login cookie spanning the
    /// provider redirect round trip.
    ///
    /// # Errors
    ///
    /// Returns an error if encryption fails
    pub fn create_pending_cookie<T: Serialize>(&self, pending: &T) -> Result<Cookie<'static>> {
        self.create_cookie(
            PENDING_COOKIE,
            Some(pending),
            CookieOptions {
                max_age: Duration::minutes(15),
                ..Default::default()
            },
        )
    }
}

/// Create an expired cookie that clears `name` on the client.
#[must_use]
pub fn create_expired_cookie(name: &str, secure: bool) -> Cookie<'static> {
    Cookie::build(name.to_owned(), String::new())
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Lax)
        .path("/")
        .max_age(Duration::ZERO)
        .finish()
}
