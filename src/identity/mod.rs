//! Identity service clients
//!
//! This module contains the HTTP clients for the external identity service:
//! the OTP challenge client and the social-provider client. Both are
//! stateless request/response wrappers; all flow sequencing lives in
//! [`crate::flow`].

pub mod challenge;
pub mod providers;

pub use challenge::ChallengeClient;
pub use providers::ProviderClient;

use crate::models::{AuthOutcome, ChallengeReceipt, ProviderDescriptor};
use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;

/// Errors surfaced by identity-service calls.
///
/// The flow layer converts every variant into a user-facing notice; none of
/// them is fatal to the application.
#[derive(Debug, Clone, Error)]
pub enum IdentityError {
    /// Malformed email or code; user-correctable, shown inline.
    #[error("{0}")]
    Validation(String),
    /// Wrong or expired one-time code; prompts re-entry or re-send.
    #[error("{0}")]
    InvalidCode(String),
    /// Transport or service failure.
    #[error("network error: {0}")]
    Network(String),
    /// Success response missing expected fields.
    #[error("malformed response: {0}")]
    MalformedResponse(String),
    /// Local misconfiguration, such as an unparseable base URL.
    #[error("configuration error: {0}")]
    Configuration(String),
}

/// OTP challenge operations against the identity service.
#[async_trait]
pub trait ChallengeService: Send + Sync {
    /// Request a one-time code for `email`, scoped to the given role tags.
    ///
    /// # Errors
    ///
    /// Returns [`IdentityError::Validation`] when the service rejects the
    /// email format, [`IdentityError::Network`] on transport failure. No
    /// retry is attempted; the caller decides whether to re-prompt.
    async fn send_challenge(
        &self,
        email: &str,
        audience: &[String],
    ) -> Result<ChallengeReceipt, IdentityError>;

    /// Redeem the emailed code against a previously issued challenge.
    ///
    /// # Errors
    ///
    /// Returns [`IdentityError::InvalidCode`] for a wrong or expired code,
    /// [`IdentityError::Network`] on transport failure,
    /// [`IdentityError::MalformedResponse`] when the success body cannot be
    /// parsed.
    async fn verify_challenge(
        &self,
        email: &str,
        challenge_id: &str,
        otp: u32,
    ) -> Result<AuthOutcome, IdentityError>;
}

/// Social-provider operations against the identity service.
#[async_trait]
pub trait ProviderDirectory: Send + Sync {
    /// List the available social providers, in service order.
    ///
    /// An empty list is a valid result, not an error.
    ///
    /// # Errors
    ///
    /// Returns [`IdentityError::Network`] on transport failure.
    async fn list_providers(&self) -> Result<Vec<ProviderDescriptor>, IdentityError>;

    /// Build the provider authorization URL. Pure construction; the
    /// full-page navigation is a side effect performed by the caller.
    ///
    /// # Errors
    ///
    /// Returns [`IdentityError::Configuration`] when the URL cannot be
    /// constructed from the configured base.
    fn build_redirect_url(
        &self,
        provider: &str,
        audience: &[String],
        callback_url: &str,
    ) -> Result<String, IdentityError>;

    /// Forward the raw callback query string to the identity service and
    /// exchange it for an authentication outcome.
    ///
    /// # Errors
    ///
    /// Returns [`IdentityError::InvalidCode`] when the service rejects the
    /// authorization result, [`IdentityError::Network`] on transport
    /// failure, [`IdentityError::MalformedResponse`] on an unparseable
    /// success body.
    async fn exchange_code(
        &self,
        provider: &str,
        audience: &[String],
        callback_url: &str,
        raw_query: &str,
    ) -> Result<AuthOutcome, IdentityError>;
}

/// Structured error body the identity service attaches to 4xx responses.
#[derive(Debug, Deserialize)]
pub(crate) struct ApiErrorBody {
    #[serde(default)]
    errors: Vec<ApiFieldError>,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ApiFieldError {
    #[serde(default)]
    #[allow(dead_code)]
    field: Option<String>,
    message: String,
}

impl ApiErrorBody {
    /// First structured validation message, falling back to the top-level
    /// message when the error list is empty.
    fn first_message(&self) -> Option<String> {
        self.errors
            .first()
            .map(|e| e.message.clone())
            .or_else(|| self.message.clone())
    }
}

/// Extract the first structured error message from a non-success response.
///
/// Consumes the response body; returns `None` when the body is not the
/// structured error shape.
pub(crate) async fn error_message(response: reqwest::Response) -> Option<String> {
    response
        .json::<ApiErrorBody>()
        .await
        .ok()
        .and_then(|body| body.first_message())
}
