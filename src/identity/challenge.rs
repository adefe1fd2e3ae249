//! OTP challenge client
//!
//! Issues and answers one-time-passcode challenges against the identity
//! service. Holds no flow state beyond the shared HTTP client.

use crate::identity::{error_message, ChallengeService, IdentityError};
use crate::models::{AuthOutcome, ChallengeReceipt};
use async_trait::async_trait;
use log::debug;
use serde_json::json;

const GENERIC_SEND_FAILURE: &str = "The email address was not accepted.";
const GENERIC_VERIFY_FAILURE: &str = "The code is invalid or has expired.";

/// Stateless client for the OTP endpoints of the identity service.
pub struct ChallengeClient {
    http_client: reqwest::Client,
    base_url: String,
}

impl ChallengeClient {
    #[must_use]
    pub fn new(base_url: &str) -> Self {
        Self {
            http_client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }
}

#[async_trait]
impl ChallengeService for ChallengeClient {
    async fn send_challenge(
        &self,
        email: &str,
        audience: &[String],
    ) -> Result<ChallengeReceipt, IdentityError> {
        if email.trim().is_empty() {
            return Err(IdentityError::Validation(
                "Enter an email address.".to_string(),
            ));
        }
        if audience.is_empty() {
            return Err(IdentityError::Configuration(
                "at least one audience tag is required".to_string(),
            ));
        }

        let response = self
            .http_client
            .post(self.endpoint("/otp/send"))
            .json(&json!({ "email": email, "audience": audience }))
            .send()
            .await
            .map_err(|e| IdentityError::Network(format!("failed to reach identity service: {e}")))?;

        let status = response.status();
        if status.is_success() {
            let receipt: ChallengeReceipt = response.json().await.map_err(|e| {
                IdentityError::MalformedResponse(format!("otp send response: {e}"))
            })?;
            debug!("OTP challenge issued for submitted email");
            Ok(receipt)
        } else if status.is_client_error() {
            let message = error_message(response)
                .await
                .unwrap_or_else(|| GENERIC_SEND_FAILURE.to_string());
            Err(IdentityError::Validation(message))
        } else {
            Err(IdentityError::Network(format!(
                "otp send returned status {status}"
            )))
        }
    }

    async fn verify_challenge(
        &self,
        email: &str,
        challenge_id: &str,
        otp: u32,
    ) -> Result<AuthOutcome, IdentityError> {
        let response = self
            .http_client
            .post(self.endpoint("/otp/verify"))
            .json(&json!({
                "email": email,
                "challenge_id": challenge_id,
                "answer": { "otp": otp },
            }))
            .send()
            .await
            .map_err(|e| IdentityError::Network(format!("failed to reach identity service: {e}")))?;

        let status = response.status();
        if status.is_success() {
            let outcome: AuthOutcome = response.json().await.map_err(|e| {
                IdentityError::MalformedResponse(format!("otp verify response: {e}"))
            })?;
            debug!(
                "OTP verify succeeded (tokens present: {})",
                outcome.tokens.is_some()
            );
            Ok(outcome)
        } else if status.is_client_error() {
            let message = error_message(response)
                .await
                .unwrap_or_else(|| GENERIC_VERIFY_FAILURE.to_string());
            Err(IdentityError::InvalidCode(message))
        } else {
            Err(IdentityError::Network(format!(
                "otp verify returned status {status}"
            )))
        }
    }
}
