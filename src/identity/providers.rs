//! Social provider client
//!
//! Lists the providers the identity service offers, builds provider
//! authorization URLs, and forwards callback results for exchange. The
//! provider round trip itself (consent screen, CSRF state) is owned by the
//! identity service; this client never talks to the provider directly.

use crate::identity::{error_message, IdentityError, ProviderDirectory};
use crate::models::{AuthOutcome, ProviderDescriptor};
use async_trait::async_trait;
use log::debug;
use serde::Deserialize;
use serde_json::json;

const GENERIC_EXCHANGE_FAILURE: &str = "Social sign-in was not completed.";

#[derive(Debug, Deserialize)]
struct ProviderListResponse {
    #[serde(default)]
    social_providers: Vec<ProviderDescriptor>,
}

/// Stateless client for the social-login endpoints of the identity service.
pub struct ProviderClient {
    http_client: reqwest::Client,
    base_url: String,
}

impl ProviderClient {
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
impl ProviderDirectory for ProviderClient {
    async fn list_providers(&self) -> Result<Vec<ProviderDescriptor>, IdentityError> {
        let response = self
            .http_client
            .get(self.endpoint("/oauth/providers"))
            .send()
            .await
            .map_err(|e| IdentityError::Network(format!("failed to reach identity service: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(IdentityError::Network(format!(
                "provider list returned status {status}"
            )));
        }

        let body: ProviderListResponse = response.json().await.map_err(|e| {
            IdentityError::MalformedResponse(format!("provider list response: {e}"))
        })?;
        debug!("identity service offers {} providers", body.social_providers.len());
        // Service order is meaningful; no re-sort.
        Ok(body.social_providers)
    }

    fn build_redirect_url(
        &self,
        provider: &str,
        audience: &[String],
        callback_url: &str,
    ) -> Result<String, IdentityError> {
        let mut url = url::Url::parse(&self.endpoint(&format!("/oauth/{provider}/authorize")))
            .map_err(|e| {
                IdentityError::Configuration(format!("invalid authorization URL: {e}"))
            })?;
        {
            let mut pairs = url.query_pairs_mut();
            for tag in audience {
                pairs.append_pair("audience", tag);
            }
            pairs.append_pair("callback_url", callback_url);
        }
        Ok(url.to_string())
    }

    async fn exchange_code(
        &self,
        provider: &str,
        audience: &[String],
        callback_url: &str,
        raw_query: &str,
    ) -> Result<AuthOutcome, IdentityError> {
        let response = self
            .http_client
            .post(self.endpoint(&format!("/oauth/{provider}/exchange")))
            .json(&json!({
                "audience": audience,
                "callback_url": callback_url,
                "query": raw_query,
            }))
            .send()
            .await
            .map_err(|e| IdentityError::Network(format!("failed to reach identity service: {e}")))?;

        let status = response.status();
        if status.is_success() {
            let outcome: AuthOutcome = response.json().await.map_err(|e| {
                IdentityError::MalformedResponse(format!("oauth exchange response: {e}"))
            })?;
            debug!(
                "oauth exchange for {provider} succeeded (tokens present: {})",
                outcome.tokens.is_some()
            );
            Ok(outcome)
        } else if status.is_client_error() {
            let message = error_message(response)
                .await
                .unwrap_or_else(|| GENERIC_EXCHANGE_FAILURE.to_string());
            Err(IdentityError::InvalidCode(message))
        } else {
            Err(IdentityError::Network(format!(
                "oauth exchange returned status {status}"
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_redirect_url_carries_audience_and_callback() {
        let client = ProviderClient::new("https://id.example.com/");
        let url = client
            .build_redirect_url(
                "google",
                &["candidate".to_string(), "staff".to_string()],
                "http://localhost:8080/oauth/callback",
            )
            .unwrap();

        assert!(url.starts_with("https://id.example.com/oauth/google/authorize?"));
        assert!(url.contains("audience=candidate"));
        assert!(url.contains("audience=staff"));
        assert!(url.contains("callback_url=http%3A%2F%2Flocalhost%3A8080%2Foauth%2Fcallback"));
    }

    #[test]
    fn test_redirect_url_is_pure_construction() {
        // No identity service is reachable here; URL building must not care.
        let client = ProviderClient::new("https://id.invalid");
        let url = client
            .build_redirect_url("github", &["candidate".to_string()], "https://app/cb")
            .unwrap();
        assert!(url.contains("/oauth/github/authorize"));
    }
}
