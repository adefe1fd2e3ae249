//! Mock objects and fake implementations for testing
//!
//! Scripted stand-ins for the identity service and the session installer,
//! with call counters for asserting exactly-once semantics.

use crate::flow::SessionInstaller;
use crate::identity::{ChallengeService, IdentityError, ProviderDirectory};
use crate::models::{AuthOutcome, ChallengeReceipt, ProviderDescriptor};
use async_trait::async_trait;
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

/// Authentication outcome carrying tokens and a user record.
#[must_use]
pub fn outcome_with_tokens() -> AuthOutcome {
    AuthOutcome {
        tokens: Some(json!({"access": "t"})),
        user: Some(json!({"id": 1})),
    }
}

/// Scripted challenge service with call counters.
pub struct MockChallengeService {
    send_result: Mutex<Result<ChallengeReceipt, IdentityError>>,
    verify_result: Mutex<Result<AuthOutcome, IdentityError>>,
    send_calls: AtomicUsize,
    verify_calls: AtomicUsize,
    last_verify: Mutex<Option<(String, String, u32)>>,
}

impl MockChallengeService {
    /// Defaults: send issues challenge `c1`, verify succeeds with tokens.
    #[must_use]
    pub fn new() -> Self {
        Self {
            send_result: Mutex::new(Ok(ChallengeReceipt {
                challenge_id: "c1".to_string(),
            })),
            verify_result: Mutex::new(Ok(outcome_with_tokens())),
            send_calls: AtomicUsize::new(0),
            verify_calls: AtomicUsize::new(0),
            last_verify: Mutex::new(None),
        }
    }

    #[must_use]
    pub fn with_send_result(self, result: Result<ChallengeReceipt, IdentityError>) -> Self {
        *self.send_result.lock().unwrap() = result;
        self
    }

    #[must_use]
    pub fn with_verify_result(self, result: Result<AuthOutcome, IdentityError>) -> Self {
        *self.verify_result.lock().unwrap() = result;
        self
    }

    #[must_use]
    pub fn send_calls(&self) -> usize {
        self.send_calls.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn verify_calls(&self) -> usize {
        self.verify_calls.load(Ordering::SeqCst)
    }

    /// Arguments of the most recent verify call.
    #[must_use]
    pub fn last_verify(&self) -> Option<(String, String, u32)> {
        self.last_verify.lock().unwrap().clone()
    }
}

impl Default for MockChallengeService {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ChallengeService for MockChallengeService {
    async fn send_challenge(
        &self,
        _email: &str,
        _audience: &[String],
    ) -> Result<ChallengeReceipt, IdentityError> {
        self.send_calls.fetch_add(1, Ordering::SeqCst);
        self.send_result.lock().unwrap().clone()
    }

    async fn verify_challenge(
        &self,
        email: &str,
        challenge_id: &str,
        otp: u32,
    ) -> Result<AuthOutcome, IdentityError> {
        self.verify_calls.fetch_add(1, Ordering::SeqCst);
        *self.last_verify.lock().unwrap() =
            Some((email.to_string(), challenge_id.to_string(), otp));
        self.verify_result.lock().unwrap().clone()
    }
}

/// Scripted provider directory with an exchange call counter.
pub struct MockProviderDirectory {
    providers: Mutex<Result<Vec<ProviderDescriptor>, IdentityError>>,
    exchange_result: Mutex<Result<AuthOutcome, IdentityError>>,
    exchange_calls: AtomicUsize,
}

impl MockProviderDirectory {
    /// Defaults: one provider (`google`), exchange succeeds with tokens.
    #[must_use]
    pub fn new() -> Self {
        Self {
            providers: Mutex::new(Ok(vec![ProviderDescriptor {
                name: "google".to_string(),
                display_name: "Google".to_string(),
                icon: None,
            }])),
            exchange_result: Mutex::new(Ok(outcome_with_tokens())),
            exchange_calls: AtomicUsize::new(0),
        }
    }

    #[must_use]
    pub fn with_providers(self, result: Result<Vec<ProviderDescriptor>, IdentityError>) -> Self {
        *self.providers.lock().unwrap() = result;
        self
    }

    #[must_use]
    pub fn with_exchange_result(self, result: Result<AuthOutcome, IdentityError>) -> Self {
        *self.exchange_result.lock().unwrap() = result;
        self
    }

    #[must_use]
    pub fn exchange_calls(&self) -> usize {
        self.exchange_calls.load(Ordering::SeqCst)
    }
}

impl Default for MockProviderDirectory {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ProviderDirectory for MockProviderDirectory {
    async fn list_providers(&self) -> Result<Vec<ProviderDescriptor>, IdentityError> {
        self.providers.lock().unwrap().clone()
    }

    fn build_redirect_url(
        &self,
        provider: &str,
        audience: &[String],
        callback_url: &str,
    ) -> Result<String, IdentityError> {
        Ok(format!(
            "https://id.test/oauth/{provider}/authorize?audience={}&callback_url={callback_url}",
            audience.join(",")
        ))
    }

    async fn exchange_code(
        &self,
        _provider: &str,
        _audience: &[String],
        _callback_url: &str,
        _raw_query: &str,
    ) -> Result<AuthOutcome, IdentityError> {
        self.exchange_calls.fetch_add(1, Ordering::SeqCst);
        self.exchange_result.lock().unwrap().clone()
    }
}

/// Session installer that counts installs and records the last outcome.
pub struct CountingInstaller {
    installs: AtomicUsize,
    last_outcome: Mutex<Option<AuthOutcome>>,
}

impl CountingInstaller {
    #[must_use]
    pub fn new() -> Self {
        Self {
            installs: AtomicUsize::new(0),
            last_outcome: Mutex::new(None),
        }
    }

    #[must_use]
    pub fn installs(&self) -> usize {
        self.installs.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn last_outcome(&self) -> Option<AuthOutcome> {
        self.last_outcome.lock().unwrap().clone()
    }
}

impl Default for CountingInstaller {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionInstaller for CountingInstaller {
    fn install(&self, outcome: &AuthOutcome) -> anyhow::Result<()> {
        self.installs.fetch_add(1, Ordering::SeqCst);
        *self.last_outcome.lock().unwrap() = Some(outcome.clone());
        Ok(())
    }
}
