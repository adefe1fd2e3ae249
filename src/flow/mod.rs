//! Login flow state machine
//!
//! This module is the core of the application: it sequences challenge
//! issuance, code verification, token receipt and session establishment,
//! including the resumption of a social login after the provider redirect
//! round trip. Identity-service access is injected as trait objects so the
//! machine can run against the real clients or against test doubles.
//!
//! ## Stages
//!
//! `AwaitingSend → AwaitingCode → Exchanging → Authenticated`, plus the
//! terminal provider-redirect path: selecting a provider emits a
//! full-navigation effect and the in-memory machine is abandoned; the
//! callback route rebuilds one and feeds the raw query into the exchange
//! step via [`CallbackResumer`].
//!
//! ## Invariants
//!
//! - An issued `challenge_id` lives inside the `AwaitingCode` stage and is
//!   discarded the moment the email is edited to a different value.
//! - The `busy` flag suppresses re-entrant submission while a network call
//!   is outstanding.
//! - A single dismissible notice carries the most recent outcome, replacing
//!   any prior notice.
//! - Service failures never reset the form; the stage the user is on is
//!   preserved.

pub mod resume;

pub use resume::CallbackResumer;

use crate::identity::{ChallengeService, IdentityError, ProviderDirectory};
use crate::models::AuthOutcome;
use log::{debug, error, warn};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

const OTP_SENT_NOTICE: &str = "We emailed you a one-time code.";
const NO_CHALLENGE_NOTICE: &str = "Request a code first.";
const NON_NUMERIC_CODE_NOTICE: &str = "Enter the numeric code from the email.";
const RETRY_LATER_NOTICE: &str =
    "Something went wrong reaching the sign-in service. Please try again.";
const GENERIC_FAILURE_NOTICE: &str = "Sign-in failed. Please try again.";

/// Where the flow currently sits.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum FlowStage {
    /// No challenge outstanding; the email form is live.
    AwaitingSend,
    /// A challenge was issued; the code form is live.
    AwaitingCode { challenge_id: String },
    /// A verify or exchange call is in flight.
    Exchanging,
    /// A session has been established.
    Authenticated,
}

/// User-entered credential fields.
///
/// `otp` is a numeric string of at most six digits, validated locally
/// before any verify call leaves the machine.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct CredentialForm {
    pub email: String,
    pub otp: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum NoticeKind {
    Success,
    Error,
}

/// Dismissible outcome notice shown above the form.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Notice {
    pub kind: NoticeKind,
    pub message: String,
}

impl Notice {
    fn success(message: impl Into<String>) -> Self {
        Self {
            kind: NoticeKind::Success,
            message: message.into(),
        }
    }

    fn error(message: impl Into<String>) -> Self {
        Self {
            kind: NoticeKind::Error,
            message: message.into(),
        }
    }
}

/// Serializable snapshot of the machine between requests.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlowState {
    pub stage: FlowStage,
    pub form: CredentialForm,
    pub notice: Option<Notice>,
    pub busy: bool,
}

impl Default for FlowState {
    fn default() -> Self {
        Self {
            stage: FlowStage::AwaitingSend,
            form: CredentialForm::default(),
            notice: None,
            busy: false,
        }
    }
}

/// Side effect the driver must apply after a transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlowEffect {
    /// Only the flow state changed.
    Stay,
    /// Full-page navigation to the provider authorization URL; terminal for
    /// this machine instance.
    RedirectToProvider(String),
    /// Session established; navigate to the protected route.
    NavigateTo(String),
}

/// Installs an established session.
///
/// Implemented by the cookie layer for the running application and by
/// counting doubles in tests. Installing the same outcome twice must be
/// harmless.
pub trait SessionInstaller: Send + Sync {
    /// # Errors
    ///
    /// Returns an error when the session cannot be materialized, e.g. when
    /// cookie encryption fails.
    fn install(&self, outcome: &AuthOutcome) -> anyhow::Result<()>;
}

/// The login flow state machine.
pub struct LoginFlow {
    state: FlowState,
    challenges: Arc<dyn ChallengeService>,
    providers: Arc<dyn ProviderDirectory>,
    audience: Vec<String>,
    callback_url: String,
    post_login_route: String,
}

impl LoginFlow {
    #[must_use]
    pub fn new(
        challenges: Arc<dyn ChallengeService>,
        providers: Arc<dyn ProviderDirectory>,
        audience: Vec<String>,
        callback_url: String,
        post_login_route: String,
    ) -> Self {
        Self::from_state(
            FlowState::default(),
            challenges,
            providers,
            audience,
            callback_url,
            post_login_route,
        )
    }

    /// Rebuild a machine from a persisted snapshot.
    #[must_use]
    pub fn from_state(
        state: FlowState,
        challenges: Arc<dyn ChallengeService>,
        providers: Arc<dyn ProviderDirectory>,
        audience: Vec<String>,
        callback_url: String,
        post_login_route: String,
    ) -> Self {
        Self {
            state,
            challenges,
            providers,
            audience,
            callback_url,
            post_login_route,
        }
    }

    #[must_use]
    pub fn state(&self) -> &FlowState {
        &self.state
    }

    #[must_use]
    pub fn into_state(self) -> FlowState {
        self.state
    }

    /// Submit the email form: issue (or re-issue) an OTP challenge.
    ///
    /// A differing email first discards any outstanding challenge. Success
    /// moves to `AwaitingCode`; failure leaves the stage untouched and
    /// surfaces the first server-provided validation message.
    pub async fn submit_email(&mut self, email: &str) -> FlowEffect {
        if self.state.busy {
            debug!("submit_email ignored: a request is already outstanding");
            return FlowEffect::Stay;
        }
        self.edit_email(email);
        let email = self.state.form.email.clone();

        self.state.busy = true;
        let result = self.challenges.send_challenge(&email, &self.audience).await;
        self.state.busy = false;

        match result {
            Ok(receipt) => {
                self.state.stage = FlowStage::AwaitingCode {
                    challenge_id: receipt.challenge_id,
                };
                self.state.form.otp.clear();
                self.state.notice = Some(Notice::success(OTP_SENT_NOTICE));
            }
            Err(err) => {
                debug!("otp send failed: {err}");
                self.state.notice = Some(failure_notice(&err));
            }
        }
        FlowEffect::Stay
    }

    /// Record an email edit. Editing to a different value after a challenge
    /// was issued invalidates it and returns the flow to `AwaitingSend`.
    pub fn edit_email(&mut self, email: &str) {
        let email = email.trim();
        if email == self.state.form.email {
            return;
        }
        self.state.form.email = email.to_string();
        if matches!(self.state.stage, FlowStage::AwaitingCode { .. }) {
            debug!("email edited after challenge issuance; discarding challenge");
            self.state.stage = FlowStage::AwaitingSend;
            self.state.form.otp.clear();
        }
    }

    /// Submit the code form: verify the outstanding challenge.
    ///
    /// Non-numeric input is rejected locally without a server round trip.
    /// Success with tokens installs the session exactly once and emits one
    /// navigation effect; success without tokens is treated as non-progress;
    /// failure keeps the challenge and the populated form.
    pub async fn submit_code(
        &mut self,
        otp: &str,
        sessions: &dyn SessionInstaller,
    ) -> FlowEffect {
        if self.state.busy {
            debug!("submit_code ignored: a request is already outstanding");
            return FlowEffect::Stay;
        }
        let FlowStage::AwaitingCode { challenge_id } = self.state.stage.clone() else {
            self.state.notice = Some(Notice::error(NO_CHALLENGE_NOTICE));
            return FlowEffect::Stay;
        };

        let otp = otp.trim().to_string();
        self.state.form.otp.clone_from(&otp);
        let Some(code) = parse_otp(&otp) else {
            self.state.notice = Some(Notice::error(NON_NUMERIC_CODE_NOTICE));
            return FlowEffect::Stay;
        };
        let email = self.state.form.email.clone();

        self.state.busy = true;
        self.state.stage = FlowStage::Exchanging;
        let result = self
            .challenges
            .verify_challenge(&email, &challenge_id, code)
            .await;
        self.state.busy = false;

        let fallback = FlowStage::AwaitingCode { challenge_id };
        match result {
            Ok(outcome) => self.complete(outcome, sessions, fallback),
            Err(err) => {
                debug!("otp verify failed: {err}");
                self.state.stage = fallback;
                self.state.notice = Some(failure_notice(&err));
                FlowEffect::Stay
            }
        }
    }

    /// Select a social provider: emit the full-navigation effect toward the
    /// provider authorization URL. Terminal for this machine instance.
    pub fn select_provider(&mut self, provider: &str) -> FlowEffect {
        match self
            .providers
            .build_redirect_url(provider, &self.audience, &self.callback_url)
        {
            Ok(url) => FlowEffect::RedirectToProvider(url),
            Err(err) => {
                error!("failed to build redirect URL for {provider}: {err}");
                self.state.notice = Some(failure_notice(&err));
                FlowEffect::Stay
            }
        }
    }

    /// Clear the notice, independent of the flow stage.
    pub fn dismiss_notice(&mut self) {
        self.state.notice = None;
    }

    /// Exchange a callback result; called through [`CallbackResumer`] so a
    /// duplicate arrival cannot submit the exchange twice.
    pub(crate) async fn exchange_callback(
        &mut self,
        provider: &str,
        raw_query: &str,
        sessions: &dyn SessionInstaller,
    ) -> FlowEffect {
        if self.state.busy {
            debug!("exchange_callback ignored: a request is already outstanding");
            return FlowEffect::Stay;
        }
        let fallback = self.state.stage.clone();

        self.state.busy = true;
        self.state.stage = FlowStage::Exchanging;
        let result = self
            .providers
            .exchange_code(provider, &self.audience, &self.callback_url, raw_query)
            .await;
        self.state.busy = false;

        match result {
            Ok(outcome) => self.complete(outcome, sessions, fallback),
            Err(err) => {
                debug!("oauth exchange failed: {err}");
                self.state.stage = fallback;
                self.state.notice = Some(failure_notice(&err));
                FlowEffect::Stay
            }
        }
    }

    /// Shared success handling for verify and callback exchange.
    fn complete(
        &mut self,
        outcome: AuthOutcome,
        sessions: &dyn SessionInstaller,
        fallback: FlowStage,
    ) -> FlowEffect {
        if outcome.tokens.is_none() {
            // Observed identity-service behavior: a success response can
            // arrive without tokens. Treated as non-progress, not an error.
            warn!("authentication response carried no tokens; staying on the current stage");
            self.state.stage = fallback;
            return FlowEffect::Stay;
        }
        match sessions.install(&outcome) {
            Ok(()) => {
                self.state.stage = FlowStage::Authenticated;
                self.state.notice = None;
                FlowEffect::NavigateTo(self.post_login_route.clone())
            }
            Err(err) => {
                error!("failed to install session: {err}");
                self.state.stage = fallback;
                self.state.notice = Some(Notice::error(GENERIC_FAILURE_NOTICE));
                FlowEffect::Stay
            }
        }
    }
}

/// Parse the user-entered code: numeric, at most six digits.
fn parse_otp(raw: &str) -> Option<u32> {
    if raw.is_empty() || raw.len() > 6 || !raw.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    raw.parse().ok()
}

fn failure_notice(err: &IdentityError) -> Notice {
    match err {
        IdentityError::Validation(msg) | IdentityError::InvalidCode(msg) => {
            Notice::error(msg.clone())
        }
        IdentityError::Network(_) => Notice::error(RETRY_LATER_NOTICE),
        IdentityError::MalformedResponse(_) | IdentityError::Configuration(_) => {
            Notice::error(GENERIC_FAILURE_NOTICE)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::mock::{CountingInstaller, MockChallengeService, MockProviderDirectory};
    use crate::testing::TestFixtures;
    use std::sync::Arc;

    fn flow_with(
        challenges: Arc<MockChallengeService>,
        providers: Arc<MockProviderDirectory>,
    ) -> LoginFlow {
        TestFixtures::login_flow(challenges, providers)
    }

    #[tokio::test]
    async fn test_send_success_moves_to_awaiting_code() {
        let challenges = Arc::new(MockChallengeService::new());
        let providers = Arc::new(MockProviderDirectory::new());
        let mut flow = flow_with(challenges.clone(), providers);

        let effect = flow.submit_email("a@b.com").await;

        assert_eq!(effect, FlowEffect::Stay);
        assert_eq!(
            flow.state().stage,
            FlowStage::AwaitingCode {
                challenge_id: "c1".to_string()
            }
        );
        assert_eq!(flow.state().form.email, "a@b.com");
        let notice = flow.state().notice.clone().unwrap();
        assert_eq!(notice.kind, NoticeKind::Success);
        assert_eq!(challenges.send_calls(), 1);
    }

    #[tokio::test]
    async fn test_send_failure_surfaces_server_validation_message() {
        let challenges = Arc::new(MockChallengeService::new().with_send_result(Err(
            IdentityError::Validation("Email domain is not allowed.".to_string()),
        )));
        let providers = Arc::new(MockProviderDirectory::new());
        let mut flow = flow_with(challenges, providers);

        flow.submit_email("a@b.com").await;

        assert_eq!(flow.state().stage, FlowStage::AwaitingSend);
        let notice = flow.state().notice.clone().unwrap();
        assert_eq!(notice.kind, NoticeKind::Error);
        assert_eq!(notice.message, "Email domain is not allowed.");
    }

    #[tokio::test]
    async fn test_email_edit_invalidates_challenge() {
        let challenges = Arc::new(MockChallengeService::new());
        let providers = Arc::new(MockProviderDirectory::new());
        let mut flow = flow_with(challenges.clone(), providers);

        flow.submit_email("a@b.com").await;
        assert!(matches!(flow.state().stage, FlowStage::AwaitingCode { .. }));

        flow.edit_email("other@b.com");
        assert_eq!(flow.state().stage, FlowStage::AwaitingSend);

        // A verify attempt after the edit must never reach the service with
        // the stale challenge id.
        let installer = CountingInstaller::new();
        let effect = flow.submit_code("123456", &installer).await;
        assert_eq!(effect, FlowEffect::Stay);
        assert_eq!(challenges.verify_calls(), 0);
        assert_eq!(installer.installs(), 0);
    }

    #[tokio::test]
    async fn test_edit_to_same_email_keeps_challenge() {
        let challenges = Arc::new(MockChallengeService::new());
        let providers = Arc::new(MockProviderDirectory::new());
        let mut flow = flow_with(challenges, providers);

        flow.submit_email("a@b.com").await;
        flow.edit_email("a@b.com");

        assert_eq!(
            flow.state().stage,
            FlowStage::AwaitingCode {
                challenge_id: "c1".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_verify_success_installs_once_and_navigates() {
        let challenges = Arc::new(MockChallengeService::new());
        let providers = Arc::new(MockProviderDirectory::new());
        let mut flow = flow_with(challenges.clone(), providers);
        let installer = CountingInstaller::new();

        flow.submit_email("a@b.com").await;
        let effect = flow.submit_code("123456", &installer).await;

        assert_eq!(effect, FlowEffect::NavigateTo("/dashboard".to_string()));
        assert_eq!(flow.state().stage, FlowStage::Authenticated);
        assert_eq!(installer.installs(), 1);
        assert_eq!(
            challenges.last_verify(),
            Some(("a@b.com".to_string(), "c1".to_string(), 123_456))
        );
        let outcome = installer.last_outcome().unwrap();
        assert!(outcome.tokens.is_some());
    }

    #[tokio::test]
    async fn test_verify_success_without_tokens_is_non_progress() {
        let challenges = Arc::new(
            MockChallengeService::new().with_verify_result(Ok(AuthOutcome::default())),
        );
        let providers = Arc::new(MockProviderDirectory::new());
        let mut flow = flow_with(challenges, providers);
        let installer = CountingInstaller::new();

        flow.submit_email("a@b.com").await;
        let effect = flow.submit_code("123456", &installer).await;

        assert_eq!(effect, FlowEffect::Stay);
        assert_eq!(installer.installs(), 0);
        assert_eq!(
            flow.state().stage,
            FlowStage::AwaitingCode {
                challenge_id: "c1".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_wrong_code_keeps_stage_and_challenge() {
        let challenges = Arc::new(MockChallengeService::new().with_verify_result(Err(
            IdentityError::InvalidCode("That code did not match.".to_string()),
        )));
        let providers = Arc::new(MockProviderDirectory::new());
        let mut flow = flow_with(challenges, providers);
        let installer = CountingInstaller::new();

        flow.submit_email("a@b.com").await;
        let effect = flow.submit_code("654321", &installer).await;

        assert_eq!(effect, FlowEffect::Stay);
        assert_eq!(
            flow.state().stage,
            FlowStage::AwaitingCode {
                challenge_id: "c1".to_string()
            }
        );
        assert_eq!(flow.state().form.email, "a@b.com");
        let notice = flow.state().notice.clone().unwrap();
        assert_eq!(notice.message, "That code did not match.");
        assert_eq!(installer.installs(), 0);
    }

    #[tokio::test]
    async fn test_non_numeric_code_rejected_without_round_trip() {
        let challenges = Arc::new(MockChallengeService::new());
        let providers = Arc::new(MockProviderDirectory::new());
        let mut flow = flow_with(challenges.clone(), providers);
        let installer = CountingInstaller::new();

        flow.submit_email("a@b.com").await;
        for bad in ["12a456", "1234567", ""] {
            let effect = flow.submit_code(bad, &installer).await;
            assert_eq!(effect, FlowEffect::Stay);
        }

        assert_eq!(challenges.verify_calls(), 0);
        assert_eq!(installer.installs(), 0);
    }

    #[tokio::test]
    async fn test_busy_flag_suppresses_duplicate_submission() {
        let challenges = Arc::new(MockChallengeService::new());
        let providers = Arc::new(MockProviderDirectory::new());
        let state = FlowState {
            busy: true,
            ..FlowState::default()
        };
        let mut flow = LoginFlow::from_state(
            state,
            challenges.clone(),
            providers,
            vec!["candidate".to_string()],
            "http://localhost:8080/oauth/callback".to_string(),
            "/dashboard".to_string(),
        );

        let effect = flow.submit_email("a@b.com").await;

        assert_eq!(effect, FlowEffect::Stay);
        assert_eq!(challenges.send_calls(), 0);
    }

    #[tokio::test]
    async fn test_select_provider_emits_redirect() {
        let challenges = Arc::new(MockChallengeService::new());
        let providers = Arc::new(MockProviderDirectory::new());
        let mut flow = flow_with(challenges, providers);

        let effect = flow.select_provider("google");

        let FlowEffect::RedirectToProvider(url) = effect else {
            panic!("expected a provider redirect, got {effect:?}");
        };
        assert!(url.contains("google"));
    }

    #[tokio::test]
    async fn test_network_failure_shows_generic_retry_notice() {
        let challenges = Arc::new(MockChallengeService::new().with_send_result(Err(
            IdentityError::Network("connection refused".to_string()),
        )));
        let providers = Arc::new(MockProviderDirectory::new());
        let mut flow = flow_with(challenges, providers);

        flow.submit_email("a@b.com").await;

        let notice = flow.state().notice.clone().unwrap();
        assert_eq!(notice.kind, NoticeKind::Error);
        // The transport detail stays in the logs, not in the notice.
        assert!(!notice.message.contains("connection refused"));
    }

    #[tokio::test]
    async fn test_dismiss_notice_is_independent_of_stage() {
        let challenges = Arc::new(MockChallengeService::new());
        let providers = Arc::new(MockProviderDirectory::new());
        let mut flow = flow_with(challenges, providers);

        flow.submit_email("a@b.com").await;
        assert!(flow.state().notice.is_some());

        flow.dismiss_notice();
        assert!(flow.state().notice.is_none());
        assert!(matches!(flow.state().stage, FlowStage::AwaitingCode { .. }));
    }

    #[test]
    fn test_parse_otp_bounds() {
        assert_eq!(parse_otp("123456"), Some(123_456));
        assert_eq!(parse_otp("0"), Some(0));
        assert_eq!(parse_otp("1234567"), None);
        assert_eq!(parse_otp("12 456"), None);
        assert_eq!(parse_otp("-12345"), None);
        assert_eq!(parse_otp(""), None);
    }
}
