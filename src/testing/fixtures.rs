//! Pre-built test data: settings, session managers and login flows.

use crate::flow::LoginFlow;
use crate::identity::{ChallengeService, ProviderDirectory};
use crate::session::SessionManager;
use crate::settings::GatehouseSettings;
use std::sync::Arc;

/// Shared fixtures for unit and integration tests.
pub struct TestFixtures;

impl TestFixtures {
    /// Settings with a fixed secret and insecure cookies for test requests.
    #[must_use]
    pub fn settings() -> GatehouseSettings {
        let mut settings = GatehouseSettings::default();
        settings.session.session_secret = "test_secret_key_32_bytes_long!!!".to_string();
        settings.cookies.secure = false;
        settings.identity.audience = vec!["candidate".to_string()];
        settings.identity.post_login_route = "/dashboard".to_string();
        settings
    }

    /// Session manager matching [`TestFixtures::settings`].
    #[must_use]
    pub fn session_manager() -> SessionManager {
        let settings = Self::settings();
        SessionManager::new(
            settings.session.session_secret.as_bytes(),
            settings.cookies.secure,
            settings.session.session_duration_hours,
        )
    }

    /// Login flow wired to the given services with the fixture audience,
    /// callback URL and post-login route.
    #[must_use]
    pub fn login_flow(
        challenges: Arc<dyn ChallengeService>,
        providers: Arc<dyn ProviderDirectory>,
    ) -> LoginFlow {
        LoginFlow::new(
            challenges,
            providers,
            vec!["candidate".to_string()],
            "http://localhost:8080/oauth/callback".to_string(),
            "/dashboard".to_string(),
        )
    }
}
