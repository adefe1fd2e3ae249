//! HTTP handlers driving the login flow.

pub mod callback;
pub mod guard;
pub mod login;
pub mod oauth;
pub mod pages;


pub use callback::oauth_callback;
pub use guard::{dashboard, health, sign_out};
pub use login::{dismiss_notice, sign_in_page, submit_code, submit_email};
pub use oauth::start_provider_login;

use actix_web::HttpRequest;
use std::sync::Arc;

use crate::flow::LoginFlow;
use crate::identity::{ChallengeService, ProviderDirectory};
use crate::session::SessionManager;
use crate::settings::GatehouseSettings;

/// Route the guard sends unauthenticated visitors to.
pub const SIGN_IN_ROUTE: &str = "/sign_in";

/// Shared identity-service clients injected into the handlers.
#[derive(Clone)]
pub struct IdentityServices {
    pub challenges: Arc<dyn ChallengeService>,
    pub providers: Arc<dyn ProviderDirectory>,
}

/// Rebuild the login flow for this request from its flow cookie.
pub(crate) fn flow_for_request(
    req: &HttpRequest,
    services: &IdentityServices,
    settings: &GatehouseSettings,
    session_manager: &SessionManager,
) -> LoginFlow {
    let state = session_manager.flow_from_request(req);
    LoginFlow::from_state(
        state,
        services.challenges.clone(),
        services.providers.clone(),
        settings.identity.audience.clone(),
        settings.callback_url(),
        settings.identity.post_login_route.clone(),
    )
}
