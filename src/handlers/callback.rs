// OAuth callback handler: resume the abandoned flow exactly once
use crate::flow::{CallbackResumer, FlowEffect};
use crate::handlers::{flow_for_request, IdentityServices, SIGN_IN_ROUTE};
use crate::session::{IssuedSession, SessionManager};
use crate::settings::GatehouseSettings;
use crate::utils::responses::redirect_with_cookies;
use actix_web::{web, HttpRequest, HttpResponse, Result};
use log::{debug, error, info};

/// Callback route for the provider redirect.
///
/// The pending-login cookie written before the redirect is the idempotency
/// token: it is consumed here, so a reload or duplicate arrival finds no
/// pending login and never submits the exchange a second time.
pub async fn oauth_callback(
    req: HttpRequest,
    services: web::Data<IdentityServices>,
    settings: web::Data<GatehouseSettings>,
    session_manager: web::Data<SessionManager>,
) -> Result<HttpResponse> {
    let Some(pending) = session_manager.pending_from_request(&req) else {
        debug!("callback arrival without a pending login; redirecting to sign-in");
        return Ok(redirect_with_cookies(
            SIGN_IN_ROUTE,
            vec![session_manager.clear_pending_cookie()],
        ));
    };

    let raw_query = req.query_string().to_string();
    let mut flow = flow_for_request(&req, &services, &settings, &session_manager);
    let installer = IssuedSession::new(session_manager.get_ref().clone());
    let mut resumer = CallbackResumer::new();

    let effect = resumer
        .resume(&mut flow, &pending.provider, &raw_query, &installer)
        .await;

    let mut cookies = vec![session_manager.clear_pending_cookie()];
    match effect {
        FlowEffect::NavigateTo(route) => {
            info!(
                "social sign-in via {} established a session",
                pending.provider
            );
            cookies.push(session_manager.clear_flow_cookie());
            if let Some(session_cookie) = installer.take() {
                cookies.push(session_cookie);
            }
            Ok(redirect_with_cookies(&route, cookies))
        }
        _ => {
            match session_manager.flow_cookie(flow.state()) {
                Ok(flow_cookie) => cookies.push(flow_cookie),
                Err(err) => error!("failed to persist flow state: {err}"),
            }
            Ok(redirect_with_cookies(SIGN_IN_ROUTE, cookies))
        }
    }
}
