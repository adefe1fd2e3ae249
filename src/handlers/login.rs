// Sign-in page and OTP form handlers
use crate::flow::FlowEffect;
use crate::handlers::{flow_for_request, pages, IdentityServices, SIGN_IN_ROUTE};
use crate::session::{IssuedSession, SessionManager};
use crate::settings::GatehouseSettings;
use crate::utils::responses::{redirect, redirect_with_cookies};
use actix_web::{web, HttpRequest, HttpResponse, Result};
use log::{error, warn};
use serde::Deserialize;

#[derive(Deserialize)]
pub struct EmailForm {
    pub email: String,
}

#[derive(Deserialize)]
pub struct CodeForm {
    pub email: String,
    pub otp: String,
}

/// Sign-in page. Authenticated visitors are sent straight to the protected
/// route; everyone else gets the form for the current flow stage plus the
/// provider buttons.
pub async fn sign_in_page(
    req: HttpRequest,
    services: web::Data<IdentityServices>,
    settings: web::Data<GatehouseSettings>,
    session_manager: web::Data<SessionManager>,
) -> Result<HttpResponse> {
    if session_manager.is_authenticated(&req) {
        return Ok(redirect(&settings.identity.post_login_route));
    }

    let state = session_manager.flow_from_request(&req);
    // A provider-list failure must not take the page down; the OTP path
    // stays available.
    let providers = match services.providers.list_providers().await {
        Ok(list) => list,
        Err(err) => {
            warn!("failed to list social providers: {err}");
            Vec::new()
        }
    };

    Ok(HttpResponse::Ok()
        .content_type("text/html; charset=utf-8")
        .body(pages::render_sign_in(&state, &providers)))
}

/// Email form post: issue an OTP challenge and re-render via redirect.
pub async fn submit_email(
    form: web::Form<EmailForm>,
    req: HttpRequest,
    services: web::Data<IdentityServices>,
    settings: web::Data<GatehouseSettings>,
    session_manager: web::Data<SessionManager>,
) -> Result<HttpResponse> {
    let mut flow = flow_for_request(&req, &services, &settings, &session_manager);
    let _ = flow.submit_email(&form.email).await;
    Ok(persist_and_return(&session_manager, flow.state(), SIGN_IN_ROUTE))
}

/// Code form post. The email field is re-submitted alongside the code so an
/// edited address invalidates the outstanding challenge before any verify
/// call is attempted.
pub async fn submit_code(
    form: web::Form<CodeForm>,
    req: HttpRequest,
    services: web::Data<IdentityServices>,
    settings: web::Data<GatehouseSettings>,
    session_manager: web::Data<SessionManager>,
) -> Result<HttpResponse> {
    let mut flow = flow_for_request(&req, &services, &settings, &session_manager);
    flow.edit_email(&form.email);

    let installer = IssuedSession::new(session_manager.get_ref().clone());
    let effect = flow.submit_code(&form.otp, &installer).await;

    match effect {
        FlowEffect::NavigateTo(route) => {
            let mut cookies = vec![session_manager.clear_flow_cookie()];
            if let Some(session_cookie) = installer.take() {
                cookies.push(session_cookie);
            }
            Ok(redirect_with_cookies(&route, cookies))
        }
        _ => Ok(persist_and_return(
            &session_manager,
            flow.state(),
            SIGN_IN_ROUTE,
        )),
    }
}

/// Dismiss the notice, independent of the flow stage.
pub async fn dismiss_notice(
    req: HttpRequest,
    services: web::Data<IdentityServices>,
    settings: web::Data<GatehouseSettings>,
    session_manager: web::Data<SessionManager>,
) -> Result<HttpResponse> {
    let mut flow = flow_for_request(&req, &services, &settings, &session_manager);
    flow.dismiss_notice();
    Ok(persist_and_return(&session_manager, flow.state(), SIGN_IN_ROUTE))
}

/// Persist the flow state into its cookie and redirect. When encryption
/// fails the redirect still happens; the flow simply starts fresh next time.
pub(crate) fn persist_and_return(
    session_manager: &SessionManager,
    state: &crate::flow::FlowState,
    location: &str,
) -> HttpResponse {
    match session_manager.flow_cookie(state) {
        Ok(cookie) => redirect_with_cookies(location, vec![cookie]),
        Err(err) => {
            error!("failed to persist flow state: {err}");
            redirect(location)
        }
    }
}
