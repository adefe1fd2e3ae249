// Social login initiation: pending-login cookie, then provider redirect
use crate::flow::FlowEffect;
use crate::handlers::login::persist_and_return;
use crate::handlers::{flow_for_request, IdentityServices, SIGN_IN_ROUTE};
use crate::models::PendingLogin;
use crate::session::SessionManager;
use crate::settings::GatehouseSettings;
use crate::utils::responses::redirect_with_cookies;
use actix_web::{web, HttpRequest, HttpResponse, Result};
use chrono::Utc;
use log::{error, info};

/// Start a social login: write the one-shot pending-login marker and
/// perform the full-page navigation to the provider authorization URL.
/// Terminal for the in-flight flow; the callback route resumes it.
pub async fn start_provider_login(
    path: web::Path<String>,
    req: HttpRequest,
    services: web::Data<IdentityServices>,
    settings: web::Data<GatehouseSettings>,
    session_manager: web::Data<SessionManager>,
) -> Result<HttpResponse> {
    let provider = path.into_inner();
    let mut flow = flow_for_request(&req, &services, &settings, &session_manager);

    match flow.select_provider(&provider) {
        FlowEffect::RedirectToProvider(url) => {
            let pending = PendingLogin {
                provider: provider.clone(),
                issued_at: Utc::now(),
            };
            match session_manager.pending_cookie(&pending) {
                Ok(cookie) => {
                    info!("redirecting to {provider} for social sign-in");
                    Ok(redirect_with_cookies(&url, vec![cookie]))
                }
                Err(err) => {
                    error!("failed to create pending-login cookie: {err}");
                    Ok(persist_and_return(
                        &session_manager,
                        flow.state(),
                        SIGN_IN_ROUTE,
                    ))
                }
            }
        }
        _ => Ok(persist_and_return(
            &session_manager,
            flow.state(),
            SIGN_IN_ROUTE,
        )),
    }
}
