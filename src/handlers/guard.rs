// Route guard, protected dashboard, sign-out and health
use crate::handlers::{pages, SIGN_IN_ROUTE};
use crate::models::{GatehouseSession, HealthResponse};
use crate::session::SessionManager;
use crate::utils::responses::{redirect, redirect_with_cookies};
use actix_web::{web, HttpRequest, HttpResponse, Result};
use log::info;

/// Admit only authenticated sessions; everyone else is redirected to the
/// sign-in route. Evaluated on every request to a protected view.
///
/// # Errors
///
/// The `Err` variant carries the redirect response for unauthenticated
/// visitors.
pub fn require_session(
    req: &HttpRequest,
    session_manager: &SessionManager,
) -> std::result::Result<GatehouseSession, HttpResponse> {
    session_manager
        .session_from_request(req)
        .ok_or_else(|| redirect(SIGN_IN_ROUTE))
}

/// Protected landing page shown after a successful sign-in.
pub async fn dashboard(
    req: HttpRequest,
    session_manager: web::Data<SessionManager>,
) -> Result<HttpResponse> {
    let session = match require_session(&req, &session_manager) {
        Ok(session) => session,
        Err(response) => return Ok(response),
    };

    Ok(HttpResponse::Ok()
        .content_type("text/html; charset=utf-8")
        .body(pages::render_dashboard(&session)))
}

/// Clear the session and any in-flight login state. Idempotent: signing out
/// without a session clears the same cookies again.
pub async fn sign_out(session_manager: web::Data<SessionManager>) -> Result<HttpResponse> {
    info!("user signed out; session and flow cookies cleared");
    Ok(redirect_with_cookies(
        SIGN_IN_ROUTE,
        vec![
            session_manager.logout(),
            session_manager.clear_flow_cookie(),
            session_manager.clear_pending_cookie(),
        ],
    ))
}

/// Health check endpoint
pub async fn health() -> Result<HttpResponse> {
    let response = HealthResponse {
        status: "ok".to_string(),
        message: "Gatehouse login front end is running".to_string(),
    };
    Ok(HttpResponse::Ok().json(response))
}
