//! Redirect response helpers shared by the handlers.

use actix_web::{cookie::Cookie, HttpResponse};

/// 302 redirect to `location`.
#[must_use]
pub fn redirect(location: &str) -> HttpResponse {
    HttpResponse::Found()
        .append_header(("Location", location.to_string()))
        .finish()
}

/// 302 redirect to `location` carrying the given cookies.
#[must_use]
pub fn redirect_with_cookies(location: &str, cookies: Vec<Cookie<'static>>) -> HttpResponse {
    let mut builder = HttpResponse::Found();
    for cookie in cookies {
        builder.cookie(cookie);
    }
    builder
        .append_header(("Location", location.to_string()))
        .finish()
}
