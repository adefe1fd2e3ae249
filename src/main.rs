#![warn(clippy::pedantic)]
#![warn(clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

use actix_cors::Cors;
use actix_web::{middleware::Logger, web, App, HttpServer};
use std::sync::Arc;

use gatehouse::{
    handlers::{
        dashboard, dismiss_notice, health, oauth_callback, sign_in_page, sign_out,
        start_provider_login, submit_code, submit_email, IdentityServices,
    },
    identity::{ChallengeClient, ProviderClient},
    session::SessionManager,
    settings::GatehouseSettings,
};

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    // Load configuration from Settings.toml and environment variables
    // This also loads .env file and initializes the logger
    let settings = GatehouseSettings::load()
        .map_err(|e| std::io::Error::other(format!("Failed to load settings: {e}")))?;

    start_server(settings).await
}

/// Start the server
///
/// # Errors
///
/// Returns an error if:
/// - Server binding fails
/// - Server fails to start
async fn start_server(settings: GatehouseSettings) -> std::io::Result<()> {
    let bind_address = settings.get_bind_address();
    print_startup_info(&bind_address, &settings);

    let session_manager = SessionManager::new(
        settings.session.session_secret.as_bytes(),
        settings.cookies.secure,
        settings.session.session_duration_hours,
    );

    let services = IdentityServices {
        challenges: Arc::new(ChallengeClient::new(&settings.identity.base_url)),
        providers: Arc::new(ProviderClient::new(&settings.identity.base_url)),
    };

    // Configure CORS for SPAs
    let cors_origins = settings.get_cors_origins();

    HttpServer::new(move || {
        let cors_origins = cors_origins.clone();
        let cors = Cors::default()
            .allowed_origin_fn(move |origin, _| {
                cors_origins
                    .iter()
                    .any(|allowed| allowed == origin.to_str().unwrap_or(""))
            })
            .allowed_methods(vec!["GET", "POST"])
            .allowed_headers(vec!["Content-Type", "Accept"])
            .supports_credentials()
            .max_age(3600);

        App::new()
            .app_data(web::Data::new(settings.clone()))
            .app_data(web::Data::new(session_manager.clone()))
            .app_data(web::Data::new(services.clone()))
            .wrap(cors)
            .wrap(Logger::default())
            .configure(configure_services)
    })
    .bind(&bind_address)?
    .run()
    .await
}

fn configure_services(cfg: &mut web::ServiceConfig) {
    cfg
        // Sign-in flow endpoints
        .route("/", web::get().to(sign_in_page))
        .route("/sign_in", web::get().to(sign_in_page))
        .route("/sign_in/email", web::post().to(submit_email))
        .route("/sign_in/code", web::post().to(submit_code))
        .route("/sign_in/dismiss", web::get().to(dismiss_notice))
        // Social login endpoints; the callback route is fixed and must be
        // registered before the provider catch-all
        .route("/oauth/callback", web::get().to(oauth_callback))
        .route("/oauth/{provider}", web::get().to(start_provider_login))
        // Protected views
        .route("/dashboard", web::get().to(dashboard))
        .route("/sign_out", web::get().to(sign_out))
        .route("/sign_out", web::post().to(sign_out))
        // Health endpoint
        .route("/ping", web::get().to(health));
}

fn print_startup_info(bind_address: &str, settings: &GatehouseSettings) {
    println!("Starting Gatehouse login front end on http://{bind_address}");
    println!();
    println!("Sign-in endpoints:");
    println!("  GET  /sign_in          - Sign-in page (OTP form + providers)");
    println!("  POST /sign_in/email    - Request a one-time code");
    println!("  POST /sign_in/code     - Verify the one-time code");
    println!("  GET  /oauth/{{provider}} - Start a social sign-in");
    println!("  GET  /oauth/callback   - Social sign-in callback");
    println!("  GET|POST /sign_out     - Clear session");
    println!();
    println!("Callback URL for the identity service:");
    println!("  {}", settings.callback_url());
    println!();
    println!("Identity service: {}", settings.identity.base_url);
    println!("Audience tags:    {}", settings.identity.audience.join(", "));
    println!();
    println!("System endpoints:");
    println!("  GET  /ping             - Health check");
}
