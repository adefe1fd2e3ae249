use base64::{engine::general_purpose, Engine as _};
use serde::{Deserialize, Serialize};
use std::fs;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct GatehouseSettings {
    pub application: ApplicationSettings,
    pub identity: IdentitySettings,
    pub session: SessionSettings,
    pub cookies: CookieSettings,
    pub logging: LoggingSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplicationSettings {
    pub host: String,
    pub port: u16,
    /// Externally visible base URL of this application; the callback URL
    /// handed to the identity service is derived from it.
    pub public_base_url: String,
    pub cors_origins: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentitySettings {
    /// Base URL of the identity service.
    pub base_url: String,
    /// Role tags sent with every challenge and social login.
    pub audience: Vec<String>,
    /// Route the user lands on after a session is established.
    pub post_login_route: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSettings {
    pub session_duration_hours: u64,
    pub session_secret: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CookieSettings {
    pub secure: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingSettings {
    pub level: String,
}

impl Default for ApplicationSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            public_base_url: "http://localhost:8080".to_string(),
            cors_origins: "http://localhost:3000,http://localhost:8080".to_string(),
        }
    }
}

impl Default for IdentitySettings {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:9100".to_string(),
            audience: vec!["candidate".to_string()],
            post_login_route: "/dashboard".to_string(),
        }
    }
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            session_duration_hours: 24,
            session_secret: String::new(), // Will be generated if empty
        }
    }
}

impl Default for CookieSettings {
    fn default() -> Self {
        Self {
            secure: true, // Default to secure cookies
        }
    }
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl GatehouseSettings {
    /// Load settings from configuration files and environment variables
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Environment initialization fails
    /// - Settings file cannot be read or parsed
    /// - TOML parsing fails
    pub fn load() -> Result<Self, Box<dyn std::error::Error>> {
        // Initialize environment and logging
        Self::initialize_environment()?;

        // Load base settings from TOML or defaults
        let mut settings = Self::load_base_settings()?;

        // Apply environment variable overrides
        Self::apply_env_overrides(&mut settings);

        Ok(settings)
    }

    /// Initialize environment variables and logging
    ///
    /// # Errors
    ///
    /// Returns an error if logger initialization fails
    fn initialize_environment() -> Result<(), Box<dyn std::error::Error>> {
        Self::load_env_file();
        env_logger::try_init()?;
        Ok(())
    }

    /// Load base settings from TOML file(s) or use defaults
    /// Settings are loaded with the following priority (highest to lowest):
    /// 1. Environment variables (applied separately after loading base settings)
    /// 2. Settings.toml in `GATEHOUSE_SECRETS_DIR` (if specified and exists)
    /// 3. Settings.toml in current directory (if exists)
    /// 4. Default settings
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Settings file cannot be read
    /// - TOML parsing fails
    pub(crate) fn load_base_settings() -> Result<Self, Box<dyn std::error::Error>> {
        // 1. Start with default settings
        let mut settings = Self::default();

        // 2. Try to load from Settings.toml in current directory (lower priority)
        let default_config_path = std::path::PathBuf::from("Settings.toml");
        if default_config_path.exists() {
            let toml_content = fs::read_to_string(&default_config_path)?;
            settings = basic_toml::from_str(&toml_content)?;
            println!(
                "✓ Loaded base settings from {}",
                default_config_path.display()
            );
        }

        // 3. If GATEHOUSE_SECRETS_DIR is set and contains Settings.toml, override
        // with those settings (higher priority)
        if let Ok(secrets_dir) = std::env::var("GATEHOUSE_SECRETS_DIR") {
            let secrets_path = std::path::Path::new(&secrets_dir).join("Settings.toml");
            if secrets_path.exists() {
                let secrets_toml_content = fs::read_to_string(&secrets_path)?;
                let secrets_settings: Self = basic_toml::from_str(&secrets_toml_content)?;

                println!("✓ Overriding settings from {}", secrets_path.display());

                settings = secrets_settings;
            } else {
                println!(
                    "ℹ GATEHOUSE_SECRETS_DIR set but no Settings.toml found at: {}",
                    secrets_path.display()
                );
            }
        }

        Ok(settings)
    }

    /// Apply environment variable overrides to settings
    fn apply_env_overrides(settings: &mut Self) {
        Self::apply_application_env_overrides(&mut settings.application);
        Self::apply_identity_env_overrides(&mut settings.identity);
        Self::apply_session_env_overrides(&mut settings.session);
        Self::apply_cookie_env_overrides(&mut settings.cookies);
        Self::apply_logging_env_overrides(&mut settings.logging);
    }

    /// Apply environment overrides for application settings
    fn apply_application_env_overrides(app_settings: &mut ApplicationSettings) {
        if let Ok(host) = std::env::var("HOST") {
            app_settings.host = host;
        }
        if let Ok(port_str) = std::env::var("PORT") {
            if let Ok(port) = port_str.parse::<u16>() {
                app_settings.port = port;
            }
        }
        if let Ok(public_base_url) = std::env::var("PUBLIC_BASE_URL") {
            app_settings.public_base_url = public_base_url;
        }
        if let Ok(cors_origins) = std::env::var("CORS_ORIGINS") {
            app_settings.cors_origins = cors_origins;
        }
    }

    /// Apply environment overrides for identity-service settings
    pub fn apply_identity_env_overrides(identity_settings: &mut IdentitySettings) {
        if let Ok(base_url) = std::env::var("IDENTITY_BASE_URL") {
            identity_settings.base_url = base_url;
        }
        if let Ok(audience) = std::env::var("IDENTITY_AUDIENCE") {
            let tags: Vec<String> = audience
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
            if !tags.is_empty() {
                identity_settings.audience = tags;
            }
        }
        if let Ok(route) = std::env::var("POST_LOGIN_ROUTE") {
            identity_settings.post_login_route = route;
        }
    }

    /// Apply environment overrides for session settings
    pub fn apply_session_env_overrides(session_settings: &mut SessionSettings) {
        if let Ok(duration_str) = std::env::var("SESSION_DURATION_HOURS") {
            if let Ok(duration) = duration_str.parse::<u64>() {
                session_settings.session_duration_hours = duration;
            }
        }

        // Handle session secret with special logic
        Self::handle_session_secret_override(session_settings);
    }

    /// Helper function to handle session secret environment override and generation
    fn handle_session_secret_override(session_settings: &mut SessionSettings) {
        let env_secret_set = std::env::var("SESSION_SECRET").is_ok_and(|secret| {
            if secret.is_empty() {
                false
            } else {
                session_settings.session_secret = secret;
                true
            }
        });

        // Generate random session secret if no environment variable was set and
        // current value is empty
        if !env_secret_set && session_settings.session_secret.is_empty() {
            session_settings.session_secret = Self::generate_random_session_secret();
            Self::warn_about_generated_secret(&session_settings.session_secret);
        }
    }

    /// Generate a cryptographically secure random session secret
    ///
    /// Generates 32 bytes (256 bits) of entropy for AES-256 compatibility
    fn generate_random_session_secret() -> String {
        use rand::RngCore;
        let mut secret = [0u8; 32]; // 256 bits for AES-256
        rand::rng().fill_bytes(&mut secret);
        general_purpose::STANDARD.encode(secret)
    }

    /// Display warnings about using a generated session secret
    fn warn_about_generated_secret(secret: &str) {
        eprintln!("⚠️  WARNING: Using auto-generated session secret");
        eprintln!("📝 Generated secret: {secret}");
        eprintln!("🔒 For production use, set the SESSION_SECRET environment variable");
        eprintln!("   or configure session_secret in Settings.toml");
        eprintln!("💡 This secret will change on each restart unless explicitly configured");
    }

    /// Apply environment overrides for cookie settings
    fn apply_cookie_env_overrides(cookie_settings: &mut CookieSettings) {
        if let Ok(cookie_secure_str) = std::env::var("COOKIE_SECURE") {
            if let Ok(cookie_secure) = cookie_secure_str.parse::<bool>() {
                cookie_settings.secure = cookie_secure;
            }
        }
    }

    /// Apply environment overrides for logging settings
    fn apply_logging_env_overrides(logging_settings: &mut LoggingSettings) {
        if let Ok(log_level) = std::env::var("RUST_LOG") {
            logging_settings.level = log_level;
        }
    }

    /// Load environment variables from .env file
    fn load_env_file() {
        if let Ok(contents) = std::fs::read_to_string(".env") {
            for line in contents.lines() {
                if let Some((key, value)) = line.split_once('=') {
                    std::env::set_var(key.trim(), value.trim());
                }
            }
        }
    }

    /// Get the bind address for the server
    #[must_use]
    pub fn get_bind_address(&self) -> String {
        format!("{}:{}", self.application.host, self.application.port)
    }

    /// Get CORS origins as a vector of strings
    #[must_use]
    pub fn get_cors_origins(&self) -> Vec<String> {
        self.application
            .cors_origins
            .split(',')
            .map(|s| s.trim().to_string())
            .collect()
    }

    /// Fixed callback URL the identity provider redirects back to
    #[must_use]
    pub fn callback_url(&self) -> String {
        format!(
            "{}/oauth/callback",
            self.application.public_base_url.trim_end_matches('/')
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::io::Write;

    // Helper function to clean all relevant environment variables for tests
    fn clean_env_vars() {
        std::env::remove_var("SESSION_SECRET");
        std::env::remove_var("SESSION_DURATION_HOURS");
        std::env::remove_var("IDENTITY_BASE_URL");
        std::env::remove_var("IDENTITY_AUDIENCE");
        std::env::remove_var("GATEHOUSE_SECRETS_DIR");
    }

    #[test]
    fn test_defaults() {
        let settings = GatehouseSettings::default();
        assert_eq!(settings.session.session_secret, "");
        assert_eq!(settings.session.session_duration_hours, 24);
        assert_eq!(settings.identity.audience, vec!["candidate".to_string()]);
        assert_eq!(settings.identity.post_login_route, "/dashboard");
        assert!(settings.cookies.secure);
    }

    #[test]
    fn test_callback_url_strips_trailing_slash() {
        let mut settings = GatehouseSettings::default();
        settings.application.public_base_url = "https://app.example.com/".to_string();
        assert_eq!(
            settings.callback_url(),
            "https://app.example.com/oauth/callback"
        );
    }

    #[test]
    #[serial]
    fn test_session_secret_env_override() {
        clean_env_vars();

        let mut session_settings = SessionSettings {
            session_duration_hours: 24,
            session_secret: "default-secret".to_string(),
        };

        std::env::set_var("SESSION_SECRET", "env-override-secret");

        GatehouseSettings::apply_session_env_overrides(&mut session_settings);

        assert_eq!(session_settings.session_secret, "env-override-secret");

        clean_env_vars();
    }

    #[test]
    #[serial]
    fn test_session_duration_env_override() {
        clean_env_vars();

        let mut session_settings = SessionSettings {
            session_duration_hours: 24,
            session_secret: "test-secret".to_string(),
        };

        std::env::set_var("SESSION_DURATION_HOURS", "48");

        GatehouseSettings::apply_session_env_overrides(&mut session_settings);

        assert_eq!(session_settings.session_duration_hours, 48);
        assert_eq!(session_settings.session_secret, "test-secret"); // Should remain unchanged

        clean_env_vars();
    }

    #[test]
    #[serial]
    fn test_session_secret_auto_generation() {
        clean_env_vars();

        let mut session_settings = SessionSettings {
            session_duration_hours: 24,
            session_secret: String::new(), // Empty, should trigger auto-generation
        };

        GatehouseSettings::apply_session_env_overrides(&mut session_settings);

        // Should have generated a non-empty secret
        assert!(!session_settings.session_secret.is_empty());
        assert!(session_settings.session_secret.len() > 40); // Base64 encoded 32 bytes should be ~44 chars

        // Generate another one to ensure they're different
        let mut session_settings2 = SessionSettings {
            session_duration_hours: 24,
            session_secret: String::new(),
        };
        GatehouseSettings::apply_session_env_overrides(&mut session_settings2);

        assert_ne!(
            session_settings.session_secret,
            session_settings2.session_secret
        );

        clean_env_vars();
    }

    #[test]
    #[serial]
    fn test_identity_audience_env_override() {
        clean_env_vars();

        let mut identity_settings = IdentitySettings::default();

        std::env::set_var("IDENTITY_AUDIENCE", "candidate, staff");
        GatehouseSettings::apply_identity_env_overrides(&mut identity_settings);

        assert_eq!(
            identity_settings.audience,
            vec!["candidate".to_string(), "staff".to_string()]
        );

        // An all-empty list leaves the configured audience in place
        std::env::set_var("IDENTITY_AUDIENCE", " , ");
        GatehouseSettings::apply_identity_env_overrides(&mut identity_settings);
        assert_eq!(
            identity_settings.audience,
            vec!["candidate".to_string(), "staff".to_string()]
        );

        clean_env_vars();
    }

    #[test]
    #[serial]
    fn test_secrets_dir_overrides_base_settings() {
        clean_env_vars();

        let dir = tempfile::tempdir().unwrap();
        let settings_path = dir.path().join("Settings.toml");
        let mut file = std::fs::File::create(&settings_path).unwrap();
        writeln!(
            file,
            r#"
[application]
host = "127.0.0.1"
port = 9001
public_base_url = "https://login.example.com"
cors_origins = "https://app.example.com"

[identity]
base_url = "https://id.example.com"
audience = ["staff"]
post_login_route = "/home"

[session]
session_duration_hours = 12
session_secret = "secrets-dir-secret"

[cookies]
secure = true

[logging]
level = "debug"
"#
        )
        .unwrap();

        std::env::set_var("GATEHOUSE_SECRETS_DIR", dir.path());

        let settings = GatehouseSettings::load_base_settings().unwrap();
        assert_eq!(settings.session.session_secret, "secrets-dir-secret");
        assert_eq!(settings.identity.base_url, "https://id.example.com");
        assert_eq!(settings.application.port, 9001);

        clean_env_vars();
    }
}
