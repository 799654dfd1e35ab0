//! Application configuration loaded from environment variables.

use std::env;
use std::str::FromStr;
use std::time::Duration;

use quill_infra::{HttpMailerConfig, JwtConfig, RateLimitConfig};

const DEFAULT_JWT_SECRET: &str = "change-me-in-production";

/// Where outgoing mail goes.
#[derive(Debug, Clone)]
pub enum MailBackend {
    /// Print messages to stdout.
    Console,
    /// POST messages to an HTTP mail API.
    Http(HttpMailerConfig),
}

/// Staff account created on start-up when missing.
#[derive(Debug, Clone)]
pub struct AdminBootstrap {
    pub username: String,
    pub email: String,
    pub password: String,
}

/// Application configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub database_url: Option<String>,
    pub db_max_connections: u32,
    pub db_min_connections: u32,
    pub mail_backend: MailBackend,
    /// Sender address of outgoing mail.
    pub mail_from: String,
    pub jwt: JwtConfig,
    pub rate_limit: RateLimitConfig,
    pub admin: Option<AdminBootstrap>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            database_url: None,
            db_max_connections: 20,
            db_min_connections: 2,
            mail_backend: MailBackend::Console,
            mail_from: "webmaster@localhost".to_string(),
            jwt: JwtConfig::default(),
            rate_limit: RateLimitConfig::default(),
            admin: None,
        }
    }
}

impl AppConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let jwt = JwtConfig {
            secret: env::var("JWT_SECRET").unwrap_or_else(|_| DEFAULT_JWT_SECRET.to_string()),
            expiration_hours: parse_var("JWT_EXPIRATION_HOURS", defaults.jwt.expiration_hours),
            issuer: env::var("JWT_ISSUER").unwrap_or(defaults.jwt.issuer),
        };
        if jwt.secret == DEFAULT_JWT_SECRET {
            let is_production = env::var("RUST_ENV")
                .map(|v| v == "production" || v == "prod")
                .unwrap_or(false);

            if is_production {
                tracing::error!(
                    "SECURITY: Using default JWT secret in production! Set JWT_SECRET environment variable."
                );
            } else {
                tracing::warn!("Using default JWT secret. Set JWT_SECRET for production use.");
            }
        }

        Self {
            host: env::var("HOST").unwrap_or(defaults.host),
            port: parse_var("PORT", defaults.port),
            database_url: env::var("DATABASE_URL").ok().filter(|u| !u.is_empty()),
            db_max_connections: parse_var("DB_MAX_CONNECTIONS", defaults.db_max_connections),
            db_min_connections: parse_var("DB_MIN_CONNECTIONS", defaults.db_min_connections),
            mail_backend: Self::mail_backend(),
            mail_from: env::var("MAIL_FROM").unwrap_or(defaults.mail_from),
            jwt,
            rate_limit: RateLimitConfig {
                max_requests: parse_var("RATE_LIMIT_MAX_REQUESTS", defaults.rate_limit.max_requests),
                window: Duration::from_secs(parse_var(
                    "RATE_LIMIT_WINDOW_SECS",
                    defaults.rate_limit.window.as_secs(),
                )),
            },
            admin: Self::admin_bootstrap(),
        }
    }

    /// MAIL_BACKEND=http needs MAIL_API_URL; anything else prints to the console.
    fn mail_backend() -> MailBackend {
        match env::var("MAIL_BACKEND").as_deref() {
            Ok("http") => match env::var("MAIL_API_URL") {
                Ok(url) => MailBackend::Http(HttpMailerConfig {
                    url,
                    api_key: env::var("MAIL_API_KEY").ok(),
                    timeout: Duration::from_secs(parse_var("MAIL_TIMEOUT_SECS", 10)),
                }),
                Err(_) => {
                    tracing::warn!("MAIL_BACKEND=http without MAIL_API_URL, using console mail");
                    MailBackend::Console
                }
            },
            _ => MailBackend::Console,
        }
    }

    fn admin_bootstrap() -> Option<AdminBootstrap> {
        let username = env::var("ADMIN_USERNAME").ok()?;
        let password = env::var("ADMIN_PASSWORD").ok()?;
        Some(AdminBootstrap {
            email: env::var("ADMIN_EMAIL").unwrap_or_else(|_| format!("{}@localhost", username)),
            username,
            password,
        })
    }
}

fn parse_var<T: FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}
