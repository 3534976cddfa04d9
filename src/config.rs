//! Service configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `DATABASE_URL` - `PostgreSQL` connection string
//! - `JWT_SECRET` - HMAC secret for admin tokens (min 32 chars)
//!
//! ## Optional
//! - `HOST` - Bind address (default: 0.0.0.0)
//! - `PORT` - Listen port (default: 8083)
//! - `DATABASE_MAX_CONNECTIONS` - Pool size (default: 10)
//! - `JWT_TTL_HOURS` - Admin token lifetime (default: 24)
//! - `ADMIN_USERNAME` / `ADMIN_PASSWORD` - First admin, created when none exists
//! - `TELEGRAM_BOT_TOKEN` / `TELEGRAM_CHAT_ID` - New-order notifications
//! - `TELEGRAM_API_BASE` - Bot API base URL (default: <https://api.telegram.org>)
//! - `NATS_URL` - Publish domain events to NATS when set
//! - `STORE_CURRENCY` - ISO currency code (default: SAR)
//! - `CORS_ORIGINS` - Comma separated allowed origins (default: any)
//! - `RATE_LIMIT_ENABLED` - Set to `false` to disable rate limiting

use std::net::{IpAddr, SocketAddr};

use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;

const MIN_JWT_SECRET_LENGTH: usize = 32;
const MIN_ADMIN_PASSWORD_LENGTH: usize = 8;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
    #[error("Insecure secret in {0}: {1}")]
    InsecureSecret(String, String),
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: SecretString,
    pub database_max_connections: u32,
    pub host: IpAddr,
    pub port: u16,
    pub auth: AuthConfig,
    pub telegram: Option<TelegramConfig>,
    pub nats_url: Option<String>,
    pub currency: String,
    /// Empty means any origin is allowed.
    pub cors_origins: Vec<String>,
    pub rate_limit_enabled: bool,
}

#[derive(Clone)]
pub struct AuthConfig {
    pub jwt_secret: SecretString,
    pub jwt_ttl_hours: i64,
    pub bootstrap_admin: Option<(String, SecretString)>,
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("jwt_secret", &"[REDACTED]")
            .field("jwt_ttl_hours", &self.jwt_ttl_hours)
            .field("bootstrap_admin", &self.bootstrap_admin.as_ref().map(|(user, _)| user))
            .finish()
    }
}

#[derive(Clone)]
pub struct TelegramConfig {
    pub api_base: String,
    pub bot_token: SecretString,
    pub chat_id: String,
}

impl std::fmt::Debug for TelegramConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelegramConfig")
            .field("api_base", &self.api_base)
            .field("bot_token", &"[REDACTED]")
            .field("chat_id", &self.chat_id)
            .finish()
    }
}

impl AppConfig {
    /// Load configuration from the process environment, reading `.env` first if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing or invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing or invalid.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = Env(lookup);

        let database_url = SecretString::from(env.required("DATABASE_URL")?);
        let database_max_connections = env.parsed("DATABASE_MAX_CONNECTIONS", 10u32)?;
        let host = env.parsed("HOST", IpAddr::from([0, 0, 0, 0]))?;
        let port = env.parsed("PORT", 8083u16)?;

        let jwt_secret = SecretString::from(env.required("JWT_SECRET")?);
        if jwt_secret.expose_secret().len() < MIN_JWT_SECRET_LENGTH {
            return Err(ConfigError::InsecureSecret(
                "JWT_SECRET".to_string(),
                format!("must be at least {MIN_JWT_SECRET_LENGTH} characters"),
            ));
        }
        let jwt_ttl_hours = env.parsed("JWT_TTL_HOURS", 24i64)?;
        if jwt_ttl_hours <= 0 {
            return Err(ConfigError::InvalidEnvVar("JWT_TTL_HOURS".to_string(), "must be positive".to_string()));
        }
        let bootstrap_admin = match (env.optional("ADMIN_USERNAME"), env.optional("ADMIN_PASSWORD")) {
            (Some(user), Some(password)) => {
                if password.chars().count() < MIN_ADMIN_PASSWORD_LENGTH {
                    return Err(ConfigError::InsecureSecret(
                        "ADMIN_PASSWORD".to_string(),
                        format!("must be at least {MIN_ADMIN_PASSWORD_LENGTH} characters"),
                    ));
                }
                Some((user, SecretString::from(password)))
            }
            (None, None) => None,
            (Some(_), None) => return Err(ConfigError::MissingEnvVar("ADMIN_PASSWORD".to_string())),
            (None, Some(_)) => return Err(ConfigError::MissingEnvVar("ADMIN_USERNAME".to_string())),
        };

        let telegram = match (env.optional("TELEGRAM_BOT_TOKEN"), env.optional("TELEGRAM_CHAT_ID")) {
            (Some(token), Some(chat_id)) => Some(TelegramConfig {
                api_base: env
                    .optional("TELEGRAM_API_BASE")
                    .unwrap_or_else(|| "https://api.telegram.org".to_string())
                    .trim_end_matches('/')
                    .to_string(),
                bot_token: SecretString::from(token),
                chat_id,
            }),
            _ => None,
        };

        let currency = env.optional("STORE_CURRENCY").unwrap_or_else(|| "SAR".to_string()).to_uppercase();
        if currency.len() != 3 || !currency.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(ConfigError::InvalidEnvVar("STORE_CURRENCY".to_string(), "expected a 3-letter code".to_string()));
        }

        let cors_origins = env
            .optional("CORS_ORIGINS")
            .map(|v| v.split(',').map(str::trim).filter(|s| !s.is_empty()).map(String::from).collect())
            .unwrap_or_default();

        Ok(Self {
            database_url,
            database_max_connections,
            host,
            port,
            auth: AuthConfig { jwt_secret, jwt_ttl_hours, bootstrap_admin },
            telegram,
            nats_url: env.optional("NATS_URL"),
            currency,
            cors_origins,
            rate_limit_enabled: env.parsed("RATE_LIMIT_ENABLED", true)?,
        })
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

struct Env<F>(F);

impl<F: Fn(&str) -> Option<String>> Env<F> {
    fn optional(&self, key: &str) -> Option<String> {
        (self.0)(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
    }

    fn required(&self, key: &str) -> Result<String, ConfigError> {
        self.optional(key).ok_or_else(|| ConfigError::MissingEnvVar(key.to_string()))
    }

    fn parsed<T>(&self, key: &str, default: T) -> Result<T, ConfigError>
    where
        T: std::str::FromStr,
        T::Err: std::fmt::Display,
    {
        match self.optional(key) {
            Some(raw) => raw.parse().map_err(|e: T::Err| ConfigError::InvalidEnvVar(key.to_string(), e.to_string())),
            None => Ok(default),
        }
    }
}
