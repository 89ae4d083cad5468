use std::env;
use std::str::FromStr;
use std::time::Duration;

pub mod cors;
pub mod security;

pub use cors::create_cors_layer;
pub use security::create_security_headers_layer;

const DEFAULT_DATABASE_URL: &str = "postgres://localhost/beach_tickets";
const DEFAULT_APP_URL: &str = "http://localhost:3001";
const DEFAULT_XENDIT_API_BASE: &str = "https://api.xendit.co";

/// Deployment environment. Development tooling is only reachable locally.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnv {
    Development,
    Production,
}

impl AppEnv {
    pub fn parse(value: &str) -> Self {
        match value.trim().to_lowercase().as_str() {
            "local" | "development" | "dev" => AppEnv::Development,
            _ => AppEnv::Production,
        }
    }

    pub fn is_development(&self) -> bool {
        matches!(self, AppEnv::Development)
    }

    pub fn from_env() -> Self {
        env::var("APP_ENV")
            .or_else(|_| env::var("RUST_ENV"))
            .map(|v| Self::parse(&v))
            .unwrap_or(AppEnv::Production)
    }
}

#[derive(Debug, Clone)]
pub struct GatewaySettings {
    pub secret_key: String,
    pub api_base: String,
    /// Shared secret the gateway sends in `X-Callback-Token`.
    pub callback_token: String,
    pub timeout_ms: u64,
    pub invoice_duration_secs: u64,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub database_max_connections: u32,
    pub server_port: u16,
    pub app_env: AppEnv,
    /// Public base URL used to build gateway redirect links.
    pub app_url: String,
    pub cors_allowed_origins: String,
    pub gateway: GatewaySettings,
    pub checkout_session_ttl: Duration,
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            database_url: env::var("DATABASE_URL")
                .unwrap_or_else(|_| DEFAULT_DATABASE_URL.to_string()),
            database_max_connections: parse_env("DATABASE_MAX_CONNECTIONS", 5),
            server_port: parse_env("SERVER_PORT", 3001),
            app_env: AppEnv::from_env(),
            app_url: env::var("APP_URL")
                .map(|v| v.trim_end_matches('/').to_string())
                .unwrap_or_else(|_| DEFAULT_APP_URL.to_string()),
            cors_allowed_origins: env::var("CORS_ALLOWED_ORIGINS")
                .unwrap_or_else(|_| cors::DEFAULT_ALLOWED_ORIGINS.to_string()),
            gateway: GatewaySettings {
                secret_key: env::var("XENDIT_SECRET_KEY").unwrap_or_default(),
                api_base: env::var("XENDIT_API_BASE")
                    .unwrap_or_else(|_| DEFAULT_XENDIT_API_BASE.to_string()),
                callback_token: env::var("XENDIT_CALLBACK_TOKEN").unwrap_or_default(),
                timeout_ms: parse_env("XENDIT_TIMEOUT_MS", 15_000),
                invoice_duration_secs: parse_env("XENDIT_INVOICE_DURATION_SECS", 86_400),
            },
            checkout_session_ttl: Duration::from_secs(parse_env(
                "CHECKOUT_SESSION_TTL_SECS",
                7_200,
            )),
        }
    }
}

fn parse_env<T>(key: &str, default: T) -> T
where
    T: FromStr + Copy + std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) => parse_or(key, &raw, default),
        Err(_) => default,
    }
}

fn parse_or<T>(key: &str, raw: &str, default: T) -> T
where
    T: FromStr + Copy + std::fmt::Display,
{
    raw.trim().parse().unwrap_or_else(|_| {
        tracing::warn!("Config: invalid value '{}' for {}, using {}", raw, key, default);
        default
    })
}
