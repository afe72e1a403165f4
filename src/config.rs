// src/config.rs

use std::env;

use thiserror::Error;

const DEFAULT_APP_URL: &str = "http://localhost:5173";
const DEFAULT_STRIPE_API_BASE: &str = "https://api.stripe.com";
const DEV_ORIGINS: [&str; 2] = ["http://localhost:5173", "http://localhost:3000"];

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),
    #[error("{key} has an invalid value: {value}")]
    Invalid { key: &'static str, value: String },
}

/// Process configuration. Built once in `main` and shared read-only through `AppState`.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub database_max_connections: u32,
    pub jwt_secret: String,
    pub stripe_secret_key: String,
    pub stripe_webhook_secret: Option<String>,
    pub stripe_api_base: String,
    pub app_url: String,
    pub port: u16,
    pub allowed_origins: Vec<String>,
    pub currency: String,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &'static str| {
            lookup(key)
                .filter(|v| !v.trim().is_empty())
                .ok_or(ConfigError::Missing(key))
        };

        let app_url = lookup("APP_URL")
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_APP_URL.to_string())
            .trim_end_matches('/')
            .to_string();

        let port = parse_or("PORT", lookup("PORT"), 3000u16)?;
        let database_max_connections =
            parse_or("DATABASE_MAX_CONNECTIONS", lookup("DATABASE_MAX_CONNECTIONS"), 10u32)?;

        let extra_origins = lookup("CORS_ORIGINS").unwrap_or_default();
        let allowed_origins = build_allowed_origins(&app_url, &extra_origins);

        Ok(Self {
            database_url: required("DATABASE_URL")?,
            database_max_connections,
            jwt_secret: required("JWT_SECRET")?,
            stripe_secret_key: required("STRIPE_SECRET_KEY")?,
            stripe_webhook_secret: lookup("STRIPE_WEBHOOK_SECRET").filter(|v| !v.is_empty()),
            stripe_api_base: lookup("STRIPE_API_BASE")
                .unwrap_or_else(|| DEFAULT_STRIPE_API_BASE.to_string()),
            app_url,
            port,
            allowed_origins,
            currency: "usd".to_string(),
        })
    }

    pub fn is_allowed_origin(&self, origin: &str) -> bool {
        self.allowed_origins.iter().any(|o| o == origin)
    }
}

fn parse_or<T: std::str::FromStr>(
    key: &'static str,
    raw: Option<String>,
    default: T,
) -> Result<T, ConfigError> {
    match raw {
        None => Ok(default),
        Some(v) if v.trim().is_empty() => Ok(default),
        Some(v) => v.trim().parse().map_err(|_| {
            log::warn!("invalid {key} value: {v}");
            ConfigError::Invalid { key, value: v }
        }),
    }
}

fn build_allowed_origins(app_url: &str, extra: &str) -> Vec<String> {
    let mut origins: Vec<String> = Vec::new();
    let candidates = DEV_ORIGINS
        .iter()
        .copied()
        .chain(std::iter::once(app_url))
        .chain(extra.split(','));

    for origin in candidates {
        let origin = origin.trim().trim_end_matches('/');
        if !origin.is_empty() && !origins.iter().any(|o| o == origin) {
            origins.push(origin.to_string());
        }
    }
    origins
}
