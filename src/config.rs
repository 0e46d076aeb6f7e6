//! Application configuration
//!
//! Loads configuration from environment variables with sensible defaults.

use std::env;

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Server host address
    pub host: String,
    /// Server port
    pub port: u16,
    /// Database connection URL
    pub database_url: String,
    /// Mercado Pago access token
    pub mp_access_token: String,
    /// Public base URL of the site; used to build checkout back URLs,
    /// the webhook notification URL, and QR-embedded verification links
    pub public_base_url: String,
    /// Email provider API key
    pub email_api_key: String,
    /// From address for transactional email
    pub email_from: String,
    /// Owner address notified on each confirmed booking
    pub email_owner: String,
    /// Token for the external document-lookup API (optional feature)
    pub document_lookup_token: Option<String>,
    /// Rendering-layer revalidation hook (optional)
    pub revalidate_url: Option<String>,
    /// When enabled, all non-asset paths answer with a maintenance page
    pub maintenance_mode: bool,
    /// Session expiration in hours
    pub session_expiry_hours: i64,
    /// CORS allowed origins
    pub cors_origins: Vec<String>,
    /// Environment (development/production)
    pub environment: Environment,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Environment {
    Development,
    Production,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let environment = match env::var("ENVIRONMENT")
            .unwrap_or_else(|_| "development".to_string())
            .to_lowercase()
            .as_str()
        {
            "production" | "prod" => Environment::Production,
            _ => Environment::Development,
        };

        let database_url = env::var("DATABASE_URL")
            .or_else(|_| {
                let host = env::var("DATABASE_HOST").map_err(|_| env::VarError::NotPresent)?;
                let port = env::var("DATABASE_PORT").unwrap_or_else(|_| "5432".to_string());
                let user = env::var("DATABASE_USER").map_err(|_| env::VarError::NotPresent)?;
                let password =
                    env::var("DATABASE_PASSWORD").map_err(|_| env::VarError::NotPresent)?;
                let db = env::var("DATABASE_DB").map_err(|_| env::VarError::NotPresent)?;
                Ok(format!(
                    "postgres://{}:{}@{}:{}/{}",
                    user, password, host, port, db
                ))
            })
            .map_err(|_: env::VarError| {
                ConfigError::Missing(
                    "DATABASE_URL or DATABASE_HOST + DATABASE_USER + DATABASE_PASSWORD + DATABASE_DB is required".to_string(),
                )
            })?;

        let mp_access_token = env::var("MP_ACCESS_TOKEN").map_err(|_| {
            ConfigError::Missing("MP_ACCESS_TOKEN is required".to_string())
        })?;

        let email_api_key = env::var("RESEND_API_KEY").map_err(|_| {
            ConfigError::Missing("RESEND_API_KEY is required".to_string())
        })?;

        Ok(Config {
            host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: env::var("PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(8080),
            database_url,
            mp_access_token,
            public_base_url: env::var("PUBLIC_BASE_URL")
                .map(|u| u.trim_end_matches('/').to_string())
                .unwrap_or_else(|_| "http://localhost:8080".to_string()),
            email_api_key,
            email_from: env::var("EMAIL_FROM")
                .unwrap_or_else(|_| "reservas@andaraytours.pe".to_string()),
            email_owner: env::var("EMAIL_OWNER")
                .unwrap_or_else(|_| "info@andaraytours.pe".to_string()),
            document_lookup_token: env::var("DOCUMENT_LOOKUP_TOKEN").ok(),
            revalidate_url: env::var("REVALIDATE_URL").ok(),
            maintenance_mode: env::var("MAINTENANCE_MODE")
                .map(|v| matches!(v.to_lowercase().as_str(), "1" | "true" | "yes" | "on"))
                .unwrap_or(false),
            session_expiry_hours: env::var("SESSION_EXPIRY_HOURS")
                .ok()
                .and_then(|h| h.parse().ok())
                .unwrap_or(8),
            cors_origins: env::var("CORS_ORIGINS")
                .map(|s| s.split(',').map(|o| o.trim().to_string()).collect())
                .unwrap_or_else(|_| vec!["http://localhost:3000".to_string()]),
            environment,
        })
    }

    /// Check if running in production
    pub fn is_production(&self) -> bool {
        self.environment == Environment::Production
    }

    /// Get the server address
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[derive(Debug, thiserror::Error)]
#[allow(dead_code)]
pub enum ConfigError {
    #[error("Missing configuration: {0}")]
    Missing(String),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}
