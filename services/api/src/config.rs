//! services/api/src/config.rs
//!
//! Defines the application's configuration structure and loading logic.
//!
//! All configuration is loaded from environment variables at startup. The `.env`
//! file is used for local development.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;
use tracing::Level;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing the environment variable {0}")]
    MissingVar(String),
    #[error("Invalid value for the environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    /// `None` runs the service on the in-memory repository.
    pub database_url: Option<String>,
    pub log_level: Level,
    pub openai_api_key: Option<String>,
    pub openai_api_base: Option<String>,
    pub content_model: String,
    pub roadmap_model: String,
    pub chat_model: String,
    pub generation_concurrency: usize,
    pub generation_task_timeout: Option<Duration>,
    pub chat_history_cap: usize,
    pub chat_pin_system_message: bool,
    pub chat_session_capacity: u64,
    pub chat_session_idle: Duration,
    pub cors_origin: String,
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// It will look for a `.env` file in the current directory for development,
    /// but this is skipped in test environments to ensure tests are hermetic.
    pub fn from_env() -> Result<Self, ConfigError> {
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }
        Self::from_vars(std::env::vars().collect())
    }

    /// Builds the configuration from an explicit variable map.
    pub fn from_vars(vars: HashMap<String, String>) -> Result<Self, ConfigError> {
        let get = |key: &str| vars.get(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        // --- Server and Database Settings ---
        let bind_address = parse_value::<SocketAddr>(
            &get("BIND_ADDRESS").unwrap_or_else(|| "0.0.0.0:5000".to_string()),
            "BIND_ADDRESS",
        )?;
        let database_url = get("DATABASE_URL");

        let log_level_str = get("RUST_LOG").unwrap_or_else(|| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        // --- LLM Settings ---
        let openai_api_key = get("OPENAI_API_KEY");
        let openai_api_base = get("OPENAI_API_BASE");
        let content_model = get("CONTENT_MODEL").unwrap_or_else(|| "gpt-4o-mini".to_string());
        let roadmap_model = get("ROADMAP_MODEL").unwrap_or_else(|| "gpt-4o".to_string());
        let chat_model = get("CHAT_MODEL").unwrap_or_else(|| "gpt-4o-mini".to_string());

        // --- Generation Queue ---
        let generation_concurrency: usize = parse_or(get("GENERATION_CONCURRENCY"), "GENERATION_CONCURRENCY", 2)?;
        if generation_concurrency == 0 {
            return Err(ConfigError::InvalidValue(
                "GENERATION_CONCURRENCY".to_string(),
                "must be at least 1".to_string(),
            ));
        }
        let generation_task_timeout = match get("GENERATION_TASK_TIMEOUT_SECS") {
            Some(raw) => Some(Duration::from_secs(parse_value::<u64>(&raw, "GENERATION_TASK_TIMEOUT_SECS")?)),
            None => None,
        };

        // --- Chat ---
        let chat_history_cap: usize = parse_or(get("CHAT_HISTORY_CAP"), "CHAT_HISTORY_CAP", 20)?;
        if chat_history_cap == 0 {
            return Err(ConfigError::InvalidValue(
                "CHAT_HISTORY_CAP".to_string(),
                "must be at least 1".to_string(),
            ));
        }
        let chat_pin_system_message = parse_or(get("CHAT_PIN_SYSTEM_MESSAGE"), "CHAT_PIN_SYSTEM_MESSAGE", false)?;
        let chat_session_capacity = parse_or(get("CHAT_SESSION_CAPACITY"), "CHAT_SESSION_CAPACITY", 1000)?;
        let chat_session_idle = Duration::from_secs(parse_or(get("CHAT_SESSION_IDLE_SECS"), "CHAT_SESSION_IDLE_SECS", 3600)?);

        let cors_origin = get("CORS_ORIGIN").unwrap_or_else(|| "http://localhost:3000".to_string());

        Ok(Self {
            bind_address,
            database_url,
            log_level,
            openai_api_key,
            openai_api_base,
            content_model,
            roadmap_model,
            chat_model,
            generation_concurrency,
            generation_task_timeout,
            chat_history_cap,
            chat_pin_system_message,
            chat_session_capacity,
            chat_session_idle,
            cors_origin,
        })
    }

    /// The API key the LLM adapters need. Only the server binary requires it.
    pub fn require_openai_key(&self) -> Result<&str, ConfigError> {
        self.openai_api_key
            .as_deref()
            .ok_or_else(|| ConfigError::MissingVar("OPENAI_API_KEY".to_string()))
    }
}

fn parse_value<T>(raw: &str, key: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.parse::<T>()
        .map_err(|e| ConfigError::InvalidValue(key.to_string(), e.to_string()))
}

fn parse_or<T>(raw: Option<String>, key: &str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match raw {
        Some(raw) => parse_value(&raw, key),
        None => Ok(default),
    }
}
