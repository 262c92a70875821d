//! Configuration management
//!
//! This module handles loading and parsing configuration for the todo backend.
//! Configuration can be loaded from:
//! - config.yml file
//! - Environment variables (override file settings)
//!
//! Missing optional values are filled with sensible defaults. The signing key
//! has no default and must be supplied before the server starts; see
//! [`Config::validate`].

use serde::{Deserialize, Serialize};
use std::fmt;

/// Main configuration structure
///
/// Built once at startup and shared read-only afterwards.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,
    /// Database configuration
    #[serde(default)]
    pub database: DatabaseConfig,
    /// Session and token configuration
    #[serde(default)]
    pub auth: AuthConfig,
    /// Failed-login throttling
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host address to bind to
    #[serde(default = "default_host")]
    pub host: String,
    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,
    /// CORS allowed origin
    #[serde(default = "default_cors_origin")]
    pub cors_origin: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            cors_origin: default_cors_origin(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_cors_origin() -> String {
    "http://localhost:3000".to_string()
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Database driver (sqlite or mysql)
    #[serde(default)]
    pub driver: DatabaseDriver,
    /// Database connection URL
    #[serde(default = "default_database_url")]
    pub url: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            driver: DatabaseDriver::default(),
            url: default_database_url(),
        }
    }
}

fn default_database_url() -> String {
    "data/todo.db".to_string()
}

/// Database driver type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseDriver {
    /// SQLite (default)
    #[default]
    Sqlite,
    /// MySQL
    Mysql,
}

/// How login treats a subject that already holds a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SessionPolicy {
    /// Every successful login issues a new session
    #[default]
    Fresh,
    /// Login hands back the subject's latest session while it is still live
    Reuse,
}

/// Session and token configuration
#[derive(Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// HMAC key used to sign bearer tokens
    #[serde(default)]
    pub secret_key: String,
    /// Session lifetime in hours
    #[serde(default = "default_token_ttl_hours")]
    pub token_ttl_hours: i64,
    /// Upper bound for a single store round-trip, in seconds
    #[serde(default = "default_store_timeout_secs")]
    pub store_timeout_secs: u64,
    /// Session reuse policy on login
    #[serde(default)]
    pub session_policy: SessionPolicy,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            secret_key: String::new(),
            token_ttl_hours: default_token_ttl_hours(),
            store_timeout_secs: default_store_timeout_secs(),
            session_policy: SessionPolicy::default(),
        }
    }
}

// The signing key must never end up in logs.
impl fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthConfig")
            .field("secret_key", &"<redacted>")
            .field("token_ttl_hours", &self.token_ttl_hours)
            .field("store_timeout_secs", &self.store_timeout_secs)
            .field("session_policy", &self.session_policy)
            .finish()
    }
}

/// Longest accepted session lifetime (one year)
pub const MAX_TOKEN_TTL_HOURS: i64 = 24 * 366;

/// Longest accepted throttling window (one week)
pub const MAX_WINDOW_MINUTES: i64 = 60 * 24 * 7;

impl AuthConfig {
    /// Session lifetime, held inside `1..=MAX_TOKEN_TTL_HOURS` hours
    pub fn token_ttl(&self) -> chrono::Duration {
        chrono::Duration::hours(self.token_ttl_hours.clamp(1, MAX_TOKEN_TTL_HOURS))
    }

    /// Deadline applied to every store call
    pub fn store_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.store_timeout_secs)
    }
}

fn default_token_ttl_hours() -> i64 {
    72
}

fn default_store_timeout_secs() -> u64 {
    5
}

/// Failed-login throttling configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// Failed attempts allowed per email inside one window
    #[serde(default = "default_max_attempts")]
    pub max_attempts: usize,
    /// Sliding window length in minutes
    #[serde(default = "default_window_minutes")]
    pub window_minutes: i64,
}

impl RateLimitConfig {
    /// Sliding window, held inside `1..=MAX_WINDOW_MINUTES` minutes
    pub fn window(&self) -> chrono::Duration {
        chrono::Duration::minutes(self.window_minutes.clamp(1, MAX_WINDOW_MINUTES))
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            window_minutes: default_window_minutes(),
        }
    }
}

fn default_max_attempts() -> usize {
    5
}

fn default_window_minutes() -> i64 {
    10
}

/// Error type for configuration parsing
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    FileRead {
        path: String,
        source: std::io::Error,
    },
    #[error("Failed to parse config file '{path}': {message}")]
    ParseError {
        path: String,
        message: String,
    },
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

impl Config {
    /// Load configuration from file
    ///
    /// If the file doesn't exist, returns default configuration.
    /// If the file exists but is invalid YAML, returns an error with details.
    pub fn load(path: &std::path::Path) -> anyhow::Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::FileRead {
            path: path.display().to_string(),
            source: e,
        })?;

        if content.trim().is_empty() {
            return Ok(Self::default());
        }

        let config: Config = serde_yaml::from_str(&content).map_err(|e| {
            ConfigError::ParseError {
                path: path.display().to_string(),
                message: format_yaml_error(&e),
            }
        })?;

        Ok(config)
    }

    /// Load configuration from file with environment variable overrides
    ///
    /// Environment variables follow the pattern:
    /// - TODO_SERVER_HOST, TODO_SERVER_PORT, TODO_SERVER_CORS_ORIGIN
    /// - TODO_DATABASE_DRIVER, TODO_DATABASE_URL
    /// - TODO_AUTH_SECRET_KEY, TODO_AUTH_TOKEN_TTL_HOURS,
    ///   TODO_AUTH_STORE_TIMEOUT_SECS, TODO_AUTH_SESSION_POLICY
    /// - TODO_RATE_LIMIT_MAX_ATTEMPTS, TODO_RATE_LIMIT_WINDOW_MINUTES
    pub fn load_with_env(path: &std::path::Path) -> anyhow::Result<Self> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Check the values that have no safe default.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.auth.secret_key.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "auth.secret_key must be set (or TODO_AUTH_SECRET_KEY)".to_string(),
            ));
        }
        if !(1..=MAX_TOKEN_TTL_HOURS).contains(&self.auth.token_ttl_hours) {
            return Err(ConfigError::ValidationError(format!(
                "auth.token_ttl_hours must be between 1 and {}, got {}",
                MAX_TOKEN_TTL_HOURS, self.auth.token_ttl_hours
            )));
        }
        if self.auth.store_timeout_secs == 0 {
            return Err(ConfigError::ValidationError(
                "auth.store_timeout_secs must be positive".to_string(),
            ));
        }
        if self.rate_limit.max_attempts == 0 {
            return Err(ConfigError::ValidationError(
                "rate_limit.max_attempts must be positive".to_string(),
            ));
        }
        if !(1..=MAX_WINDOW_MINUTES).contains(&self.rate_limit.window_minutes) {
            return Err(ConfigError::ValidationError(format!(
                "rate_limit.window_minutes must be between 1 and {}, got {}",
                MAX_WINDOW_MINUTES, self.rate_limit.window_minutes
            )));
        }
        Ok(())
    }

    /// Apply environment variable overrides to the configuration
    fn apply_env_overrides(&mut self) {
        // Server configuration
        if let Ok(host) = std::env::var("TODO_SERVER_HOST") {
            self.server.host = host;
        }
        if let Ok(port) = std::env::var("TODO_SERVER_PORT") {
            if let Ok(port) = port.parse::<u16>() {
                self.server.port = port;
            }
        }
        if let Ok(cors_origin) = std::env::var("TODO_SERVER_CORS_ORIGIN") {
            self.server.cors_origin = cors_origin;
        }

        // Database configuration
        if let Ok(driver) = std::env::var("TODO_DATABASE_DRIVER") {
            match driver.to_lowercase().as_str() {
                "sqlite" => self.database.driver = DatabaseDriver::Sqlite,
                "mysql" => self.database.driver = DatabaseDriver::Mysql,
                _ => {} // Ignore invalid values
            }
        }
        if let Ok(url) = std::env::var("TODO_DATABASE_URL") {
            self.database.url = url;
        }

        // Auth configuration
        if let Ok(secret) = std::env::var("TODO_AUTH_SECRET_KEY") {
            self.auth.secret_key = secret;
        }
        if let Ok(ttl) = std::env::var("TODO_AUTH_TOKEN_TTL_HOURS") {
            if let Ok(ttl) = ttl.parse::<i64>() {
                self.auth.token_ttl_hours = ttl;
            }
        }
        if let Ok(timeout) = std::env::var("TODO_AUTH_STORE_TIMEOUT_SECS") {
            if let Ok(timeout) = timeout.parse::<u64>() {
                self.auth.store_timeout_secs = timeout;
            }
        }
        if let Ok(policy) = std::env::var("TODO_AUTH_SESSION_POLICY") {
            match policy.to_lowercase().as_str() {
                "fresh" => self.auth.session_policy = SessionPolicy::Fresh,
                "reuse" => self.auth.session_policy = SessionPolicy::Reuse,
                _ => {}
            }
        }

        // Rate limit configuration
        if let Ok(max) = std::env::var("TODO_RATE_LIMIT_MAX_ATTEMPTS") {
            if let Ok(max) = max.parse::<usize>() {
                self.rate_limit.max_attempts = max;
            }
        }
        if let Ok(window) = std::env::var("TODO_RATE_LIMIT_WINDOW_MINUTES") {
            if let Ok(window) = window.parse::<i64>() {
                self.rate_limit.window_minutes = window;
            }
        }
    }
}

/// Format YAML parsing error with location and context
fn format_yaml_error(e: &serde_yaml::Error) -> String {
    if let Some(location) = e.location() {
        format!(
            "at line {}, column {}: {}",
            location.line(),
            location.column(),
            e
        )
    } else {
        e.to_string()
    }
}

// Shared mutex for all config tests that modify environment variables.
#[cfg(test)]
static CONFIG_ENV_MUTEX: std::sync::Mutex<()> = std::sync::Mutex::new(());

#[cfg(test)]
const ENV_KEYS: &[&str] = &[
    "TODO_SERVER_HOST",
    "TODO_SERVER_PORT",
    "TODO_SERVER_CORS_ORIGIN",
    "TODO_DATABASE_DRIVER",
    "TODO_DATABASE_URL",
    "TODO_AUTH_SECRET_KEY",
    "TODO_AUTH_TOKEN_TTL_HOURS",
    "TODO_AUTH_STORE_TIMEOUT_SECS",
    "TODO_AUTH_SESSION_POLICY",
    "TODO_RATE_LIMIT_MAX_ATTEMPTS",
    "TODO_RATE_LIMIT_WINDOW_MINUTES",
];

#[cfg(test)]
fn clear_env() {
    for key in ENV_KEYS {
        std::env::remove_var(key);
    }
}
