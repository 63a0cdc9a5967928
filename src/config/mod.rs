//! Configuration management
//!
//! This module handles loading and parsing configuration for SignLearn.
//! Configuration can be loaded from:
//! - config.yml file
//! - Environment variables (override file settings)
//!
//! Missing optional values are filled with sensible defaults.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,
    /// Database configuration
    #[serde(default)]
    pub database: DatabaseConfig,
    /// Template configuration
    #[serde(default)]
    pub templates: TemplatesConfig,
    /// Outbound dictionary / sign video lookups
    #[serde(default)]
    pub lookup: LookupConfig,
    /// Login session configuration
    #[serde(default)]
    pub session: SessionConfig,
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
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8000
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
    "data/signlearn.db".to_string()
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

/// Template configuration
///
/// Templates found under `path` override the embedded defaults by name.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemplatesConfig {
    /// Directory with template overrides
    #[serde(default = "default_templates_path")]
    pub path: PathBuf,
    /// Site name shown in page titles
    #[serde(default = "default_site_name")]
    pub site_name: String,
}

impl Default for TemplatesConfig {
    fn default() -> Self {
        Self {
            path: default_templates_path(),
            site_name: default_site_name(),
        }
    }
}

fn default_templates_path() -> PathBuf {
    PathBuf::from("templates")
}

fn default_site_name() -> String {
    "SignLearn".to_string()
}

/// Outbound lookup configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LookupConfig {
    /// Base URL of the English dictionary API; the word is appended as a path segment
    #[serde(default = "default_dictionary_api_base")]
    pub dictionary_api_base: String,
    /// Base URL of the sign video site; `/sign/{term}` is appended
    #[serde(default = "default_sign_site_base")]
    pub sign_site_base: String,
    /// Timeout for definition requests, in seconds
    #[serde(default = "default_definition_timeout_secs")]
    pub definition_timeout_secs: u64,
    /// Timeout for sign video page requests, in seconds
    #[serde(default = "default_video_timeout_secs")]
    pub video_timeout_secs: u64,
    /// Upper bound on in-flight video fetches while assembling one page
    #[serde(default = "default_max_concurrent_fetches")]
    pub max_concurrent_fetches: usize,
    /// User-Agent sent with outbound requests
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for LookupConfig {
    fn default() -> Self {
        Self {
            dictionary_api_base: default_dictionary_api_base(),
            sign_site_base: default_sign_site_base(),
            definition_timeout_secs: default_definition_timeout_secs(),
            video_timeout_secs: default_video_timeout_secs(),
            max_concurrent_fetches: default_max_concurrent_fetches(),
            user_agent: default_user_agent(),
        }
    }
}

impl LookupConfig {
    pub fn definition_timeout(&self) -> Duration {
        Duration::from_secs(self.definition_timeout_secs)
    }

    pub fn video_timeout(&self) -> Duration {
        Duration::from_secs(self.video_timeout_secs)
    }
}

fn default_dictionary_api_base() -> String {
    "https://api.dictionaryapi.dev/api/v2/entries/en".to_string()
}

fn default_sign_site_base() -> String {
    "https://www.signasl.org".to_string()
}

fn default_definition_timeout_secs() -> u64 {
    6
}

fn default_video_timeout_secs() -> u64 {
    8
}

fn default_max_concurrent_fetches() -> usize {
    8
}

fn default_user_agent() -> String {
    concat!("SignLearn/", env!("CARGO_PKG_VERSION")).to_string()
}

/// Login session configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Days before a login session expires
    #[serde(default = "default_expiration_days")]
    pub expiration_days: i64,
    /// Name of the session cookie
    #[serde(default = "default_cookie_name")]
    pub cookie_name: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            expiration_days: default_expiration_days(),
            cookie_name: default_cookie_name(),
        }
    }
}

fn default_expiration_days() -> i64 {
    14
}

fn default_cookie_name() -> String {
    "session".to_string()
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

        config.validate()?;

        Ok(config)
    }

    /// Load configuration from file with environment variable overrides
    ///
    /// Environment variables follow the pattern:
    /// - SIGNLEARN_SERVER_HOST
    /// - SIGNLEARN_SERVER_PORT
    /// - SIGNLEARN_DATABASE_DRIVER
    /// - SIGNLEARN_DATABASE_URL
    /// - SIGNLEARN_TEMPLATES_PATH
    /// - SIGNLEARN_LOOKUP_DICTIONARY_API_BASE
    /// - SIGNLEARN_LOOKUP_SIGN_SITE_BASE
    /// - SIGNLEARN_LOOKUP_DEFINITION_TIMEOUT_SECS
    /// - SIGNLEARN_LOOKUP_VIDEO_TIMEOUT_SECS
    /// - SIGNLEARN_LOOKUP_MAX_CONCURRENT_FETCHES
    /// - SIGNLEARN_SESSION_EXPIRATION_DAYS
    pub fn load_with_env(path: &std::path::Path) -> anyhow::Result<Self> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Reject values that would make the server misbehave at runtime
    fn validate(&self) -> Result<(), ConfigError> {
        if self.lookup.max_concurrent_fetches == 0 {
            return Err(ConfigError::ValidationError(
                "lookup.max_concurrent_fetches must be at least 1".to_string(),
            ));
        }
        if self.lookup.definition_timeout_secs == 0 {
            return Err(ConfigError::ValidationError(
                "lookup.definition_timeout_secs must be at least 1".to_string(),
            ));
        }
        if self.lookup.video_timeout_secs == 0 {
            return Err(ConfigError::ValidationError(
                "lookup.video_timeout_secs must be at least 1".to_string(),
            ));
        }
        if self.session.expiration_days < 1 {
            return Err(ConfigError::ValidationError(
                "session.expiration_days must be at least 1".to_string(),
            ));
        }
        if self.session.cookie_name.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "session.cookie_name must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(host) = std::env::var("SIGNLEARN_SERVER_HOST") {
            self.server.host = host;
        }
        if let Ok(port) = std::env::var("SIGNLEARN_SERVER_PORT") {
            if let Ok(port) = port.parse::<u16>() {
                self.server.port = port;
            }
        }

        if let Ok(driver) = std::env::var("SIGNLEARN_DATABASE_DRIVER") {
            match driver.to_lowercase().as_str() {
                "sqlite" => self.database.driver = DatabaseDriver::Sqlite,
                "mysql" => self.database.driver = DatabaseDriver::Mysql,
                _ => {} // Ignore invalid values
            }
        }
        if let Ok(url) = std::env::var("SIGNLEARN_DATABASE_URL") {
            self.database.url = url;
        }

        if let Ok(path) = std::env::var("SIGNLEARN_TEMPLATES_PATH") {
            self.templates.path = PathBuf::from(path);
        }

        if let Ok(base) = std::env::var("SIGNLEARN_LOOKUP_DICTIONARY_API_BASE") {
            self.lookup.dictionary_api_base = base;
        }
        if let Ok(base) = std::env::var("SIGNLEARN_LOOKUP_SIGN_SITE_BASE") {
            self.lookup.sign_site_base = base;
        }
        if let Ok(secs) = std::env::var("SIGNLEARN_LOOKUP_DEFINITION_TIMEOUT_SECS") {
            if let Ok(secs) = secs.parse::<u64>() {
                self.lookup.definition_timeout_secs = secs;
            }
        }
        if let Ok(secs) = std::env::var("SIGNLEARN_LOOKUP_VIDEO_TIMEOUT_SECS") {
            if let Ok(secs) = secs.parse::<u64>() {
                self.lookup.video_timeout_secs = secs;
            }
        }
        if let Ok(n) = std::env::var("SIGNLEARN_LOOKUP_MAX_CONCURRENT_FETCHES") {
            if let Ok(n) = n.parse::<usize>() {
                self.lookup.max_concurrent_fetches = n;
            }
        }

        if let Ok(days) = std::env::var("SIGNLEARN_SESSION_EXPIRATION_DAYS") {
            if let Ok(days) = days.parse::<i64>() {
                self.session.expiration_days = days;
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

// Every test that touches process env vars takes this lock.
#[cfg(test)]
static CONFIG_ENV_MUTEX: std::sync::Mutex<()> = std::sync::Mutex::new(());
