//! Application configuration.
//!
//! Values come from an optional TOML file and are then overridden by a small
//! set of environment variables. Every section has working defaults so the
//! service can start with no file at all.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info};

pub const CONFIG_PATH_ENV: &str = "REDPOST_CONFIG";
pub const DEFAULT_CONFIG_PATH: &str = "redpost.toml";

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub reddit: RedditConfig,
    pub batch: BatchConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:8080".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DatabaseConfig {
    pub url: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite://redpost.db".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RedditConfig {
    pub user_agent: String,
    pub token_url: String,
    pub api_base: String,
    pub authorize_url: String,
    pub redirect_uri: String,
    pub request_timeout_secs: u64,
    pub flair_timeout_secs: u64,
    pub connect_timeout_secs: u64,
}

impl Default for RedditConfig {
    fn default() -> Self {
        Self {
            user_agent: "redpost/0.1 (bulk poster)".to_string(),
            token_url: "https://www.reddit.com/api/v1/access_token".to_string(),
            api_base: "https://oauth.reddit.com".to_string(),
            authorize_url: "https://www.reddit.com/api/v1/authorize".to_string(),
            redirect_uri: "http://127.0.0.1:8080/auth/callback".to_string(),
            request_timeout_secs: 30,
            flair_timeout_secs: 10,
            connect_timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct BatchConfig {
    pub default_delay_from_secs: u64,
    pub default_delay_up_to_secs: u64,
    pub progress_ttl_secs: u64,
    pub max_tracked_runs: usize,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            default_delay_from_secs: 30,
            default_delay_up_to_secs: 90,
            progress_ttl_secs: 24 * 60 * 60,
            max_tracked_runs: 100,
        }
    }
}

impl AppConfig {
    /// Loads from `REDPOST_CONFIG` (or `redpost.toml`) and the process environment.
    pub fn load() -> Result<Self, ConfigError> {
        let explicit = std::env::var(CONFIG_PATH_ENV).ok();
        let path = explicit.as_deref().unwrap_or(DEFAULT_CONFIG_PATH);

        let mut config = if Path::new(path).exists() {
            info!("Loading configuration from {}", path);
            Self::from_file(path)?
        } else if explicit.is_some() {
            return Err(ConfigError::FileNotFound {
                path: path.to_string(),
            });
        } else {
            debug!("No configuration file at {}, using defaults", path);
            Self::default()
        };

        config.apply_overrides(|name| std::env::var(name).ok());
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => ConfigError::FileNotFound {
                path: path.display().to_string(),
            },
            _ => ConfigError::InvalidFormat {
                details: format!("{}: {}", path.display(), e),
            },
        })?;
        Self::from_toml_str(&raw)
    }

    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(raw)?)
    }

    /// Applies `REDPOST_BIND`, `DATABASE_URL`, `REDPOST_USER_AGENT` and
    /// `REDPOST_REDIRECT_URI` when the lookup yields a non-empty value.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        if let Some(bind) = get("REDPOST_BIND") {
            self.server.bind = bind;
        }
        if let Some(url) = get("DATABASE_URL") {
            self.database.url = url;
        }
        if let Some(user_agent) = get("REDPOST_USER_AGENT") {
            self.reddit.user_agent = user_agent;
        }
        if let Some(redirect_uri) = get("REDPOST_REDIRECT_URI") {
            self.reddit.redirect_uri = redirect_uri;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.reddit.user_agent.trim().is_empty() {
            return Err(ConfigError::MissingField {
                field: "reddit.user_agent".to_string(),
            });
        }
        for (field, value) in [
            ("reddit.request_timeout_secs", self.reddit.request_timeout_secs),
            ("reddit.flair_timeout_secs", self.reddit.flair_timeout_secs),
            ("reddit.connect_timeout_secs", self.reddit.connect_timeout_secs),
        ] {
            if value == 0 {
                return Err(ConfigError::InvalidValue {
                    field: field.to_string(),
                    value: value.to_string(),
                });
            }
        }
        if self.batch.default_delay_from_secs > self.batch.default_delay_up_to_secs {
            return Err(ConfigError::ValidationFailed {
                reason: format!(
                    "batch.default_delay_from_secs ({}) exceeds \
                     batch.default_delay_up_to_secs ({})",
                    self.batch.default_delay_from_secs, self.batch.default_delay_up_to_secs
                ),
            });
        }
        if self.batch.max_tracked_runs == 0 {
            return Err(ConfigError::InvalidValue {
                field: "batch.max_tracked_runs".to_string(),
                value: "0".to_string(),
            });
        }
        Ok(())
    }
}
