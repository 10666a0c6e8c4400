use thiserror::Error;

use crate::types::AccountId;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Reddit API error: {0}")]
    RedditApi(#[from] RedditApiError),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Invalid input: {message}")]
    InvalidInput { message: String },

    #[error("Resource not found: {resource}")]
    NotFound { resource: String },

    #[error("Internal error: {message}")]
    Internal { message: String },
}

/// Failures of the Reddit submission pipeline.
///
/// Every variant renders a message fit for direct display. Raw provider
/// payloads ride along in `raw` fields and are exposed through
/// `ErrorExt::diagnostic_detail` rather than the display string.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RedditApiError {
    #[error("Account {account_id} not found")]
    AccountNotFound { account_id: AccountId },

    #[error("Invalid credentials for account {account_id}: {reason}")]
    InvalidCredentials { account_id: AccountId, reason: String },

    #[error(
        "Reddit rejected the refresh token or client secret (401). \
         Re-authorize the account to obtain a new refresh token"
    )]
    Unauthorized { raw: Option<String> },

    #[error("Authentication failed: {reason}")]
    AuthenticationFailed { reason: String },

    #[error("Could not connect through proxy {endpoint}: {reason}")]
    ProxyConnectionFailed { endpoint: String, reason: String },

    #[error("Invalid URL: '{url}'")]
    InvalidUrl { url: String },

    #[error("{message}")]
    ProviderRejected {
        code: Option<String>,
        message: String,
        raw: Option<String>,
    },

    #[error("{message}")]
    RateLimited {
        retry_after: Option<u64>,
        message: String,
        raw: Option<String>,
    },

    #[error("Unexpected response format from Reddit")]
    UnexpectedResponseFormat { raw: String },

    #[error("Reddit returned HTTP {status}")]
    ProviderError { status: u16, raw: String },

    #[error("Request timeout")]
    RequestTimeout,

    #[error("Network error: {reason}")]
    Network { reason: String },
}

#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("Connection failed: {reason}")]
    ConnectionFailed { reason: String },

    #[error("Migration failed: {migration}")]
    MigrationFailed { migration: String },

    #[error("Query execution failed: {query}")]
    QueryFailed { query: String },

    #[error("Constraint violation: {constraint}")]
    ConstraintViolation { constraint: String },

    #[error("Database locked")]
    DatabaseLocked,

    #[error("SQL error: {0}")]
    Sql(#[from] sqlx::Error),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration file not found: {path}")]
    FileNotFound { path: String },

    #[error("Invalid configuration format: {details}")]
    InvalidFormat { details: String },

    #[error("Missing required field: {field}")]
    MissingField { field: String },

    #[error("Invalid value for {field}: {value}")]
    InvalidValue { field: String, value: String },

    #[error("Configuration validation failed: {reason}")]
    ValidationFailed { reason: String },

    #[error("Configuration parsing error: {0}")]
    Parse(#[from] toml::de::Error),
}
