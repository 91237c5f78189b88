//! Error types for Folio Alerts

use thiserror::Error;

use crate::models::DeliveryStatus;
use crate::validation::ValidationErrors;

/// Result type alias using the crate's Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for alert and notification operations
#[derive(Error, Debug)]
pub enum Error {
    /// One or more entity fields failed validation; nothing was persisted
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationErrors),

    /// A stored condition could not be evaluated
    #[error("Invalid condition: {0}")]
    InvalidCondition(String),

    /// Attempted to move a notification out of a terminal state
    #[error("Invalid state transition: {from} -> {to}")]
    InvalidStateTransition {
        /// Current status
        from: DeliveryStatus,
        /// Requested status
        to: DeliveryStatus,
    },

    /// Not found error
    #[error("{entity} not found: {id}")]
    NotFound {
        /// Entity kind
        entity: String,
        /// Lookup key
        id: String,
    },

    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Migration error
    #[error("Migration failed: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Outbound HTTP error (delivery transport, metrics source)
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// Create a not found error
    pub fn not_found(entity: impl Into<String>, id: impl ToString) -> Self {
        Self::NotFound {
            entity: entity.into(),
            id: id.to_string(),
        }
    }

    /// Create an invalid condition error
    pub fn invalid_condition(msg: impl Into<String>) -> Self {
        Self::InvalidCondition(msg.into())
    }

    /// Create a config error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an internal error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }
}

impl From<::config::ConfigError> for Error {
    fn from(err: ::config::ConfigError) -> Self {
        Self::Config(err.to_string())
    }
}
