//! Common error types for the catalog service

use thiserror::Error;

/// Common result type for catalog operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types across the catalog crates
#[derive(Error, Debug)]
pub enum Error {
    /// Database driver error (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed TOML configuration file
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Configuration error: unknown middleware key, missing schema entry,
    /// invalid config value. Fatal, never retried.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Statement could not be prepared (empty SQL, unknown column)
    #[error("Query error: {0}")]
    Query(String),

    /// Statement could not be executed (nothing prepared, malformed parameters)
    #[error("Execution error: {0}")]
    Execution(String),

    /// Transaction boundary misuse (nested begin, commit/rollback while inactive)
    #[error("Transaction state error: {0}")]
    TransactionState(String),

    /// Requested resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid user input or request parameter
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Internal server error
    #[error("Internal error: {0}")]
    Internal(String),
}
