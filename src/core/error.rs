/// Error Module
///
/// This module defines the error type shared by every layer of fluentdb:
/// the connection registry, the SQL compiler, the executor and the
/// transaction manager. Nothing is recovered silently; every failure below
/// reaches the caller through [`Result`].
use thiserror::Error;

/// Comprehensive error type for fluentdb.
///
/// The variants fall into four groups:
/// - Registry failures (unknown, duplicate or vanished connections)
/// - Compiler and driver rejections (prepare failures, bad directives, bad operands)
/// - Transaction lifecycle failures
/// - Ambient failures (configuration, I/O, JSON)
#[derive(Error, Debug)]
pub enum FluentError {
    /// Driver errors that are not a prepare rejection
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// `set_connection` / `disconnect` named a connection that is not registered
    #[error("Connection error: no connection named '{0}' is registered")]
    ConnectionNotFound(String),

    /// `add_connection` was called twice with the same name
    #[error("Connection error: a connection named '{0}' is already registered")]
    ConnectionAlreadyExists(String),

    /// The currently selected connection is not registered (e.g. after disconnect)
    #[error("Connection error: current connection '{0}' is not available")]
    NoActiveConnection(String),

    /// The driver refused to prepare the compiled statement
    #[error("Prepare error ({code}): {message}")]
    Prepare { message: String, code: i32 },

    /// A tagged column value used a directive key the compiler does not know
    #[error("Invalid value directive: '{0}'")]
    InvalidValueDirective(String),

    /// An operand cannot be rendered for the operator it was paired with
    #[error("Invalid operand for {operator}: {reason}")]
    InvalidOperand { operator: String, reason: String },

    /// `order_by` was given a direction other than ASC/DESC
    #[error("Invalid order direction: '{0}'")]
    InvalidOrderDirection(String),

    /// Placeholder count and bound parameter count disagree
    #[error("Bind error: statement has {placeholders} placeholders but {params} parameters were bound")]
    BindMismatch { placeholders: usize, params: usize },

    /// The driver could not leave autocommit mode
    #[error("Transaction error: failed to start transaction: {0}")]
    TransactionStart(String),

    /// The driver refused to commit
    #[error("Transaction error: commit failed: {0}")]
    Commit(String),

    /// The driver refused to roll back
    #[error("Transaction error: rollback failed: {0}")]
    Rollback(String),

    /// A transaction was started while another one is active
    #[error("Transaction error: a transaction is already active")]
    NestedTransaction,

    /// Configuration loading and validation errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// File system and I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON encoding and directive decoding errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl FluentError {
    /// Builds a [`FluentError::Prepare`] from the driver's rejection.
    ///
    /// The code is SQLite's extended result code, or -1 when the driver
    /// error did not originate in SQLite itself.
    pub fn prepare(err: &rusqlite::Error) -> Self {
        FluentError::Prepare {
            message: err.to_string(),
            code: driver_code(err),
        }
    }
}

/// Extracts the extended SQLite result code from a driver error.
pub fn driver_code(err: &rusqlite::Error) -> i32 {
    match err {
        rusqlite::Error::SqliteFailure(e, _) => e.extended_code,
        _ => -1,
    }
}

/// Type alias for Result to use FluentError as the error type.
pub type Result<T> = std::result::Result<T, FluentError>;
