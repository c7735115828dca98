/// Transaction Primitives
///
/// Driver-level transaction boundaries on a single connection. SQLite is in
/// autocommit mode unless a `BEGIN` is open; leaving autocommit means issuing
/// `BEGIN`, and `COMMIT`/`ROLLBACK` restore it.
use crate::core::{FluentError, Result};
use rusqlite::Connection;
use tracing::{info, warn};

/// Represents database transaction states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransactionState {
    /// No active transaction (autocommit mode)
    #[default]
    Autocommit,
    /// Transaction in progress
    Active,
}

/// Leaves autocommit mode.
pub fn begin(connection: &Connection) -> Result<()> {
    connection
        .execute_batch("BEGIN")
        .map_err(|e| FluentError::TransactionStart(e.to_string()))?;
    info!("transaction started");
    Ok(())
}

/// Commits and restores autocommit.
///
/// If the driver refuses the commit and the transaction is still open, it is
/// rolled back so the connection is back in autocommit mode either way.
pub fn commit(connection: &Connection) -> Result<()> {
    if let Err(e) = connection.execute_batch("COMMIT") {
        if !connection.is_autocommit() {
            match connection.execute_batch("ROLLBACK") {
                Ok(()) => info!("transaction rolled back after failed commit"),
                Err(rollback) => {
                    warn!(error = %rollback, "rollback after failed commit failed")
                }
            }
        }
        return Err(FluentError::Commit(e.to_string()));
    }
    info!("transaction committed");
    Ok(())
}

/// Rolls back and restores autocommit.
pub fn rollback(connection: &Connection) -> Result<()> {
    connection
        .execute_batch("ROLLBACK")
        .map_err(|e| FluentError::Rollback(e.to_string()))?;
    info!("transaction rolled back");
    Ok(())
}
