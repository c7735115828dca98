/// Database Module
///
/// The driver-facing layer of fluentdb, organized into focused submodules:
/// - **Connection Registry** (`connection.rs`): named handles and the current selection
/// - **Query Execution** (`query.rs`): prepare, bind, execute, read rows
/// - **Transactions** (`transaction.rs`): BEGIN/COMMIT/ROLLBACK on one connection
///
/// ## Error Handling
///
/// All operations return the crate's `FluentError` through `Result`.
pub mod connection;
pub mod query;
pub mod transaction;

pub use connection::*;
pub use query::*;
pub use transaction::TransactionState;
