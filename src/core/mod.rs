/// Core Module for fluentdb
///
/// Shared infrastructure used by the builder and the database facade: the
/// error type, values and parameter binding, and the driver-facing layer.
pub mod db;
pub mod error;
pub mod value;

// Re-export commonly used types for convenience
pub use error::{FluentError, Result};
pub use value::{BindParameter, ParamBuffer, TypeTag, Value};
