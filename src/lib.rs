// Core infrastructure modules
pub mod core;

// Statement building and execution
pub mod builder;
pub mod config;
pub mod database;
pub mod output;
pub mod trace;
pub mod transaction;

#[cfg(test)]
pub mod test_utils;

pub use builder::{
    dec, func, inc, not, now, values_from_json, ClauseBuilder, ColumnValue, CompiledQuery,
    Conjunction, Direction, JoinType, Limit, Operand, QueryOption, SubQuery,
};
pub use config::{default_config_path, load_config, Config, ConnectionConfig};
pub use crate::core::db::TransactionState;
pub use crate::core::{FluentError, Result, Value};
pub use database::Database;
pub use output::{MapEntry, Output, ReturnFormat, Row};
pub use trace::TraceEntry;
pub use transaction::Transaction;
