/// Query Execution Module
///
/// Prepares a compiled statement, binds its positional parameters, executes it
/// and reads the row cursor back into [`Row`]s.
///
/// Row metadata is read once per statement. Statements that produce no
/// result columns degrade to an empty row set, with the affected-row count
/// reported by the driver.
use crate::core::{FluentError, ParamBuffer, Result, Value};
use crate::output::Row;
use rusqlite::Connection;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error};

/// Broad statement classification, used for logging and row-count semantics.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StatementType {
    Select,
    Insert,
    Replace,
    Update,
    Delete,
    /// BEGIN/COMMIT/ROLLBACK
    Transaction,
    Other,
}

impl StatementType {
    /// Determines the statement type from the leading keyword.
    pub fn from_sql(sql: &str) -> Self {
        let sql_upper = sql.trim_start().to_uppercase();

        if sql_upper.starts_with("SELECT") || sql_upper.starts_with("WITH") {
            StatementType::Select
        } else if sql_upper.starts_with("INSERT") {
            StatementType::Insert
        } else if sql_upper.starts_with("REPLACE") {
            StatementType::Replace
        } else if sql_upper.starts_with("UPDATE") {
            StatementType::Update
        } else if sql_upper.starts_with("DELETE") {
            StatementType::Delete
        } else if sql_upper.starts_with("BEGIN")
            || sql_upper.starts_with("COMMIT")
            || sql_upper.starts_with("END")
            || sql_upper.starts_with("ROLLBACK")
        {
            StatementType::Transaction
        } else {
            StatementType::Other
        }
    }
}

/// Everything a single execution produced.
#[derive(Debug)]
pub struct Execution {
    pub kind: StatementType,
    pub columns: Arc<[String]>,
    pub rows: Vec<Row>,
    /// Rows returned for queries, rows affected for mutations
    pub count: usize,
    pub last_insert_id: i64,
    pub elapsed: Duration,
}

/// Query execution service that operates on one connection
pub struct QueryExecutor<'a> {
    connection: &'a Connection,
}

impl<'a> QueryExecutor<'a> {
    pub fn new(connection: &'a Connection) -> Self {
        QueryExecutor { connection }
    }

    /// Executes `sql` with `params` bound positionally.
    ///
    /// # Errors
    ///
    /// - `FluentError::Prepare` if the driver rejects the text
    /// - `FluentError::BindMismatch` if the placeholder and parameter counts differ
    /// - `FluentError::Database` for failures while stepping the statement
    pub fn execute(&self, sql: &str, params: &ParamBuffer) -> Result<Execution> {
        let kind = StatementType::from_sql(sql);
        let started = Instant::now();

        let mut stmt = self.connection.prepare(sql).map_err(|e| {
            error!(sql, error = %e, "prepare failed");
            FluentError::prepare(&e)
        })?;

        if stmt.parameter_count() != params.len() {
            return Err(FluentError::BindMismatch {
                placeholders: stmt.parameter_count(),
                params: params.len(),
            });
        }
        for (i, param) in params.iter().enumerate() {
            stmt.raw_bind_parameter(i + 1, &param.value)?;
        }

        let columns: Arc<[String]> = stmt.column_names().into_iter().map(String::from).collect();
        let column_count = columns.len();

        let (rows, count) = if column_count == 0 {
            let affected = stmt.raw_execute()?;
            (Vec::new(), affected)
        } else {
            let mut rows = Vec::new();
            let mut cursor = stmt.raw_query();
            while let Some(row) = cursor.next()? {
                let mut values = Vec::with_capacity(column_count);
                for i in 0..column_count {
                    values.push(Value::from_ref(row.get_ref(i)?));
                }
                rows.push(Row::new(columns.clone(), values));
            }
            let count = rows.len();
            (rows, count)
        };

        let elapsed = started.elapsed();
        debug!(?kind, count, elapsed_us = elapsed.as_micros() as u64, "statement executed");

        Ok(Execution {
            kind,
            columns,
            rows,
            count,
            last_insert_id: self.connection.last_insert_rowid(),
            elapsed,
        })
    }
}
