/// Database Facade
///
/// [`Database`] is what applications talk to. It owns a connection registry,
/// the clause state of the statement being built, and the diagnostics of the
/// last statement that ran.
///
/// Every executing method takes the accumulated [`QueryState`] out of the
/// builder before compiling, so the builder is empty again afterwards whether
/// the statement succeeded or failed.
use crate::builder::{
    compile_with_limit, ClauseBuilder, ColumnValue, CompiledQuery, Limit, OnDuplicate, QueryState,
    Statement, SubQuery,
};
use crate::config::{Config, ConnectionConfig, DEFAULT_PAGE_LIMIT};
use crate::core::db::{
    transaction, ConnectionRegistry, Execution, QueryExecutor, StatementType, TransactionState,
    DEFAULT_CONNECTION,
};
use crate::core::error::driver_code;
use crate::core::{FluentError, ParamBuffer, Result, Value};
use crate::output::{shape, Output, ReturnFormat, Row};
use crate::trace::{substitute_placeholders, TraceEntry, TraceLog};
use crate::transaction::Transaction;
use chrono::Local;
use rusqlite::Connection;
use std::panic::Location;
use tracing::{debug, warn};

/// Fluent builder and executor over a set of named SQLite connections.
///
/// ```
/// use fluentdb::{ClauseBuilder, Database, Direction, values};
///
/// let mut db = Database::open_in_memory()?;
/// db.raw_query("CREATE TABLE users (id INTEGER PRIMARY KEY, login TEXT)", &[])?;
/// db.insert("users", &values! { "login" => "admin" })?;
///
/// let login = db
///     .where_clause("id", 1)
///     .order_by("id", Direction::Desc)
///     .select_value("users", "login")?;
/// assert_eq!(login.and_then(|v| v.as_str().map(String::from)).as_deref(), Some("admin"));
/// # Ok::<(), fluentdb::FluentError>(())
/// ```
#[derive(Debug)]
pub struct Database {
    registry: ConnectionRegistry,
    state: QueryState,
    prefix: String,
    page_limit: u64,
    /// Connection the open transaction was started on
    transaction: Option<String>,
    trace: TraceLog,
    last_query: String,
    last_error: Option<String>,
    last_errno: i32,
    count: usize,
    last_insert_id: i64,
    total_count: u64,
    total_pages: u64,
}

impl Default for Database {
    fn default() -> Self {
        Self::new()
    }
}

impl ClauseBuilder for Database {
    fn state_mut(&mut self) -> &mut QueryState {
        &mut self.state
    }
}

impl Database {
    /// Creates a facade with no connections registered.
    pub fn new() -> Self {
        Database {
            registry: ConnectionRegistry::new(),
            state: QueryState::new(),
            prefix: String::new(),
            page_limit: DEFAULT_PAGE_LIMIT,
            transaction: None,
            trace: TraceLog::new(false),
            last_query: String::new(),
            last_error: None,
            last_errno: 0,
            count: 0,
            last_insert_id: 0,
            total_count: 0,
            total_pages: 0,
        }
    }

    /// A facade over a single in-memory database named `"default"`.
    pub fn open_in_memory() -> Result<Self> {
        Self::from_config(&Config {
            connections: vec![ConnectionConfig::memory(DEFAULT_CONNECTION)],
            ..Config::default()
        })
    }

    /// Opens every configured connection and applies the global settings.
    ///
    /// The `"default"` connection is selected when configured, otherwise the
    /// first one listed.
    pub fn from_config(config: &Config) -> Result<Self> {
        config.validate()?;
        let mut db = Database::new();
        db.prefix = config.prefix.clone();
        db.page_limit = config.page_limit;
        db.trace.set_enabled(config.trace);

        for connection in &config.connections {
            db.registry.open(connection)?;
        }
        if !db.registry.contains(DEFAULT_CONNECTION) {
            if let Some(first) = config.connections.first() {
                db.registry.set_current(&first.name)?;
            }
        }
        Ok(db)
    }

    // --- connections ---------------------------------------------------

    /// Registers an already opened SQLite handle under `name`.
    ///
    /// # Errors
    ///
    /// `FluentError::ConnectionAlreadyExists` if `name` is registered.
    pub fn add_connection(&mut self, name: &str, connection: Connection) -> Result<()> {
        self.registry.add(name, connection)
    }

    /// Opens and registers the described database.
    pub fn connect(&mut self, config: &ConnectionConfig) -> Result<()> {
        self.registry.open(config)
    }

    /// Makes `name` the connection every following statement runs on.
    ///
    /// # Errors
    ///
    /// `FluentError::ConnectionNotFound` if `name` was never registered.
    pub fn set_connection(&mut self, name: &str) -> Result<&mut Self> {
        self.registry.set_current(name)?;
        Ok(self)
    }

    pub fn connection_name(&self) -> &str {
        self.registry.current_name()
    }

    /// The current driver handle, for work the builder does not cover.
    pub fn connection(&self) -> Result<&Connection> {
        self.registry.current()
    }

    pub fn connection_names(&self) -> Vec<String> {
        self.registry.names()
    }

    pub fn disconnect(&mut self, name: &str) -> Result<()> {
        self.registry.disconnect(name)
    }

    pub fn disconnect_all(&mut self) -> Result<()> {
        self.registry.disconnect_all()
    }

    /// Checks that the current connection answers.
    pub fn ping(&self) -> Result<bool> {
        self.registry.ping()
    }

    // --- settings ------------------------------------------------------

    /// Table prefix applied to base tables and join targets.
    pub fn set_prefix(&mut self, prefix: &str) -> &mut Self {
        self.prefix = prefix.to_string();
        self
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Rows per page for [`Database::paginate`]. Zero is treated as one.
    pub fn set_page_limit(&mut self, page_limit: u64) -> &mut Self {
        self.page_limit = page_limit.max(1);
        self
    }

    pub fn page_limit(&self) -> u64 {
        self.page_limit
    }

    pub fn set_trace(&mut self, enabled: bool) -> &mut Self {
        self.trace.set_enabled(enabled);
        self
    }

    // --- statement modifiers -------------------------------------------

    /// Shapes the next result as a map keyed by `column`.
    pub fn map(&mut self, column: &str) -> &mut Self {
        self.state.map_key = Some(column.to_string());
        self
    }

    pub fn as_array(&mut self) -> &mut Self {
        self.state.format = ReturnFormat::Array;
        self
    }

    pub fn as_object(&mut self) -> &mut Self {
        self.state.format = ReturnFormat::Object;
        self
    }

    pub fn as_json(&mut self) -> &mut Self {
        self.state.format = ReturnFormat::Json;
        self
    }

    /// Adds an upsert tail to the next INSERT: rows conflicting on `target`
    /// overwrite `columns` instead of failing.
    pub fn on_duplicate(&mut self, target: &str, columns: &[&str]) -> &mut Self {
        self.state.on_duplicate = Some(OnDuplicate {
            target: target.to_string(),
            columns: columns.iter().map(|c| c.to_string()).collect(),
        });
        self
    }

    /// Makes the next SELECT also count every row matching it without its
    /// LIMIT; read the result from [`Database::total_count`].
    pub fn with_total_count(&mut self) -> &mut Self {
        self.state.with_total_count = true;
        self
    }

    /// A sub-query builder sharing this database's table prefix.
    pub fn sub_query(&self, alias: Option<&str>) -> SubQuery {
        SubQuery::new(alias).with_prefix(&self.prefix)
    }

    /// The clause state accumulated so far for the next statement.
    pub fn pending(&self) -> &QueryState {
        &self.state
    }

    // --- SELECT --------------------------------------------------------

    /// Runs `SELECT <columns> FROM <table>` with the accumulated clauses.
    /// An empty column list selects `*`.
    ///
    /// # Arguments
    ///
    /// * `table` - Table name, without prefix; may carry an alias (`"users u"`)
    /// * `columns` - Column expressions, emitted verbatim
    ///
    /// # Returns
    ///
    /// The rows in the shape chosen with `as_array`/`as_object`/`as_json`/`map`.
    #[track_caller]
    pub fn select(&mut self, table: &str, columns: &[&str]) -> Result<Output> {
        let location = Location::caller();
        let (rows, state) = self.select_rows(table, columns, None, location)?;
        self.shape(rows, &state)
    }

    /// First matching row, if any.
    #[track_caller]
    pub fn select_one(&mut self, table: &str, columns: &[&str]) -> Result<Option<Row>> {
        let location = Location::caller();
        let (rows, _) = self.select_rows(table, columns, Some(Limit::Count(1)), location)?;
        Ok(rows.into_iter().next())
    }

    /// Value of `column` in the first matching row.
    #[track_caller]
    pub fn select_value(&mut self, table: &str, column: &str) -> Result<Option<Value>> {
        let location = Location::caller();
        let expr = format!("{column} AS retval");
        let (rows, _) = self.select_rows(table, &[&expr], Some(Limit::Count(1)), location)?;
        Ok(first_value(rows))
    }

    /// Value of `column` in every matching row, honoring `limit`.
    #[track_caller]
    pub fn select_values(&mut self, table: &str, column: &str) -> Result<Vec<Value>> {
        let location = Location::caller();
        let expr = format!("{column} AS retval");
        let (rows, _) = self.select_rows(table, &[&expr], None, location)?;
        Ok(column_values(rows))
    }

    /// True when at least one row matches the accumulated conditions.
    #[track_caller]
    pub fn has(&mut self, table: &str) -> Result<bool> {
        let location = Location::caller();
        let (rows, _) = self.select_rows(table, &["1"], Some(Limit::Count(1)), location)?;
        Ok(!rows.is_empty())
    }

    /// One page of `table`, pages numbered from 1.
    ///
    /// Also records [`Database::total_count`] and [`Database::total_pages`].
    #[track_caller]
    pub fn paginate(&mut self, table: &str, page: u64, columns: &[&str]) -> Result<Output> {
        let location = Location::caller();
        let page = page.max(1);
        // SQLite reads LIMIT/OFFSET as signed 64-bit integers
        let offset = (page - 1)
            .checked_mul(self.page_limit)
            .filter(|offset| i64::try_from(*offset).is_ok());
        let Some(offset) = offset else {
            self.state = QueryState::default();
            return Err(self.fail(FluentError::InvalidOperand {
                operator: "LIMIT".to_string(),
                reason: format!("page {page} is out of range for {} rows per page", self.page_limit),
            }));
        };
        self.state.with_total_count = true;
        let limit = Limit::range(offset, self.page_limit);

        let (rows, state) = self.select_rows(table, columns, Some(limit), location)?;
        self.total_pages = self.total_count.div_ceil(self.page_limit);
        self.shape(rows, &state)
    }

    // --- INSERT / REPLACE / UPDATE / DELETE ----------------------------

    /// Inserts one row.
    ///
    /// # Returns
    ///
    /// The rowid of the inserted row. An ignored insert (`QueryOption::Ignore`)
    /// leaves the previous id in place; check [`Database::count`].
    #[track_caller]
    pub fn insert(&mut self, table: &str, data: &[(String, ColumnValue)]) -> Result<i64> {
        let location = Location::caller();
        self.write_row(table, data, false, location)
    }

    /// `REPLACE INTO`: inserts, deleting any row that conflicts first.
    #[track_caller]
    pub fn replace(&mut self, table: &str, data: &[(String, ColumnValue)]) -> Result<i64> {
        let location = Location::caller();
        self.write_row(table, data, true, location)
    }

    /// Inserts every row with the same clause state.
    ///
    /// Outside a transaction the batch runs in one of its own, so either all
    /// rows land or none do. Inside a caller's transaction the caller decides.
    #[track_caller]
    pub fn insert_multi(
        &mut self,
        table: &str,
        rows: &[Vec<(String, ColumnValue)>],
    ) -> Result<Vec<i64>> {
        let location = Location::caller();
        let state = std::mem::take(&mut self.state);
        let owns_transaction = self.transaction.is_none();
        if owns_transaction {
            self.begin_transaction()?;
        }

        let mut ids = Vec::with_capacity(rows.len());
        for data in rows {
            let statement = Statement::Insert {
                table,
                data,
                replace: false,
            };
            let inserted = self
                .compile_statement(&state, statement, state.limit)
                .and_then(|query| self.execute_compiled(&query, &state, location));
            match inserted {
                Ok(execution) => ids.push(execution.last_insert_id),
                Err(e) => {
                    if owns_transaction {
                        if let Err(rollback) = self.end_transaction(false) {
                            warn!(error = %rollback, "rollback of failed batch insert failed");
                        }
                    }
                    return Err(e);
                }
            }
        }

        if owns_transaction {
            self.end_transaction(true)?;
        }
        self.count = ids.len();
        Ok(ids)
    }

    /// Updates matching rows; returns the number of rows changed.
    #[track_caller]
    pub fn update(&mut self, table: &str, data: &[(String, ColumnValue)]) -> Result<usize> {
        let location = Location::caller();
        let state = std::mem::take(&mut self.state);
        let query = self.compile_statement(&state, Statement::Update { table, data }, state.limit)?;
        Ok(self.execute_compiled(&query, &state, location)?.count)
    }

    /// Deletes matching rows; returns the number of rows removed.
    #[track_caller]
    pub fn delete(&mut self, table: &str) -> Result<usize> {
        let location = Location::caller();
        let state = std::mem::take(&mut self.state);
        let query = self.compile_statement(&state, Statement::Delete { table }, state.limit)?;
        Ok(self.execute_compiled(&query, &state, location)?.count)
    }

    // --- raw SQL -------------------------------------------------------

    /// Runs caller-written SQL with positional `?` parameters. Output
    /// modifiers (`map`, `as_json`, ...) apply; accumulated clauses do not.
    #[track_caller]
    pub fn raw_query(&mut self, sql: &str, params: &[Value]) -> Result<Output> {
        let location = Location::caller();
        let (rows, state) = self.raw_rows(sql, params, location)?;
        self.shape(rows, &state)
    }

    #[track_caller]
    pub fn raw_query_one(&mut self, sql: &str, params: &[Value]) -> Result<Option<Row>> {
        let location = Location::caller();
        let (rows, _) = self.raw_rows(sql, params, location)?;
        Ok(rows.into_iter().next())
    }

    /// First column of the first row.
    #[track_caller]
    pub fn raw_query_value(&mut self, sql: &str, params: &[Value]) -> Result<Option<Value>> {
        let location = Location::caller();
        let (rows, _) = self.raw_rows(sql, params, location)?;
        Ok(first_value(rows))
    }

    /// First column of every row.
    #[track_caller]
    pub fn raw_query_values(&mut self, sql: &str, params: &[Value]) -> Result<Vec<Value>> {
        let location = Location::caller();
        let (rows, _) = self.raw_rows(sql, params, location)?;
        Ok(column_values(rows))
    }

    // --- transactions --------------------------------------------------

    /// Starts a transaction on the current connection.
    ///
    /// The returned guard dereferences to this database. It rolls back when
    /// dropped, including during a panic, unless committed.
    ///
    /// # Errors
    ///
    /// - `FluentError::NestedTransaction` if a transaction is already open
    /// - `FluentError::TransactionStart` if the driver refuses `BEGIN`
    pub fn start_transaction(&mut self) -> Result<Transaction<'_>> {
        self.begin_transaction()?;
        Ok(Transaction::new(self))
    }

    pub fn transaction_state(&self) -> TransactionState {
        if self.transaction.is_some() {
            TransactionState::Active
        } else {
            TransactionState::Autocommit
        }
    }

    pub(crate) fn begin_transaction(&mut self) -> Result<()> {
        if self.transaction.is_some() {
            return Err(self.fail(FluentError::NestedTransaction));
        }
        let started = self.registry.current().and_then(transaction::begin);
        started.map_err(|e| self.fail(e))?;
        self.transaction = Some(self.registry.current_name().to_string());
        Ok(())
    }

    /// Commits or rolls back the open transaction. The transaction is over
    /// afterwards even if the driver reported an error.
    pub(crate) fn end_transaction(&mut self, commit: bool) -> Result<()> {
        let Some(name) = self.transaction.take() else {
            return Ok(());
        };
        let ended = self.registry.get(&name).and_then(|connection| {
            if commit {
                transaction::commit(connection)
            } else {
                transaction::rollback(connection)
            }
        });
        ended.map_err(|e| self.fail(e))
    }

    // --- diagnostics ---------------------------------------------------

    /// The last statement with its parameters substituted as literals.
    pub fn last_query(&self) -> &str {
        &self.last_query
    }

    /// Message of the last failure, cleared by the next successful statement.
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// SQLite extended result code of the last failure; 0 after success,
    /// -1 for failures that did not come from SQLite.
    pub fn last_errno(&self) -> i32 {
        self.last_errno
    }

    /// Rows returned by the last query, or rows affected by the last mutation.
    pub fn count(&self) -> usize {
        self.count
    }

    pub fn last_insert_id(&self) -> i64 {
        self.last_insert_id
    }

    /// Rows matching the last counted SELECT, ignoring its LIMIT.
    pub fn total_count(&self) -> u64 {
        self.total_count
    }

    pub fn total_pages(&self) -> u64 {
        self.total_pages
    }

    pub fn trace(&self) -> &[TraceEntry] {
        self.trace.entries()
    }

    // --- internals -----------------------------------------------------

    fn select_rows(
        &mut self,
        table: &str,
        columns: &[&str],
        limit: Option<Limit>,
        location: &Location<'_>,
    ) -> Result<(Vec<Row>, QueryState)> {
        let state = std::mem::take(&mut self.state);
        let statement = Statement::Select { table, columns };
        let query = self.compile_statement(&state, statement, limit.or(state.limit))?;
        let execution = self.execute_compiled(&query, &state, location)?;

        if state.with_total_count {
            let unlimited = self.compile_statement(&state, statement, None)?;
            self.total_count = self.count_rows(&unlimited)?;
        }
        Ok((execution.rows, state))
    }

    fn write_row(
        &mut self,
        table: &str,
        data: &[(String, ColumnValue)],
        replace: bool,
        location: &Location<'_>,
    ) -> Result<i64> {
        let state = std::mem::take(&mut self.state);
        let statement = Statement::Insert {
            table,
            data,
            replace,
        };
        let query = self.compile_statement(&state, statement, state.limit)?;
        self.execute_compiled(&query, &state, location)?;
        Ok(self.last_insert_id)
    }

    fn raw_rows(
        &mut self,
        sql: &str,
        params: &[Value],
        location: &Location<'_>,
    ) -> Result<(Vec<Row>, QueryState)> {
        let state = std::mem::take(&mut self.state);
        let mut buffer = ParamBuffer::new();
        buffer.bind_all(params.iter().cloned());
        let query = CompiledQuery {
            sql: sql.to_string(),
            params: buffer,
            alias: None,
        };
        let execution = self.execute_compiled(&query, &state, location)?;
        Ok((execution.rows, state))
    }

    fn compile_statement(
        &mut self,
        state: &QueryState,
        statement: Statement<'_>,
        limit: Option<Limit>,
    ) -> Result<CompiledQuery> {
        compile_with_limit(state, statement, &self.prefix, limit).map_err(|e| self.fail(e))
    }

    fn execute_compiled(
        &mut self,
        query: &CompiledQuery,
        state: &QueryState,
        location: &Location<'_>,
    ) -> Result<Execution> {
        let started_at = Local::now();
        self.last_query = substitute_placeholders(&query.sql, &query.params);

        let executed = self
            .registry
            .current()
            .and_then(|connection| QueryExecutor::new(connection).execute(&query.sql, &query.params));
        let execution = executed.map_err(|e| self.fail(e))?;

        self.count = execution.count;
        if matches!(execution.kind, StatementType::Insert | StatementType::Replace) {
            self.last_insert_id = execution.last_insert_id;
        }
        self.last_error = None;
        self.last_errno = 0;

        if self.trace.is_enabled() {
            self.trace.record(TraceEntry {
                sql: self.last_query.clone(),
                clauses: state.clauses(),
                elapsed: execution.elapsed,
                location: location.to_string(),
                started_at,
            });
        }
        Ok(execution)
    }

    /// `SELECT COUNT(*)` over an already compiled query.
    fn count_rows(&mut self, query: &CompiledQuery) -> Result<u64> {
        let sql = format!("SELECT COUNT(*) FROM ({})", query.sql);
        let executed = self
            .registry
            .current()
            .and_then(|connection| QueryExecutor::new(connection).execute(&sql, &query.params));
        let execution = executed.map_err(|e| self.fail(e))?;
        let total = first_value(execution.rows)
            .and_then(|v| v.as_i64())
            .unwrap_or(0);
        Ok(total.max(0) as u64)
    }

    fn shape(&mut self, rows: Vec<Row>, state: &QueryState) -> Result<Output> {
        shape(rows, state.format, state.map_key.as_deref()).map_err(|e| self.fail(e))
    }

    /// Records a failure for `last_error`/`last_errno` and hands it back.
    fn fail(&mut self, error: FluentError) -> FluentError {
        self.last_errno = match &error {
            FluentError::Prepare { code, .. } => *code,
            FluentError::Database(e) => driver_code(e),
            _ => -1,
        };
        self.last_error = Some(error.to_string());
        debug!(error = %error, "statement failed");
        error
    }
}

fn first_value(rows: Vec<Row>) -> Option<Value> {
    rows.into_iter()
        .next()
        .and_then(|row| row.into_values().into_iter().next())
}

fn column_values(rows: Vec<Row>) -> Vec<Value> {
    rows.into_iter()
        .filter_map(|row| row.into_values().into_iter().next())
        .collect()
}
