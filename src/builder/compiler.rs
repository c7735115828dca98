/// SQL Compiler
///
/// Single-pass assembly of SELECT/INSERT/REPLACE/UPDATE/DELETE text from a
/// table name and an accumulated [`QueryState`]. Sections are always emitted
/// in the same order:
///
/// base statement → JOIN → column values → WHERE → GROUP BY → HAVING →
/// ORDER BY → LIMIT → upsert tail
///
/// Placeholders and parameters are produced together by [`SqlWriter::bind`],
/// so the text and the parameter buffer cannot drift apart.
use crate::builder::clause::{Condition, Join, JoinTarget, Limit, Operand, OrderBy, QueryOption};
use crate::builder::directive::ColumnValue;
use crate::builder::state::QueryState;
use crate::builder::subquery::CompiledQuery;
use crate::core::{FluentError, ParamBuffer, Result, Value};
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

static ORDER_FIELD_FILTER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"[^ \-a-zA-Z0-9.(),_`*'"]+"#).unwrap());
static GROUP_FIELD_FILTER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^\-a-zA-Z0-9.(),_* <>=!]+").unwrap());
static QUALIFIED_FIELD: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(`)([`a-zA-Z0-9_]*\.)").unwrap());

/// The statement to compile, minus the clauses held in [`QueryState`].
#[derive(Debug, Clone, Copy)]
pub enum Statement<'a> {
    Select {
        table: &'a str,
        columns: &'a [&'a str],
    },
    Insert {
        table: &'a str,
        data: &'a [(String, ColumnValue)],
        replace: bool,
    },
    Update {
        table: &'a str,
        data: &'a [(String, ColumnValue)],
    },
    Delete {
        table: &'a str,
    },
}

/// Statement text under construction plus its parameter buffer.
#[derive(Debug, Default)]
pub struct SqlWriter {
    sql: String,
    params: ParamBuffer,
}

impl SqlWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, sql: &str) -> &mut Self {
        self.sql.push_str(sql);
        self
    }

    /// Writes one placeholder and binds its value.
    pub fn bind(&mut self, value: Value) -> &mut Self {
        self.sql.push('?');
        self.params.bind(value);
        self
    }

    /// Writes `?, ?, ...` for every value.
    pub fn bind_list(&mut self, values: &[Value]) -> &mut Self {
        for (i, value) in values.iter().enumerate() {
            if i > 0 {
                self.sql.push_str(", ");
            }
            self.bind(value.clone());
        }
        self
    }

    /// Binds values whose placeholders are already part of caller-supplied text.
    pub fn bind_silent(&mut self, values: &[Value]) -> &mut Self {
        self.params.bind_all(values.iter().cloned());
        self
    }

    /// Writes `(<sub-query sql>)` and adopts its parameters.
    pub fn embed(&mut self, query: &CompiledQuery) -> &mut Self {
        self.sql.push('(');
        self.sql.push_str(&query.sql);
        self.sql.push(')');
        self.params.bind_all(query.params.values());
        self
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }

    pub fn finish(self, alias: Option<String>) -> CompiledQuery {
        CompiledQuery {
            sql: self.sql,
            params: self.params,
            alias,
        }
    }
}

/// Compiles a statement against the accumulated state.
pub fn compile(state: &QueryState, statement: Statement<'_>, prefix: &str) -> Result<CompiledQuery> {
    compile_with_limit(state, statement, prefix, state.limit)
}

/// Like [`compile`], with an explicit limit overriding the state's.
pub fn compile_with_limit(
    state: &QueryState,
    statement: Statement<'_>,
    prefix: &str,
    limit: Option<Limit>,
) -> Result<CompiledQuery> {
    let mut w = SqlWriter::new();

    match statement {
        Statement::Select { table, columns } => {
            w.push("SELECT ");
            if state.has_option(QueryOption::Distinct) {
                w.push("DISTINCT ");
            } else if state.has_option(QueryOption::All) {
                w.push("ALL ");
            }
            if columns.is_empty() {
                w.push("*");
            } else {
                w.push(&columns.join(", "));
            }
            w.push(" FROM ").push(&prefixed(prefix, table));
            build_joins(&mut w, state, prefix)?;
        }
        Statement::Insert { table, data, replace } => {
            if replace {
                w.push("REPLACE INTO ");
            } else if state.has_option(QueryOption::Ignore) {
                w.push("INSERT OR IGNORE INTO ");
            } else {
                w.push("INSERT INTO ");
            }
            w.push(&prefixed(prefix, table));
            build_joins(&mut w, state, prefix)?;
            build_insert_values(&mut w, data)?;
        }
        Statement::Update { table, data } => {
            w.push("UPDATE ").push(&prefixed(prefix, table));
            build_joins(&mut w, state, prefix)?;
            build_update_set(&mut w, data)?;
        }
        Statement::Delete { table } => {
            w.push("DELETE FROM ").push(&prefixed(prefix, table));
            build_joins(&mut w, state, prefix)?;
        }
    }

    build_conditions(&mut w, "WHERE", &state.wheres)?;
    build_group_by(&mut w, &state.group_by);
    build_conditions(&mut w, "HAVING", &state.havings)?;
    build_order_by(&mut w, &state.order_by, prefix);
    if let Some(limit) = limit {
        w.push(&render_limit(limit));
    }
    if let (Statement::Insert { .. }, Some(upsert)) = (statement, &state.on_duplicate) {
        w.push(" ON CONFLICT (").push(&upsert.target).push(") DO UPDATE SET ");
        let sets: Vec<String> = upsert
            .columns
            .iter()
            .map(|c| format!("{} = excluded.{}", quote_column(c), quote_column(c)))
            .collect();
        w.push(&sets.join(", "));
    }

    debug!(sql = w.sql(), params = w.params.len(), "compiled statement");
    Ok(w.finish(None))
}

/// ` LIMIT n` or ` LIMIT offset, n`.
pub fn render_limit(limit: Limit) -> String {
    match limit {
        Limit::Count(count) => format!(" LIMIT {count}"),
        Limit::Range { offset, count } => format!(" LIMIT {offset}, {count}"),
    }
}

fn prefixed(prefix: &str, table: &str) -> String {
    format!("{prefix}{}", table.trim())
}

/// Quotes each `.`-separated segment of a column name.
pub fn quote_column(column: &str) -> String {
    column
        .split('.')
        .map(|segment| format!("`{}`", segment.trim_matches('`')))
        .collect::<Vec<_>>()
        .join(".")
}

fn build_joins(w: &mut SqlWriter, state: &QueryState, prefix: &str) -> Result<()> {
    for Join {
        join_type,
        target,
        condition,
    } in &state.joins
    {
        w.push(" ").push(join_type.as_sql()).push(" JOIN ");
        match target {
            JoinTarget::Table(table) => {
                w.push(&prefixed(prefix, table));
            }
            JoinTarget::SubQuery(query) => {
                w.embed(query);
                if let Some(alias) = &query.alias {
                    w.push(" ").push(alias);
                }
            }
        }
        if !condition.is_empty() {
            if condition.to_lowercase().contains("using") {
                w.push(" ");
            } else {
                w.push(" ON ");
            }
            w.push(condition);
        }
        if let Some(extra) = state.join_conditions.get(target.key()) {
            for cond in extra {
                build_condition(w, cond)?;
            }
        }
    }
    Ok(())
}

fn build_insert_values(w: &mut SqlWriter, data: &[(String, ColumnValue)]) -> Result<()> {
    let columns: Vec<String> = data.iter().map(|(c, _)| quote_column(c)).collect();
    w.push(" (").push(&columns.join(", ")).push(") VALUES (");
    for (i, (column, value)) in data.iter().enumerate() {
        if i > 0 {
            w.push(", ");
        }
        build_column_value(w, column, value)?;
    }
    w.push(")");
    Ok(())
}

fn build_update_set(w: &mut SqlWriter, data: &[(String, ColumnValue)]) -> Result<()> {
    w.push(" SET ");
    for (i, (column, value)) in data.iter().enumerate() {
        if i > 0 {
            w.push(", ");
        }
        w.push(&quote_column(column)).push(" = ");
        build_column_value(w, column, value)?;
    }
    Ok(())
}

fn build_column_value(w: &mut SqlWriter, column: &str, value: &ColumnValue) -> Result<()> {
    match value {
        ColumnValue::Placeholder(v) => {
            w.bind(v.clone());
        }
        ColumnValue::Increment(expr) => {
            w.push(column).push(expr);
        }
        ColumnValue::RawExpr { sql, params } => {
            w.push(sql).bind_silent(params);
        }
        ColumnValue::Negate(None) => {
            w.push("NOT ").push(column);
        }
        ColumnValue::Negate(Some(expr)) => {
            w.push("NOT ").push(expr);
        }
        ColumnValue::SubQuery(query) => {
            w.embed(query);
        }
    }
    Ok(())
}

fn build_conditions(w: &mut SqlWriter, keyword: &str, conditions: &[Condition]) -> Result<()> {
    if conditions.is_empty() {
        return Ok(());
    }
    w.push(" ").push(keyword);
    for cond in conditions {
        build_condition(w, cond)?;
    }
    Ok(())
}

/// Renders ` <conjunction> <field> <operator fragment>`.
fn build_condition(w: &mut SqlWriter, cond: &Condition) -> Result<()> {
    if let Some(conjunction) = cond.conjunction {
        w.push(" ").push(conjunction.as_sql());
    }
    if !cond.field.is_empty() {
        w.push(" ").push(&cond.field);
    }

    let operator = cond.operator.trim();
    let keyword = operator.to_uppercase();
    match keyword.as_str() {
        "IN" | "NOT IN" => {
            w.push(" ").push(&keyword).push(" ");
            match &cond.operand {
                Operand::SubQuery(query) => {
                    w.embed(query);
                }
                Operand::List(values) => {
                    w.push("(").bind_list(values).push(")");
                }
                Operand::Value(value) => {
                    w.push("(").bind(value.clone()).push(")");
                }
                other => return Err(invalid(&keyword, "expects a list or sub-query", other)),
            }
        }
        "BETWEEN" | "NOT BETWEEN" => {
            let (low, high) = match &cond.operand {
                Operand::Range(low, high) => (low, high),
                Operand::List(values) if values.len() == 2 => (&values[0], &values[1]),
                other => return Err(invalid(&keyword, "expects exactly two values", other)),
            };
            w.push(" ").push(&keyword).push(" ");
            w.bind(low.clone()).push(" AND ").bind(high.clone());
        }
        "EXISTS" | "NOT EXISTS" => match &cond.operand {
            Operand::SubQuery(query) => {
                w.push(" ").push(&keyword).push(" ");
                w.embed(query);
            }
            other => return Err(invalid(&keyword, "expects a sub-query", other)),
        },
        _ => match &cond.operand {
            Operand::Omitted => {}
            Operand::List(values) => {
                w.bind_silent(values);
            }
            Operand::Null => {
                w.push(" ").push(operator).push(" NULL");
            }
            Operand::Value(value) => {
                w.push(" ").push(operator).push(" ").bind(value.clone());
            }
            Operand::SubQuery(query) => {
                w.push(" ").push(operator).push(" ").embed(query);
                if let Some(alias) = &query.alias {
                    w.push(" ").push(alias);
                }
            }
            Operand::Range(..) => {
                return Err(invalid(operator, "a range needs BETWEEN", &cond.operand));
            }
        },
    }
    Ok(())
}

fn invalid(operator: &str, reason: &str, operand: &Operand) -> FluentError {
    FluentError::InvalidOperand {
        operator: operator.to_string(),
        reason: format!("{reason}, got {operand:?}"),
    }
}

fn build_group_by(w: &mut SqlWriter, fields: &[String]) {
    if fields.is_empty() {
        return;
    }
    let fields: Vec<String> = fields
        .iter()
        .map(|f| GROUP_FIELD_FILTER.replace_all(f, "").into_owned())
        .collect();
    w.push(" GROUP BY ").push(&fields.join(", "));
}

/// True for `rand()` / `random()` however it is spaced or cased.
pub fn is_random_ordering(field: &str) -> bool {
    let normalized: String = field
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect::<String>()
        .to_lowercase();
    normalized == "rand()" || normalized == "random()"
}

fn build_order_by(w: &mut SqlWriter, orders: &[OrderBy], prefix: &str) {
    if orders.is_empty() {
        return;
    }
    w.push(" ORDER BY ");
    for (i, order) in orders.iter().enumerate() {
        if i > 0 {
            w.push(", ");
        }
        let field = ORDER_FIELD_FILTER.replace_all(order.field.trim(), "");
        let field = QUALIFIED_FIELD.replace_all(&field, format!("${{1}}{prefix}${{2}}").as_str());

        if is_random_ordering(&field) {
            w.push(&field);
            continue;
        }
        if order.custom.is_empty() {
            w.push(&field);
        } else {
            // CASE field WHEN ? THEN 0 WHEN ? THEN 1 ... ELSE n END
            w.push("CASE ").push(&field);
            for (rank, value) in order.custom.iter().enumerate() {
                w.push(" WHEN ").bind(value.clone()).push(&format!(" THEN {rank}"));
            }
            w.push(&format!(" ELSE {} END", order.custom.len()));
        }
        w.push(" ").push(order.direction.as_sql());
    }
}
