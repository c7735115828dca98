/// Sub-queries
///
/// A [`SubQuery`] accumulates clauses like any builder but never executes:
/// `select` compiles it into a [`CompiledQuery`] that can be embedded as a
/// WHERE/IN/EXISTS operand, a JOIN target or an INSERT/UPDATE value.
use crate::builder::compiler::{compile, Statement};
use crate::builder::state::{ClauseBuilder, QueryState};
use crate::core::{ParamBuffer, Result};

/// Compiled statement text with its parameters, optionally aliased.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledQuery {
    pub sql: String,
    pub params: ParamBuffer,
    pub alias: Option<String>,
}

impl CompiledQuery {
    /// Number of `?` placeholders in the text, ignoring quoted literals.
    pub fn placeholder_count(&self) -> usize {
        count_placeholders(&self.sql)
    }
}

/// Counts `?` outside single-quoted literals.
pub fn count_placeholders(sql: &str) -> usize {
    let mut in_literal = false;
    let mut count = 0;
    for c in sql.chars() {
        match c {
            '\'' => in_literal = !in_literal,
            '?' if !in_literal => count += 1,
            _ => {}
        }
    }
    count
}

#[derive(Debug, Default)]
pub struct SubQuery {
    alias: Option<String>,
    prefix: String,
    state: QueryState,
}

impl SubQuery {
    /// Creates a sub-query; the alias is emitted after the parenthesized text
    /// when it is used as a JOIN target or comparison operand.
    pub fn new(alias: Option<&str>) -> Self {
        SubQuery {
            alias: alias.map(str::to_string),
            prefix: String::new(),
            state: QueryState::new(),
        }
    }

    pub(crate) fn with_prefix(mut self, prefix: &str) -> Self {
        self.prefix = prefix.to_string();
        self
    }

    /// Compiles `SELECT <columns> FROM <table> ...` without executing it.
    pub fn select(&mut self, table: &str, columns: &[&str]) -> Result<CompiledQuery> {
        let state = std::mem::take(&mut self.state);
        let mut compiled = compile(&state, Statement::Select { table, columns }, &self.prefix)?;
        compiled.alias = self.alias.clone();
        Ok(compiled)
    }
}

impl ClauseBuilder for SubQuery {
    fn state_mut(&mut self) -> &mut QueryState {
        &mut self.state
    }
}
