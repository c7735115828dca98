/// Statement Trace Log
///
/// When tracing is enabled every executed statement leaves a [`TraceEntry`]
/// behind: the SQL with its literals substituted, the clause snapshot it was
/// compiled from, how long it ran and where in the caller's code it came from.
use crate::builder::{count_placeholders, Clause};
use crate::core::ParamBuffer;
use chrono::{DateTime, Local};
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct TraceEntry {
    /// Statement text with each placeholder replaced by its literal
    pub sql: String,
    pub clauses: Vec<Clause>,
    pub elapsed: Duration,
    /// `file:line:column` of the facade call
    pub location: String,
    pub started_at: DateTime<Local>,
}

/// Append-only trace log, alive as long as the owning `Database`.
#[derive(Debug, Default)]
pub struct TraceLog {
    enabled: bool,
    entries: Vec<TraceEntry>,
}

impl TraceLog {
    pub fn new(enabled: bool) -> Self {
        TraceLog {
            enabled,
            entries: Vec::new(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    /// Records the entry if tracing is on.
    pub fn record(&mut self, entry: TraceEntry) {
        if self.enabled {
            self.entries.push(entry);
        }
    }

    pub fn entries(&self) -> &[TraceEntry] {
        &self.entries
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

/// Replaces each `?` outside quoted literals with the inline rendering of the
/// matching parameter. Placeholders without a parameter are left as they are.
pub fn substitute_placeholders(sql: &str, params: &ParamBuffer) -> String {
    if params.is_empty() || count_placeholders(sql) == 0 {
        return sql.to_string();
    }

    let mut values = params.iter().map(|p| p.value.to_sql_inline());
    let mut out = String::with_capacity(sql.len() + params.len() * 4);
    let mut in_literal = false;
    for c in sql.chars() {
        match c {
            '\'' => {
                in_literal = !in_literal;
                out.push(c);
            }
            '?' if !in_literal => match values.next() {
                Some(literal) => out.push_str(&literal),
                None => out.push(c),
            },
            _ => out.push(c),
        }
    }
    out
}
