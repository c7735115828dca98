/// Builder Module
///
/// Clause accumulation and SQL compilation:
/// - **Clauses** (`clause.rs`): conditions, joins, ordering, limits
/// - **State** (`state.rs`): the per-statement accumulator and the fluent `ClauseBuilder` trait
/// - **Directives** (`directive.rs`): INSERT/UPDATE column values
/// - **Compiler** (`compiler.rs`): statement text and aligned parameters
/// - **Sub-queries** (`subquery.rs`): compiled, non-executed nested SELECTs
pub mod clause;
pub mod compiler;
pub mod directive;
pub mod state;
pub mod subquery;

pub use clause::*;
pub use compiler::{compile, compile_with_limit, quote_column, render_limit, SqlWriter, Statement};
pub use directive::{dec, func, inc, interval, not, now, values_from_json, ColumnValue};
pub use state::{ClauseBuilder, OnDuplicate, QueryState};
pub use subquery::{count_placeholders, CompiledQuery, SubQuery};
