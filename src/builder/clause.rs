/// Clause Types
///
/// The structured fragments accumulated by a builder before compilation:
/// WHERE/HAVING conditions, joins, ordering, grouping and limits.
use crate::builder::subquery::CompiledQuery;
use crate::core::{FluentError, Result, Value};
use std::fmt;
use std::str::FromStr;

/// Logical connective placed before every condition except the first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Conjunction {
    And,
    Or,
}

impl Conjunction {
    pub fn as_sql(self) -> &'static str {
        match self {
            Conjunction::And => "AND",
            Conjunction::Or => "OR",
        }
    }
}

/// The right-hand side of a condition.
///
/// `Omitted` and `Null` are deliberately distinct: `Omitted` renders the
/// field text alone (raw boolean tests, pre-built expressions), while `Null`
/// renders `<operator> NULL`.
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    /// No right-hand side at all
    Omitted,
    /// Literal NULL, rendered inline
    Null,
    /// A single bound value
    Value(Value),
    /// A sequence of bound values (IN lists, legacy multi-bind expressions)
    List(Vec<Value>),
    /// Two bound values (BETWEEN)
    Range(Value, Value),
    /// A nested compiled SELECT
    SubQuery(CompiledQuery),
}

macro_rules! impl_operand_from_scalar {
    ($($t:ty),*) => {
        $(
            impl From<$t> for Operand {
                fn from(v: $t) -> Self {
                    Operand::Value(Value::from(v))
                }
            }
        )*
    };
}

impl_operand_from_scalar!(bool, i8, i16, i32, i64, u8, u16, u32, f32, f64, &str, String, &String);

impl From<Value> for Operand {
    fn from(v: Value) -> Self {
        match v {
            Value::Null => Operand::Null,
            other => Operand::Value(other),
        }
    }
}

impl<T: Into<Value>> From<Option<T>> for Operand {
    fn from(v: Option<T>) -> Self {
        match v {
            Some(v) => Operand::from(v.into()),
            None => Operand::Null,
        }
    }
}

impl<T: Into<Value>> From<Vec<T>> for Operand {
    fn from(v: Vec<T>) -> Self {
        Operand::List(v.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Value>, const N: usize> From<[T; N]> for Operand {
    fn from(v: [T; N]) -> Self {
        Operand::List(v.into_iter().map(Into::into).collect())
    }
}

impl<A: Into<Value>, B: Into<Value>> From<(A, B)> for Operand {
    fn from((low, high): (A, B)) -> Self {
        Operand::Range(low.into(), high.into())
    }
}

impl From<CompiledQuery> for Operand {
    fn from(q: CompiledQuery) -> Self {
        Operand::SubQuery(q)
    }
}

/// One WHERE, HAVING or join-ON condition.
#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    /// `None` for the first condition of a sequence
    pub conjunction: Option<Conjunction>,
    pub field: String,
    pub operator: String,
    pub operand: Operand,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinType {
    Inner,
    Left,
    Right,
    LeftOuter,
    RightOuter,
    FullOuter,
    Natural,
    Cross,
}

impl JoinType {
    pub fn as_sql(self) -> &'static str {
        match self {
            JoinType::Inner => "INNER",
            JoinType::Left => "LEFT",
            JoinType::Right => "RIGHT",
            JoinType::LeftOuter => "LEFT OUTER",
            JoinType::RightOuter => "RIGHT OUTER",
            JoinType::FullOuter => "FULL OUTER",
            JoinType::Natural => "NATURAL",
            JoinType::Cross => "CROSS",
        }
    }
}

/// What a join attaches: a plain table or an aliased sub-query.
#[derive(Debug, Clone, PartialEq)]
pub enum JoinTarget {
    Table(String),
    SubQuery(CompiledQuery),
}

impl JoinTarget {
    /// Key under which extra join conditions are looked up.
    pub fn key(&self) -> &str {
        match self {
            JoinTarget::Table(name) => name,
            JoinTarget::SubQuery(q) => q.alias.as_deref().unwrap_or(""),
        }
    }
}

impl From<&str> for JoinTarget {
    fn from(table: &str) -> Self {
        JoinTarget::Table(table.to_string())
    }
}

impl From<String> for JoinTarget {
    fn from(table: String) -> Self {
        JoinTarget::Table(table)
    }
}

impl From<CompiledQuery> for JoinTarget {
    fn from(q: CompiledQuery) -> Self {
        JoinTarget::SubQuery(q)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Join {
    pub join_type: JoinType,
    pub target: JoinTarget,
    /// Literal ON (or USING) condition; never parameterized
    pub condition: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Direction {
    #[default]
    Asc,
    Desc,
}

impl Direction {
    pub fn as_sql(self) -> &'static str {
        match self {
            Direction::Asc => "ASC",
            Direction::Desc => "DESC",
        }
    }
}

impl FromStr for Direction {
    type Err = FluentError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_uppercase().as_str() {
            "ASC" => Ok(Direction::Asc),
            "DESC" => Ok(Direction::Desc),
            _ => Err(FluentError::InvalidOrderDirection(s.to_string())),
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_sql())
    }
}

/// One ORDER BY entry.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderBy {
    pub field: String,
    pub direction: Direction,
    /// Explicit value ordering for the field, rendered as a CASE expression
    pub custom: Vec<Value>,
}

/// Row limit; values are integers by construction, never placeholders.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Limit {
    Count(u64),
    Range { offset: u64, count: u64 },
}

impl Limit {
    pub fn range(offset: u64, count: u64) -> Self {
        Limit::Range { offset, count }
    }
}

impl From<u64> for Limit {
    fn from(count: u64) -> Self {
        Limit::Count(count)
    }
}

impl From<u32> for Limit {
    fn from(count: u32) -> Self {
        Limit::Count(u64::from(count))
    }
}

impl From<usize> for Limit {
    fn from(count: usize) -> Self {
        Limit::Count(count as u64)
    }
}

impl From<(u64, u64)> for Limit {
    fn from((offset, count): (u64, u64)) -> Self {
        Limit::Range { offset, count }
    }
}

/// Statement modifiers placed right after the leading keyword.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryOption {
    /// `SELECT DISTINCT`
    Distinct,
    /// `SELECT ALL`
    All,
    /// `INSERT OR IGNORE` / `REPLACE` ignores it
    Ignore,
}

/// Snapshot of one accumulated fragment, as recorded in the trace log.
#[derive(Debug, Clone, PartialEq)]
pub enum Clause {
    Where(Condition),
    Having(Condition),
    Join(Join),
    OrderBy(OrderBy),
    GroupBy(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_direction_parsing() {
        assert_eq!(" desc ".parse::<Direction>().unwrap(), Direction::Desc);
        assert_eq!("ASC".parse::<Direction>().unwrap(), Direction::Asc);
        assert!(matches!(
            "sideways".parse::<Direction>(),
            Err(FluentError::InvalidOrderDirection(_))
        ));
    }

    #[test]
    fn test_operand_conversions() {
        assert_eq!(Operand::from(5), Operand::Value(Value::Integer(5)));
        assert_eq!(Operand::from(None::<i64>), Operand::Null);
        assert_eq!(Operand::from(Value::Null), Operand::Null);
        assert_eq!(
            Operand::from([1, 2]),
            Operand::List(vec![Value::Integer(1), Value::Integer(2)])
        );
        assert_eq!(
            Operand::from((4, 20)),
            Operand::Range(Value::Integer(4), Value::Integer(20))
        );
    }

    #[test]
    fn test_limit_conversions() {
        assert_eq!(Limit::from(10u64), Limit::Count(10));
        assert_eq!(Limit::from((20u64, 10u64)), Limit::range(20, 10));
    }
}
