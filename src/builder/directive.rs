/// Column Values and Directives
///
/// INSERT, REPLACE and UPDATE take an ordered list of `(column, ColumnValue)`
/// pairs. A column value is either an ordinary bound value or a directive that
/// the compiler renders literally.
use crate::builder::subquery::CompiledQuery;
use crate::core::{FluentError, Result, Value};
use once_cell::sync::Lazy;
use regex::Regex;

/// Tag of the increment directive in the JSON form.
pub const INCREMENT_TAG: &str = "[I]";
/// Tag of the raw-function directive in the JSON form.
pub const FUNCTION_TAG: &str = "[F]";
/// Tag of the negation directive in the JSON form.
pub const NEGATE_TAG: &str = "[N]";

static INTERVAL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*([+-]?) ?([0-9]+) ?([a-zA-Z]?)\s*$").unwrap());

/// Value assigned to one column of an INSERT/REPLACE/UPDATE.
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnValue {
    /// Bound as a `?` placeholder
    Placeholder(Value),
    /// `<column><expression>`, e.g. `count+1`; nothing is bound
    Increment(String),
    /// Literal SQL fragment followed by the parameters its placeholders need
    RawExpr { sql: String, params: Vec<Value> },
    /// `NOT <column>` when `None`, `NOT <expression>` otherwise
    Negate(Option<String>),
    /// Nested compiled SELECT
    SubQuery(CompiledQuery),
}

macro_rules! impl_column_value_from {
    ($($t:ty),*) => {
        $(
            impl From<$t> for ColumnValue {
                fn from(v: $t) -> Self {
                    ColumnValue::Placeholder(Value::from(v))
                }
            }
        )*
    };
}

impl_column_value_from!(bool, i8, i16, i32, i64, u8, u16, u32, f32, f64, &str, String, &String);

impl From<Value> for ColumnValue {
    fn from(v: Value) -> Self {
        ColumnValue::Placeholder(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for ColumnValue {
    fn from(v: Option<T>) -> Self {
        ColumnValue::Placeholder(Value::from(v))
    }
}

impl From<CompiledQuery> for ColumnValue {
    fn from(q: CompiledQuery) -> Self {
        ColumnValue::SubQuery(q)
    }
}

/// `column = column + n`
pub fn inc(n: i64) -> ColumnValue {
    ColumnValue::Increment(format!("+{n}"))
}

/// `column = column - n`
pub fn dec(n: i64) -> ColumnValue {
    ColumnValue::Increment(format!("-{n}"))
}

/// Negates the column itself, or the given expression.
pub fn not(expression: Option<&str>) -> ColumnValue {
    ColumnValue::Negate(expression.map(str::to_string))
}

/// A literal SQL expression with its own bound parameters.
pub fn func<I, V>(sql: &str, params: I) -> ColumnValue
where
    I: IntoIterator<Item = V>,
    V: Into<Value>,
{
    ColumnValue::RawExpr {
        sql: sql.to_string(),
        params: params.into_iter().map(Into::into).collect(),
    }
}

/// Current timestamp, optionally shifted by an interval such as `"+1Y"` or
/// `"-2d"`.
///
/// Interval units: `s` second, `m` minute, `h` hour, `d` day (default),
/// `M` month, `Y` year.
pub fn now(diff: Option<&str>) -> Result<ColumnValue> {
    match diff.map(interval).transpose()? {
        Some(modifier) => Ok(ColumnValue::RawExpr {
            sql: "datetime('now', ?)".to_string(),
            params: vec![Value::Text(modifier)],
        }),
        None => Ok(ColumnValue::RawExpr {
            sql: "datetime('now')".to_string(),
            params: Vec::new(),
        }),
    }
}

/// Converts a compact interval (`"+1Y"`, `"-10 m"`, `"3"`) into a SQLite
/// date modifier (`"+1 years"`, `"-10 minutes"`, `"+3 days"`).
pub fn interval(diff: &str) -> Result<String> {
    let invalid = || FluentError::InvalidOperand {
        operator: "interval".to_string(),
        reason: format!("cannot parse '{diff}'"),
    };
    let caps = INTERVAL.captures(diff).ok_or_else(invalid)?;

    let sign = match &caps[1] {
        "" => "+",
        s => s,
    };
    let unit = match &caps[3] {
        "s" => "seconds",
        "m" => "minutes",
        "h" => "hours",
        "" | "d" => "days",
        "M" => "months",
        "Y" => "years",
        other => {
            return Err(FluentError::InvalidOperand {
                operator: "interval".to_string(),
                reason: format!("unknown interval unit '{other}' in '{diff}'"),
            })
        }
    };
    Ok(format!("{sign}{} {unit}", &caps[2]))
}

impl TryFrom<serde_json::Value> for ColumnValue {
    type Error = FluentError;

    /// Decodes a JSON column value.
    ///
    /// Scalars become placeholders. Single-key objects are directives:
    /// `{"[I]": "+1"}`, `{"[F]": ["expr", [params]]}`, `{"[N]": null}`.
    fn try_from(json: serde_json::Value) -> Result<Self> {
        use serde_json::Value as Json;

        match json {
            Json::Object(map) => {
                let mut entries = map.into_iter();
                let (key, payload) = match (entries.next(), entries.next()) {
                    (Some(entry), None) => entry,
                    _ => return Err(FluentError::InvalidValueDirective("<object>".to_string())),
                };
                match key.as_str() {
                    INCREMENT_TAG => match payload {
                        Json::String(expr) => Ok(ColumnValue::Increment(expr)),
                        Json::Number(n) => Ok(ColumnValue::Increment(format!("+{n}"))),
                        _ => Err(FluentError::InvalidValueDirective(key)),
                    },
                    FUNCTION_TAG => decode_function(key, payload),
                    NEGATE_TAG => match payload {
                        Json::Null => Ok(ColumnValue::Negate(None)),
                        Json::String(expr) => Ok(ColumnValue::Negate(Some(expr))),
                        _ => Err(FluentError::InvalidValueDirective(key)),
                    },
                    _ => Err(FluentError::InvalidValueDirective(key)),
                }
            }
            Json::Array(_) => Err(FluentError::InvalidValueDirective("<array>".to_string())),
            scalar => Ok(ColumnValue::Placeholder(json_scalar(scalar)?)),
        }
    }
}

fn decode_function(key: String, payload: serde_json::Value) -> Result<ColumnValue> {
    use serde_json::Value as Json;

    match payload {
        Json::String(sql) => Ok(ColumnValue::RawExpr {
            sql,
            params: Vec::new(),
        }),
        Json::Array(parts) => {
            let mut parts = parts.into_iter();
            let sql = match parts.next() {
                Some(Json::String(sql)) => sql,
                _ => return Err(FluentError::InvalidValueDirective(key)),
            };
            let params = match parts.next() {
                None | Some(Json::Null) => Vec::new(),
                Some(Json::Array(values)) => values
                    .into_iter()
                    .map(json_scalar)
                    .collect::<Result<Vec<_>>>()?,
                Some(_) => return Err(FluentError::InvalidValueDirective(key)),
            };
            Ok(ColumnValue::RawExpr { sql, params })
        }
        _ => Err(FluentError::InvalidValueDirective(key)),
    }
}

fn json_scalar(json: serde_json::Value) -> Result<Value> {
    use serde_json::Value as Json;

    match json {
        Json::Null => Ok(Value::Null),
        Json::Bool(b) => Ok(Value::Bool(b)),
        Json::Number(n) => Ok(match n.as_i64() {
            Some(i) => Value::Integer(i),
            None => Value::Real(n.as_f64().unwrap_or_default()),
        }),
        Json::String(s) => Ok(Value::Text(s)),
        other => Err(FluentError::InvalidOperand {
            operator: "bind".to_string(),
            reason: format!("expected a scalar, got {other}"),
        }),
    }
}

/// Decodes a JSON object into an ordered column/value list.
pub fn values_from_json(json: serde_json::Value) -> Result<Vec<(String, ColumnValue)>> {
    match json {
        serde_json::Value::Object(map) => map
            .into_iter()
            .map(|(column, value)| Ok((column, ColumnValue::try_from(value)?)))
            .collect(),
        other => Err(FluentError::InvalidOperand {
            operator: "values".to_string(),
            reason: format!("expected a JSON object, got {other}"),
        }),
    }
}

/// Builds an ordered `Vec<(String, ColumnValue)>`.
///
/// ```
/// use fluentdb::{values, inc};
///
/// let data = values! {
///     "login" => "admin",
///     "visits" => inc(1),
/// };
/// assert_eq!(data.len(), 2);
/// ```
#[macro_export]
macro_rules! values {
    ($($column:expr => $value:expr),* $(,)?) => {
        vec![$(($column.to_string(), $crate::ColumnValue::from($value))),*]
    };
}
