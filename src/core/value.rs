/// Values and Parameter Binding
///
/// Every value that reaches the driver passes through this module: it is
/// wrapped in a [`Value`], given a one-character [`TypeTag`] and appended to a
/// [`ParamBuffer`] whose order matches the `?` placeholders of the compiled
/// statement.
use rusqlite::types::{ToSql, ToSqlOutput, ValueRef};
use serde::Serialize;
use std::fmt;

/// A SQL value that can be bound to a placeholder or read back from a row.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Bool(bool),
    Integer(i64),
    Real(f64),
    Text(String),
    Blob(Vec<u8>),
}

impl Value {
    /// Wraps raw bytes as a blob value.
    pub fn blob(bytes: impl Into<Vec<u8>>) -> Self {
        Value::Blob(bytes.into())
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Integer(i) => Some(*i),
            Value::Bool(b) => Some(i64::from(*b)),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Real(f) => Some(*f),
            Value::Integer(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Infers the driver type tag from the value's native kind.
    pub fn type_tag(&self) -> TypeTag {
        match self {
            Value::Null | Value::Text(_) => TypeTag::Str,
            Value::Bool(_) | Value::Integer(_) => TypeTag::Int,
            Value::Blob(_) => TypeTag::Blob,
            Value::Real(_) => TypeTag::Double,
        }
    }

    /// Renders the value as an inline SQL literal.
    ///
    /// Only used to produce human-readable statement text for
    /// `last_query` and the trace log. Execution always binds.
    pub fn to_sql_inline(&self) -> String {
        match self {
            Value::Null => "NULL".to_string(),
            Value::Bool(b) => i64::from(*b).to_string(),
            Value::Integer(i) => i.to_string(),
            Value::Real(f) => f.to_string(),
            Value::Text(s) => format!("'{}'", s.replace('\'', "''")),
            Value::Blob(b) => {
                let hex: String = b.iter().map(|byte| format!("{byte:02X}")).collect();
                format!("X'{hex}'")
            }
        }
    }

    /// Copies a borrowed driver value into an owned [`Value`].
    pub fn from_ref(value: ValueRef<'_>) -> Self {
        match value {
            ValueRef::Null => Value::Null,
            ValueRef::Integer(i) => Value::Integer(i),
            ValueRef::Real(f) => Value::Real(f),
            ValueRef::Text(t) => Value::Text(String::from_utf8_lossy(t).into_owned()),
            ValueRef::Blob(b) => Value::Blob(b.to_vec()),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "NULL"),
            Value::Bool(b) => write!(f, "{}", i64::from(*b)),
            Value::Integer(i) => write!(f, "{i}"),
            Value::Real(r) => write!(f, "{r}"),
            Value::Text(s) => write!(f, "{s}"),
            Value::Blob(b) => write!(f, "<BLOB: {} bytes>", b.len()),
        }
    }
}

impl ToSql for Value {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            Value::Null => ToSqlOutput::Borrowed(ValueRef::Null),
            Value::Bool(b) => ToSqlOutput::Borrowed(ValueRef::Integer(i64::from(*b))),
            Value::Integer(i) => ToSqlOutput::Borrowed(ValueRef::Integer(*i)),
            Value::Real(f) => ToSqlOutput::Borrowed(ValueRef::Real(*f)),
            Value::Text(s) => ToSqlOutput::Borrowed(ValueRef::Text(s.as_bytes())),
            Value::Blob(b) => ToSqlOutput::Borrowed(ValueRef::Blob(b)),
        })
    }
}

macro_rules! impl_from_integer {
    ($($t:ty),*) => {
        $(
            impl From<$t> for Value {
                fn from(v: $t) -> Self {
                    Value::Integer(i64::from(v))
                }
            }
        )*
    };
}

impl_from_integer!(i8, i16, i32, i64, u8, u16, u32);

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Value::Real(f64::from(v))
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Real(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl From<&String> for Value {
    fn from(v: &String) -> Self {
        Value::Text(v.clone())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}

/// Single-character driver type tag for a bound parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeTag {
    /// `s`: text and NULL
    Str,
    /// `i`: integers and booleans
    Int,
    /// `b`: binary data
    Blob,
    /// `d`: floating point
    Double,
}

impl TypeTag {
    pub fn as_char(self) -> char {
        match self {
            TypeTag::Str => 's',
            TypeTag::Int => 'i',
            TypeTag::Blob => 'b',
            TypeTag::Double => 'd',
        }
    }
}

/// A bound value together with its inferred type tag.
#[derive(Debug, Clone, PartialEq)]
pub struct BindParameter {
    pub value: Value,
    pub tag: TypeTag,
}

/// Positional parameter buffer kept in lock-step with emitted placeholders.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParamBuffer {
    params: Vec<BindParameter>,
}

impl ParamBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends one value, inferring its type tag.
    pub fn bind(&mut self, value: Value) {
        let tag = value.type_tag();
        self.params.push(BindParameter { value, tag });
    }

    /// Appends every value in order.
    pub fn bind_all<I>(&mut self, values: I)
    where
        I: IntoIterator<Item = Value>,
    {
        for value in values {
            self.bind(value);
        }
    }

    /// Moves all parameters of `other` to the end of this buffer.
    pub fn append(&mut self, other: &mut ParamBuffer) {
        self.params.append(&mut other.params);
    }

    pub fn len(&self) -> usize {
        self.params.len()
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &BindParameter> {
        self.params.iter()
    }

    pub fn values(&self) -> Vec<Value> {
        self.params.iter().map(|p| p.value.clone()).collect()
    }

    /// The reserved type-tag slot: one tag character per parameter, e.g. `"isd"`.
    pub fn type_string(&self) -> String {
        self.params.iter().map(|p| p.tag.as_char()).collect()
    }
}
