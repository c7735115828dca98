/// Output Shaping
///
/// Converts materialized rows into the representation requested for the
/// statement: an array of records, an array of JSON objects, a map keyed by
/// one column, or a single JSON document.
use crate::core::{FluentError, Result, Value};
use indexmap::IndexMap;
use serde::ser::{Serialize, SerializeMap, Serializer};
use std::sync::Arc;

/// Output representation selected with `as_array`, `as_object` or `as_json`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReturnFormat {
    #[default]
    Array,
    Object,
    Json,
}

/// One result row; column names are shared by every row of a result.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    columns: Arc<[String]>,
    values: Vec<Value>,
}

impl Row {
    pub fn new(columns: Arc<[String]>, values: Vec<Value>) -> Self {
        Row { columns, values }
    }

    /// Value of the named column.
    pub fn get(&self, column: &str) -> Option<&Value> {
        self.columns
            .iter()
            .position(|c| c == column)
            .and_then(|i| self.values.get(i))
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub fn into_values(self) -> Vec<Value> {
        self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.columns.iter().map(String::as_str).zip(self.values.iter())
    }

    pub fn to_json(&self) -> Result<serde_json::Value> {
        Ok(serde_json::to_value(self)?)
    }
}

impl Serialize for Row {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.values.len()))?;
        for (column, value) in self.iter() {
            map.serialize_entry(column, value)?;
        }
        map.end()
    }
}

/// Value stored under one key of a keyed map.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
#[serde(untagged)]
pub enum MapEntry {
    /// The other column, when the row has exactly two
    Scalar(Value),
    /// The whole row otherwise
    Row(Row),
}

/// A shaped result.
#[derive(Debug, Clone, PartialEq)]
pub enum Output {
    Rows(Vec<Row>),
    Objects(Vec<serde_json::Value>),
    Keyed(IndexMap<String, MapEntry>),
    Json(String),
}

impl Output {
    pub fn into_rows(self) -> Option<Vec<Row>> {
        match self {
            Output::Rows(rows) => Some(rows),
            _ => None,
        }
    }

    pub fn into_objects(self) -> Option<Vec<serde_json::Value>> {
        match self {
            Output::Objects(objects) => Some(objects),
            _ => None,
        }
    }

    pub fn into_keyed(self) -> Option<IndexMap<String, MapEntry>> {
        match self {
            Output::Keyed(map) => Some(map),
            _ => None,
        }
    }

    pub fn into_json(self) -> Option<String> {
        match self {
            Output::Json(json) => Some(json),
            _ => None,
        }
    }

    /// Number of records (or the document length in bytes for JSON).
    pub fn len(&self) -> usize {
        match self {
            Output::Rows(rows) => rows.len(),
            Output::Objects(objects) => objects.len(),
            Output::Keyed(map) => map.len(),
            Output::Json(json) => json.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Shapes materialized rows.
///
/// With a map key, rows are keyed by that column; duplicate keys overwrite
/// earlier rows. The JSON format encodes whichever shape results.
pub fn shape(rows: Vec<Row>, format: ReturnFormat, map_key: Option<&str>) -> Result<Output> {
    if let Some(key) = map_key {
        let keyed = key_rows(rows, key)?;
        return match format {
            ReturnFormat::Json => Ok(Output::Json(serde_json::to_string(&keyed)?)),
            _ => Ok(Output::Keyed(keyed)),
        };
    }

    match format {
        ReturnFormat::Array => Ok(Output::Rows(rows)),
        ReturnFormat::Object => Ok(Output::Objects(
            rows.iter().map(Row::to_json).collect::<Result<Vec<_>>>()?,
        )),
        ReturnFormat::Json => Ok(Output::Json(serde_json::to_string(&rows)?)),
    }
}

fn key_rows(rows: Vec<Row>, key: &str) -> Result<IndexMap<String, MapEntry>> {
    let mut keyed = IndexMap::with_capacity(rows.len());
    for row in rows {
        let index = row
            .columns
            .iter()
            .position(|c| c == key)
            .ok_or_else(|| FluentError::InvalidOperand {
                operator: "map".to_string(),
                reason: format!("column '{key}' is not in the result"),
            })?;
        let map_key = row.values[index].to_string();
        let entry = if row.len() == 2 {
            MapEntry::Scalar(row.values[1 - index].clone())
        } else {
            MapEntry::Row(row)
        };
        keyed.insert(map_key, entry);
    }
    Ok(keyed)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rows(columns: &[&str], data: Vec<Vec<Value>>) -> Vec<Row> {
        let columns: Arc<[String]> = columns.iter().map(|c| c.to_string()).collect();
        data.into_iter()
            .map(|values| Row::new(columns.clone(), values))
            .collect()
    }

    #[test]
    fn test_two_column_map_yields_scalars() {
        let data = rows(
            &["id", "login"],
            vec![
                vec![Value::Integer(1), Value::from("alice")],
                vec![Value::Integer(2), Value::from("bob")],
            ],
        );

        let keyed = shape(data, ReturnFormat::Array, Some("id")).unwrap().into_keyed().unwrap();
        assert_eq!(keyed["1"], MapEntry::Scalar(Value::from("alice")));
        assert_eq!(keyed["2"], MapEntry::Scalar(Value::from("bob")));
    }

    #[test]
    fn test_duplicate_keys_last_wins() {
        let data = rows(
            &["kind", "id", "name"],
            vec![
                vec![Value::from("a"), Value::Integer(1), Value::from("first")],
                vec![Value::from("a"), Value::Integer(2), Value::from("second")],
            ],
        );

        let keyed = shape(data, ReturnFormat::Array, Some("kind")).unwrap().into_keyed().unwrap();
        assert_eq!(keyed.len(), 1);
        match &keyed["a"] {
            MapEntry::Row(row) => assert_eq!(row.get("name"), Some(&Value::from("second"))),
            other => panic!("Expected row, got {:?}", other),
        }
    }

    #[test]
    fn test_json_format_preserves_column_order() {
        let data = rows(&["z", "a"], vec![vec![Value::Integer(1), Value::Null]]);

        let json = shape(data, ReturnFormat::Json, None).unwrap().into_json().unwrap();
        assert_eq!(json, r#"[{"z":1,"a":null}]"#);
    }

    #[test]
    fn test_object_format() {
        let data = rows(&["id"], vec![vec![Value::Integer(9)]]);

        let objects = shape(data, ReturnFormat::Object, None).unwrap().into_objects().unwrap();
        assert_eq!(objects, vec![serde_json::json!({"id": 9})]);
    }

    #[test]
    fn test_missing_map_key_is_an_error() {
        let data = rows(&["id"], vec![vec![Value::Integer(1)]]);
        assert!(shape(data, ReturnFormat::Array, Some("nope")).is_err());
    }
}
