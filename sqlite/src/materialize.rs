//! Reading typed values out of result rows and rebuilding objects.
//!
//! The accessor used for a column is chosen by the field's declared type,
//! not by what the row happens to store, mirroring SQLite's own
//! `column_int` / `column_text` coercions. Each row becomes a JSON object
//! keyed by column name and is decoded with `serde_json`.

use rusqlite::types::ValueRef;
use rusqlite::{Row, Statement};
use serde::de::DeserializeOwned;
use serde_json::{Map, Number, Value as JsonValue};

use tablekit_core::{FieldType, TableMapping, Value};

use crate::error::{Result, SqliteError};

/// Reads column `index` of `row` using the accessor for `declared`.
///
/// Returns `None` for SQL NULL whatever the declared type.
pub fn read_column(row: &Row<'_>, index: usize, declared: FieldType) -> Result<Option<Value>> {
    let raw = row.get_ref(index)?;
    Ok(read_value(raw, declared))
}

/// Converts a raw column value using the accessor for `declared`.
pub fn read_value(raw: ValueRef<'_>, declared: FieldType) -> Option<Value> {
    if matches!(raw, ValueRef::Null) {
        return None;
    }
    let value = match declared {
        FieldType::String | FieldType::Uri => Value::Text(column_text(raw)),
        FieldType::Int | FieldType::Bool => Value::Integer(column_int(raw)),
        FieldType::Double | FieldType::Timestamp => Value::Real(column_double(raw)),
        FieldType::Bytes => Value::Blob(column_blob(raw)),
    };
    Some(value)
}

/// Converts a read value into the form the serialization bridge expects.
///
/// Booleans become JSON booleans, timestamps stay seconds since the epoch,
/// blobs become byte arrays.
pub fn to_json(value: Option<Value>, declared: FieldType) -> JsonValue {
    match value {
        None | Some(Value::Null) => JsonValue::Null,
        Some(Value::Integer(v)) if declared == FieldType::Bool => JsonValue::Bool(v == 1),
        Some(Value::Integer(v)) => JsonValue::Number(v.into()),
        Some(Value::Real(v)) => Number::from_f64(v).map_or(JsonValue::Null, JsonValue::Number),
        Some(Value::Text(v)) => JsonValue::String(v),
        Some(Value::Blob(v)) => {
            JsonValue::Array(v.into_iter().map(|b| JsonValue::Number(b.into())).collect())
        }
    }
}

/// Steps a prepared, bound statement to completion and decodes every row.
///
/// Result columns without a matching mapped column are skipped. All rows
/// are collected before returning; a row that fails to decode aborts the
/// whole query with [`SqliteError::JsonDecode`].
pub fn execute_deferred_query<T: DeserializeOwned>(
    stmt: &mut Statement<'_>,
    mapping: &TableMapping<T>,
) -> Result<Vec<T>> {
    let columns: Vec<Option<(String, FieldType)>> = stmt
        .column_names()
        .into_iter()
        .map(|name| {
            mapping
                .find_column(name)
                .map(|c| (c.name.clone(), c.field_type))
        })
        .collect();

    let mut result = Vec::new();
    let mut rows = stmt.raw_query();
    while let Some(row) = rows.next().map_err(SqliteError::from_step)? {
        let mut object = Map::with_capacity(columns.len());
        for (index, column) in columns.iter().enumerate() {
            if let Some((name, declared)) = column {
                let value = read_column(row, index, *declared)?;
                object.insert(name.clone(), to_json(value, *declared));
            }
        }
        result.push(serde_json::from_value(JsonValue::Object(object))?);
    }
    Ok(result)
}

fn lossy_text(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}

fn column_text(raw: ValueRef<'_>) -> String {
    match raw {
        ValueRef::Null => String::new(),
        ValueRef::Integer(v) => v.to_string(),
        ValueRef::Real(v) => v.to_string(),
        ValueRef::Text(v) | ValueRef::Blob(v) => lossy_text(v),
    }
}

fn column_int(raw: ValueRef<'_>) -> i64 {
    match raw {
        ValueRef::Null => 0,
        ValueRef::Integer(v) => v,
        ValueRef::Real(v) => v as i64,
        ValueRef::Text(v) | ValueRef::Blob(v) => parse_int(&lossy_text(v)),
    }
}

fn column_double(raw: ValueRef<'_>) -> f64 {
    match raw {
        ValueRef::Null => 0.0,
        ValueRef::Integer(v) => v as f64,
        ValueRef::Real(v) => v,
        ValueRef::Text(v) | ValueRef::Blob(v) => lossy_text(v).trim().parse().unwrap_or(0.0),
    }
}

fn column_blob(raw: ValueRef<'_>) -> Vec<u8> {
    match raw {
        ValueRef::Null => Vec::new(),
        ValueRef::Integer(v) => v.to_string().into_bytes(),
        ValueRef::Real(v) => v.to_string().into_bytes(),
        ValueRef::Text(v) | ValueRef::Blob(v) => v.to_vec(),
    }
}

/// Parses text the way SQLite's integer accessor does for clean input:
/// integers directly, numeric text through a float, anything else as 0.
fn parse_int(text: &str) -> i64 {
    let text = text.trim();
    text.parse::<i64>()
        .ok()
        .or_else(|| text.parse::<f64>().ok().map(|v| v as i64))
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::Connection;

    fn first_row_value(sql: &str, declared: FieldType) -> Option<Value> {
        let conn = Connection::open_in_memory().unwrap();
        let mut stmt = conn.prepare(sql).unwrap();
        let mut rows = stmt.raw_query();
        let row = rows.next().unwrap().unwrap();
        read_column(row, 0, declared).unwrap()
    }

    #[test]
    fn test_null_is_none_for_every_type() {
        for declared in [
            FieldType::Int,
            FieldType::Bool,
            FieldType::Double,
            FieldType::Timestamp,
            FieldType::String,
            FieldType::Uri,
            FieldType::Bytes,
        ] {
            assert_eq!(first_row_value("SELECT NULL", declared), None);
        }
    }

    #[test]
    fn test_declared_type_selects_accessor() {
        assert_eq!(
            first_row_value("SELECT 42", FieldType::String),
            Some(Value::Text("42".into()))
        );
        assert_eq!(
            first_row_value("SELECT '17'", FieldType::Int),
            Some(Value::Integer(17))
        );
        assert_eq!(
            first_row_value("SELECT 3", FieldType::Double),
            Some(Value::Real(3.0))
        );
        assert_eq!(
            first_row_value("SELECT 1531526400.5", FieldType::Timestamp),
            Some(Value::Real(1_531_526_400.5))
        );
        assert_eq!(
            first_row_value("SELECT x'0102'", FieldType::Bytes),
            Some(Value::Blob(vec![1, 2]))
        );
        assert_eq!(
            first_row_value("SELECT 'https://example.com'", FieldType::Uri),
            Some(Value::Text("https://example.com".into()))
        );
    }

    #[test]
    fn test_bool_json_is_integer_equal_to_one() {
        assert_eq!(
            to_json(first_row_value("SELECT 1", FieldType::Bool), FieldType::Bool),
            JsonValue::Bool(true)
        );
        assert_eq!(
            to_json(first_row_value("SELECT 0", FieldType::Bool), FieldType::Bool),
            JsonValue::Bool(false)
        );
        assert_eq!(
            to_json(first_row_value("SELECT 2", FieldType::Bool), FieldType::Bool),
            JsonValue::Bool(false)
        );
    }

    #[test]
    fn test_to_json_shapes() {
        assert_eq!(to_json(None, FieldType::Int), JsonValue::Null);
        assert_eq!(
            to_json(Some(Value::Integer(5)), FieldType::Int),
            serde_json::json!(5)
        );
        assert_eq!(
            to_json(Some(Value::Real(f64::NAN)), FieldType::Double),
            JsonValue::Null
        );
        assert_eq!(
            to_json(Some(Value::Blob(vec![7, 8])), FieldType::Bytes),
            serde_json::json!([7, 8])
        );
    }

    #[test]
    fn test_parse_int() {
        assert_eq!(parse_int(" 12 "), 12);
        assert_eq!(parse_int("3.7"), 3);
        assert_eq!(parse_int("abc"), 0);
    }
}
