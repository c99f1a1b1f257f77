//! Binding values to prepared statement parameters.

use rusqlite::Statement;
use rusqlite::types::Null;

use tablekit_core::Value;

use crate::error::{Result, SqliteError};

/// One parameter to bind into a prepared statement.
///
/// Named bindings resolve their slot through the statement's parameter
/// lookup; unnamed bindings take strictly increasing positions starting at 1.
/// `index` holds the slot resolved by the last [`bind_all`].
#[derive(Debug, Clone, PartialEq)]
pub struct Binding {
    pub name: Option<String>,
    pub value: Value,
    pub index: usize,
}

impl Binding {
    /// A binding for the next positional `?` slot.
    pub fn positional(value: impl Into<Value>) -> Self {
        Self {
            name: None,
            value: value.into(),
            index: 0,
        }
    }

    /// A binding for a named parameter such as `:name`, `@name` or `$name`.
    pub fn named(name: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            name: Some(name.into()),
            value: value.into(),
            index: 0,
        }
    }
}

/// Binds every binding to `stmt`, recording the resolved slot on each.
///
/// Re-binding the same list after the statement was reset binds the same
/// slots again.
///
/// # Errors
///
/// Returns [`SqliteError::UnknownParameter`] when a named binding has no
/// matching parameter.
pub fn bind_all(stmt: &mut Statement<'_>, bindings: &mut [Binding]) -> Result<()> {
    let mut next_position = 1;
    for binding in bindings.iter_mut() {
        binding.index = match &binding.name {
            Some(name) => stmt
                .parameter_index(name)?
                .ok_or_else(|| SqliteError::UnknownParameter(name.clone()))?,
            None => {
                let position = next_position;
                next_position += 1;
                position
            }
        };
        bind_parameter(stmt, binding.index, &binding.value)?;
    }
    Ok(())
}

/// Binds a single value to the 1-based slot `index`.
pub fn bind_parameter(stmt: &mut Statement<'_>, index: usize, value: &Value) -> Result<()> {
    match value {
        Value::Null => stmt.raw_bind_parameter(index, Null)?,
        Value::Integer(v) => stmt.raw_bind_parameter(index, *v)?,
        Value::Real(v) => stmt.raw_bind_parameter(index, *v)?,
        Value::Text(v) => stmt.raw_bind_parameter(index, v.as_str())?,
        Value::Blob(v) => stmt.raw_bind_parameter(index, v.as_slice())?,
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::Connection;

    fn select_row(stmt: &mut Statement<'_>) -> (i64, String, Option<f64>) {
        let mut rows = stmt.raw_query();
        let row = rows.next().unwrap().unwrap();
        (row.get(0).unwrap(), row.get(1).unwrap(), row.get(2).unwrap())
    }

    #[test]
    fn test_positional_bindings_start_at_one() {
        let conn = Connection::open_in_memory().unwrap();
        let mut stmt = conn.prepare("SELECT ?, ?, ?").unwrap();
        let mut bindings = vec![
            Binding::positional(7_i64),
            Binding::positional("seven"),
            Binding::positional(Value::Null),
        ];
        bind_all(&mut stmt, &mut bindings).unwrap();
        let indexes: Vec<_> = bindings.iter().map(|b| b.index).collect();
        assert_eq!(indexes, vec![1, 2, 3]);
        assert_eq!(select_row(&mut stmt), (7, "seven".to_string(), None));
    }

    #[test]
    fn test_named_bindings_resolve_through_statement() {
        let conn = Connection::open_in_memory().unwrap();
        let mut stmt = conn.prepare("SELECT :a, :b, :c").unwrap();
        let mut bindings = vec![
            Binding::named(":c", 2.5),
            Binding::named(":a", true),
            Binding::named(":b", "x"),
        ];
        bind_all(&mut stmt, &mut bindings).unwrap();
        let indexes: Vec<_> = bindings.iter().map(|b| b.index).collect();
        assert_eq!(indexes, vec![3, 1, 2]);
        assert_eq!(select_row(&mut stmt), (1, "x".to_string(), Some(2.5)));
    }

    #[test]
    fn test_unknown_named_parameter() {
        let conn = Connection::open_in_memory().unwrap();
        let mut stmt = conn.prepare("SELECT :a").unwrap();
        let mut bindings = vec![Binding::named(":missing", 1_i64)];
        let err = bind_all(&mut stmt, &mut bindings).unwrap_err();
        assert!(matches!(err, SqliteError::UnknownParameter(ref n) if n == ":missing"));
    }

    #[test]
    fn test_rebinding_after_reset_is_stable() {
        let conn = Connection::open_in_memory().unwrap();
        let mut stmt = conn.prepare("SELECT ?, ?, ?").unwrap();
        let mut bindings = vec![
            Binding::positional(1_i64),
            Binding::positional("a"),
            Binding::positional(0.5),
        ];
        bind_all(&mut stmt, &mut bindings).unwrap();
        let first = select_row(&mut stmt);
        bind_all(&mut stmt, &mut bindings).unwrap();
        assert_eq!(select_row(&mut stmt), first);
    }

    #[test]
    fn test_blob_binding() {
        let conn = Connection::open_in_memory().unwrap();
        let mut stmt = conn.prepare("SELECT length(?)").unwrap();
        bind_parameter(&mut stmt, 1, &Value::Blob(vec![1, 2, 3])).unwrap();
        let mut rows = stmt.raw_query();
        let len: i64 = rows.next().unwrap().unwrap().get(0).unwrap();
        assert_eq!(len, 3);
    }
}
