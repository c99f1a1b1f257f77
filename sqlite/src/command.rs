//! SQL text plus bindings, executed through one prepared statement.
//!
//! A [`Command`] owns nothing but text and values. Each execution prepares
//! a fresh statement, binds it, steps it, and drops it; dropping finalizes
//! the statement on every exit path, including errors.

use rusqlite::Statement;
use rusqlite::types::FromSql;
use serde::de::DeserializeOwned;
use tracing::debug;

use tablekit_core::{TableMapping, Value};

use crate::binder::{Binding, bind_all};
use crate::error::{Result, SqliteError};
use crate::materialize::execute_deferred_query;

/// A parameterized SQL command bound to a connection.
#[derive(Debug)]
pub struct Command<'c> {
    conn: &'c rusqlite::Connection,
    text: String,
    bindings: Vec<Binding>,
}

impl<'c> Command<'c> {
    /// Creates a command with no bindings.
    pub fn new(conn: &'c rusqlite::Connection, text: impl Into<String>) -> Self {
        Self {
            conn,
            text: text.into(),
            bindings: Vec::new(),
        }
    }

    /// Creates a command with positional bindings for each `?`.
    pub fn with_params(
        conn: &'c rusqlite::Connection,
        text: impl Into<String>,
        params: &[Value],
    ) -> Self {
        let mut cmd = Self::new(conn, text);
        cmd.bindings = params.iter().cloned().map(Binding::positional).collect();
        cmd
    }

    /// Adds a positional binding.
    pub fn bind(&mut self, value: impl Into<Value>) -> &mut Self {
        self.bindings.push(Binding::positional(value));
        self
    }

    /// Adds a named binding.
    pub fn bind_named(&mut self, name: impl Into<String>, value: impl Into<Value>) -> &mut Self {
        self.bindings.push(Binding::named(name, value));
        self
    }

    /// SQL text of the command.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Bindings, with slots resolved by the last execution.
    pub fn bindings(&self) -> &[Binding] {
        &self.bindings
    }

    fn prepare(&mut self) -> Result<Statement<'c>> {
        debug!(sql = %self.text, params = self.bindings.len(), "executing");
        let mut stmt = self
            .conn
            .prepare(&self.text)
            .map_err(SqliteError::from_prepare)?;
        bind_all(&mut stmt, &mut self.bindings)?;
        Ok(stmt)
    }

    /// Runs a statement that returns no rows and reports the changed row count.
    pub fn execute_non_query(&mut self) -> Result<usize> {
        let mut stmt = self.prepare()?;
        stmt.raw_execute().map_err(SqliteError::from_step)
    }

    /// Runs a query and reads the first column of its first row.
    ///
    /// Returns `None` when there is no row or the value is NULL.
    pub fn execute_scalar<V: FromSql>(&mut self) -> Result<Option<V>> {
        let mut stmt = self.prepare()?;
        let mut rows = stmt.raw_query();
        match rows.next().map_err(SqliteError::from_step)? {
            Some(row) => Ok(row.get::<_, Option<V>>(0)?),
            None => Ok(None),
        }
    }

    /// Runs a query and decodes every row into `T`.
    pub fn execute_query<T: DeserializeOwned>(
        &mut self,
        mapping: &TableMapping<T>,
    ) -> Result<Vec<T>> {
        let mut stmt = self.prepare()?;
        execute_deferred_query(&mut stmt, mapping)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::Connection;

    fn setup() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("CREATE TABLE t (a INTEGER NOT NULL, b TEXT);")
            .unwrap();
        conn
    }

    #[test]
    fn test_execute_non_query_reports_changes() {
        let conn = setup();
        let changed = Command::with_params(
            &conn,
            "INSERT INTO t (a, b) VALUES (?, ?)",
            &[Value::Integer(1), Value::from("x")],
        )
        .execute_non_query()
        .unwrap();
        assert_eq!(changed, 1);
    }

    #[test]
    fn test_named_and_positional_bindings() {
        let conn = setup();
        let mut insert = Command::new(&conn, "INSERT INTO t (a, b) VALUES (:a, :b)");
        insert.bind_named(":b", "named").bind_named(":a", 9_i64);
        insert.execute_non_query().unwrap();
        assert_eq!(insert.bindings()[0].index, 2);

        let b: Option<String> = Command::new(&conn, "SELECT b FROM t WHERE a = ?")
            .bind(9_i64)
            .execute_scalar()
            .unwrap();
        assert_eq!(b.as_deref(), Some("named"));
    }

    #[test]
    fn test_scalar_of_empty_result_is_none() {
        let conn = setup();
        let v: Option<i64> = Command::new(&conn, "SELECT a FROM t")
            .execute_scalar()
            .unwrap();
        assert!(v.is_none());
        let count: Option<i64> = Command::new(&conn, "SELECT COUNT(*) FROM t")
            .execute_scalar()
            .unwrap();
        assert_eq!(count, Some(0));
    }

    #[test]
    fn test_prepare_error() {
        let conn = setup();
        let err = Command::new(&conn, "SELEC nothing")
            .execute_non_query()
            .unwrap_err();
        assert!(matches!(err, SqliteError::Prepare(_)));
    }

    #[test]
    fn test_not_null_violation() {
        let conn = setup();
        let err = Command::with_params(
            &conn,
            "INSERT INTO t (a, b) VALUES (?, ?)",
            &[Value::Null, Value::from("x")],
        )
        .execute_non_query()
        .unwrap_err();
        assert!(matches!(err, SqliteError::NotNullConstraintViolation { .. }));
    }
}
