//! Executable queries over one mapped table.

use std::sync::Arc;

use tablekit_core::{Ordering, SelectQuery, Table, TableMapping, Value};

use crate::command::Command;
use crate::connection::Connection;
use crate::error::Result;

/// A [`SelectQuery`] bound to a connection and the mapping of `T`.
///
/// Like [`SelectQuery`], every modifier returns a new query and leaves the
/// receiver untouched.
///
/// # Examples
///
/// ```no_run
/// # use serde::Deserialize;
/// # use tablekit_core::{Field, FieldType, Ordering, Table};
/// # #[derive(Deserialize)]
/// # struct Person { name: String, age: i64 }
/// # impl Table for Person {
/// #     fn fields() -> Vec<Field<Self>> {
/// #         vec![
/// #             Field::new("name", FieldType::String, |p: &Person| p.name.as_str().into()),
/// #             Field::new("age", FieldType::Int, |p: &Person| p.age.into()),
/// #         ]
/// #     }
/// # }
/// use tablekit_sqlite::Connection;
///
/// let conn = Connection::open("people.db").unwrap();
/// let people = conn.table::<Person>().unwrap();
/// let oldest = people.order_by(Ordering::Desc("age".into())).first().unwrap();
/// let adults = people.where_sql("age >= ?", vec![18_i64.into()]).count().unwrap();
/// ```
pub struct TableQuery<'c, T> {
    conn: &'c Connection,
    mapping: Arc<TableMapping<T>>,
    query: SelectQuery,
}

impl<'c, T: Table> TableQuery<'c, T> {
    pub(crate) fn new(conn: &'c Connection, mapping: Arc<TableMapping<T>>) -> Self {
        let query = SelectQuery::new(mapping.table_name());
        Self {
            conn,
            mapping,
            query,
        }
    }

    fn derive(&self, query: SelectQuery) -> Self {
        Self {
            conn: self.conn,
            mapping: Arc::clone(&self.mapping),
            query,
        }
    }

    /// Caps the number of rows returned.
    pub fn limit(&self, n: i64) -> Self {
        self.derive(self.query.limit(n))
    }

    /// Skips the first `n` rows.
    pub fn offset(&self, n: i64) -> Self {
        self.derive(self.query.offset(n))
    }

    /// Adds a SQL condition with positional parameters.
    pub fn where_sql(&self, condition: impl Into<String>, params: Vec<Value>) -> Self {
        self.derive(self.query.where_sql(condition, params))
    }

    /// Appends a sort key.
    pub fn order_by(&self, ordering: Ordering) -> Self {
        self.derive(self.query.order_by(ordering))
    }

    /// Returns only distinct combinations of `columns`.
    ///
    /// Rows are still decoded into `T`, so the type must tolerate the
    /// columns that are left out.
    pub fn distinct<I, S>(&self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.derive(self.query.distinct(columns))
    }

    /// The underlying query state.
    pub fn query(&self) -> &SelectQuery {
        &self.query
    }

    /// The compiled `SELECT`.
    pub fn sql(&self) -> String {
        self.query.select_sql()
    }

    /// Runs the query and decodes every row.
    pub fn to_list(&self) -> Result<Vec<T>> {
        Command::with_params(self.conn.handle(), self.sql(), self.query.params())
            .execute_query(&self.mapping)
    }

    /// Runs the query with `LIMIT 1` and returns the row, if any.
    pub fn first(&self) -> Result<Option<T>> {
        Ok(self.limit(1).to_list()?.into_iter().next())
    }

    /// Counts matching rows, or distinct rows for a [`distinct`](Self::distinct)
    /// query. Ordering, limit and offset are ignored.
    pub fn count(&self) -> Result<i64> {
        let count = Command::with_params(
            self.conn.handle(),
            self.query.count_sql(),
            self.query.params(),
        )
        .execute_scalar::<i64>()?;
        Ok(count.unwrap_or(0))
    }

    /// Loads every row of the table and keeps those matching `predicate`.
    ///
    /// The predicate runs in memory after an unrestricted `SELECT *`: the
    /// whole table is read and decoded, whatever conditions, ordering or
    /// paging this query carries.
    pub fn filter<P>(&self, predicate: P) -> Result<Vec<T>>
    where
        P: Fn(&T) -> bool,
    {
        let all = SelectQuery::new(self.mapping.table_name()).select_sql();
        let rows = Command::new(self.conn.handle(), all).execute_query(&self.mapping)?;
        Ok(rows.into_iter().filter(|row| predicate(row)).collect())
    }
}

impl<T> Clone for TableQuery<'_, T> {
    fn clone(&self) -> Self {
        Self {
            conn: self.conn,
            mapping: Arc::clone(&self.mapping),
            query: self.query.clone(),
        }
    }
}

impl<T> std::fmt::Debug for TableQuery<'_, T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TableQuery")
            .field("table", &self.mapping.table_name())
            .field("query", &self.query)
            .finish()
    }
}
