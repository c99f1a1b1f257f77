//! The object-mapping connection.
//!
//! [`Connection`] wraps one `rusqlite` connection together with the
//! [`MappingRegistry`] of every type used through it. Objects go in through
//! [`insert`](Connection::insert) / [`update`](Connection::update) /
//! [`delete`](Connection::delete) and come back out through
//! [`find`](Connection::find), [`query`](Connection::query) or a
//! [`TableQuery`].
//!
//! # Example
//!
//! ```
//! use serde::Deserialize;
//! use tablekit_core::{Field, FieldType, Ordering, SqliteAttribute, Table};
//! use tablekit_sqlite::Connection;
//!
//! #[derive(Debug, Deserialize, PartialEq)]
//! struct Person {
//!     id: i64,
//!     name: String,
//!     age: i64,
//! }
//!
//! impl Table for Person {
//!     fn fields() -> Vec<Field<Self>> {
//!         vec![
//!             Field::new("id", FieldType::Int, |p: &Person| p.id.into())
//!                 .with_setter(|p, v| p.id = v.as_i64().unwrap_or_default()),
//!             Field::new("name", FieldType::String, |p: &Person| p.name.as_str().into()),
//!             Field::new("age", FieldType::Int, |p: &Person| p.age.into()),
//!         ]
//!     }
//!
//!     fn attributes() -> Vec<SqliteAttribute> {
//!         vec![
//!             SqliteAttribute::primary_key("id"),
//!             SqliteAttribute::auto_increment("id"),
//!         ]
//!     }
//! }
//!
//! let conn = Connection::open_in_memory().unwrap();
//! conn.create_table::<Person>().unwrap();
//!
//! let mut a = Person { id: 0, name: "A".into(), age: 11 };
//! conn.insert(&mut a).unwrap();
//! assert_eq!(a.id, 1);
//!
//! let found: Option<Person> = conn.find(1_i64).unwrap();
//! assert_eq!(found, Some(a));
//!
//! let oldest = conn
//!     .table::<Person>()
//!     .unwrap()
//!     .order_by(Ordering::Desc("age".into()))
//!     .first()
//!     .unwrap();
//! assert_eq!(oldest.map(|p| p.name), Some("A".to_string()));
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;

use rusqlite::OpenFlags;
use rusqlite::types::FromSql;
use tracing::{debug, info};

use tablekit_core::{Column, CreateFlags, Table, TableMapping, Value, quote_identifier};

use crate::binder::{Binding, bind_all};
use crate::command::Command;
use crate::config::ConnectionConfig;
use crate::error::{Result, SqliteError};
use crate::registry::MappingRegistry;
use crate::schema::{self, CreateTableResult};
use crate::table_query::TableQuery;
use crate::transaction::{self, TransactionGuard};

/// A database connection that maps [`Table`] types to rows.
///
/// Not `Sync`: statements are prepared, stepped and finalized on the thread
/// that owns the connection. The mapping registry itself is thread-safe.
#[derive(Debug)]
pub struct Connection {
    conn: rusqlite::Connection,
    registry: MappingRegistry,
    path: Option<PathBuf>,
}

impl Connection {
    /// Opens (creating if needed) the database at `path` with default settings.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteError::OpenDatabase`] if the file cannot be opened.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::open_with_config(&ConnectionConfig::for_path(path.as_ref()))
    }

    /// Opens a private in-memory database.
    pub fn open_in_memory() -> Result<Self> {
        Self::open_with_config(&ConnectionConfig::default())
    }

    /// Opens `path` with explicit engine flags and no further setup.
    pub fn open_with_flags(path: impl AsRef<Path>, flags: OpenFlags) -> Result<Self> {
        let path = path.as_ref();
        let conn = rusqlite::Connection::open_with_flags(path, flags)
            .map_err(SqliteError::from_open)?;
        info!(path = %path.display(), "opened database");
        Ok(Self::from_handle(conn, Some(path.to_path_buf())))
    }

    /// Opens the database described by `config`.
    pub fn open_with_config(config: &ConnectionConfig) -> Result<Self> {
        let flags = config.open_flags.to_open_flags();
        let conn = match &config.path {
            Some(path) => rusqlite::Connection::open_with_flags(path, flags),
            None => rusqlite::Connection::open_in_memory_with_flags(flags),
        }
        .map_err(SqliteError::from_open)?;

        if config.foreign_keys {
            conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        }
        info!(path = ?config.path, "opened database");
        Ok(Self::from_handle(conn, config.path.clone()))
    }

    fn from_handle(conn: rusqlite::Connection, path: Option<PathBuf>) -> Self {
        Self {
            conn,
            registry: MappingRegistry::new(),
            path,
        }
    }

    /// Closes the connection, finalizing cached statements.
    pub fn close(self) -> Result<()> {
        let Self { conn, registry, .. } = self;
        registry.clear();
        conn.close().map_err(|(_, e)| SqliteError::from_step(e))
    }

    /// Database file path; `None` for in-memory databases.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// The underlying `rusqlite` connection.
    pub fn handle(&self) -> &rusqlite::Connection {
        &self.conn
    }

    /// The mapping cache of this connection.
    pub fn registry(&self) -> &MappingRegistry {
        &self.registry
    }

    /// Rows changed by the most recent statement.
    pub fn changes(&self) -> u64 {
        self.conn.changes()
    }

    /// Row id of the most recent successful insert.
    pub fn last_insert_rowid(&self) -> i64 {
        self.conn.last_insert_rowid()
    }

    /// Mapping of `T`, built on first use with default flags.
    pub fn mapping<T: Table>(&self) -> Result<Arc<TableMapping<T>>> {
        self.registry.get_or_build::<T>(CreateFlags::NONE)
    }

    /// Mapping of `T` for `flags`, rebuilding a cached entry built with other flags.
    pub fn mapping_with_flags<T: Table>(&self, flags: CreateFlags) -> Result<Arc<TableMapping<T>>> {
        self.registry.get_or_build::<T>(flags)
    }

    // ======================================================================
    // Schema
    // ======================================================================

    /// Creates the table of `T`, or adds the columns it is missing.
    pub fn create_table<T: Table>(&self) -> Result<CreateTableResult> {
        self.create_table_with_flags::<T>(CreateFlags::NONE)
    }

    /// Like [`create_table`](Self::create_table) with explicit create flags.
    pub fn create_table_with_flags<T: Table>(&self, flags: CreateFlags) -> Result<CreateTableResult> {
        let mapping = self.mapping_with_flags::<T>(flags)?;
        schema::create_or_migrate(&self.conn, &mapping)
    }

    /// Drops the table of `T` if it exists.
    pub fn drop_table<T: Table>(&self) -> Result<()> {
        let mapping = self.mapping::<T>()?;
        let sql = format!("DROP TABLE IF EXISTS {}", quote_identifier(mapping.table_name()));
        self.command(sql).execute_non_query()?;
        info!(table = mapping.table_name(), "dropped table");
        Ok(())
    }

    /// Creates an index over `columns` of `table`.
    pub fn create_index(
        &self,
        index_name: &str,
        table: &str,
        columns: &[&str],
        unique: bool,
    ) -> Result<()> {
        let sql = schema::create_index_sql(index_name, table, columns, unique);
        self.command(sql).execute_non_query()?;
        Ok(())
    }

    // ======================================================================
    // Raw SQL
    // ======================================================================

    /// Starts a [`Command`] for arbitrary SQL.
    pub fn command(&self, sql: impl Into<String>) -> Command<'_> {
        Command::new(&self.conn, sql)
    }

    /// Executes a statement with positional parameters and returns the changed row count.
    pub fn execute(&self, sql: &str, params: &[Value]) -> Result<usize> {
        Command::with_params(&self.conn, sql, params).execute_non_query()
    }

    /// Reads the first column of the first row, or `None`.
    pub fn execute_scalar<V: FromSql>(&self, sql: &str, params: &[Value]) -> Result<Option<V>> {
        Command::with_params(&self.conn, sql, params).execute_scalar()
    }

    /// Runs a query and decodes every row into `T`.
    pub fn query<T: Table>(&self, sql: &str, params: &[Value]) -> Result<Vec<T>> {
        let mapping = self.mapping::<T>()?;
        Command::with_params(&self.conn, sql, params).execute_query(&mapping)
    }

    // ======================================================================
    // Reads
    // ======================================================================

    /// Looks up the row of `T` whose primary key equals `key`.
    ///
    /// A table without a primary key returns its first row, whatever `key` is.
    pub fn find<T: Table>(&self, key: impl Into<Value>) -> Result<Option<T>> {
        let mapping = self.mapping::<T>()?;
        let params = if mapping.pk().is_some() {
            vec![key.into()]
        } else {
            Vec::new()
        };
        let rows = Command::with_params(&self.conn, mapping.query_by_primary_key_sql(), &params)
            .execute_query(&mapping)?;
        Ok(rows.into_iter().next())
    }

    /// Runs a query and returns its first decoded row.
    pub fn find_with_query<T: Table>(&self, sql: &str, params: &[Value]) -> Result<Option<T>> {
        Ok(self.query::<T>(sql, params)?.into_iter().next())
    }

    /// Starts a query over the table of `T`.
    pub fn table<T: Table>(&self) -> Result<TableQuery<'_, T>> {
        Ok(TableQuery::new(self, self.mapping::<T>()?))
    }

    // ======================================================================
    // Writes
    // ======================================================================

    /// Inserts `obj`, writing the engine-assigned key back into an
    /// auto-increment primary key field.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteError::NotNullConstraintViolation`] when a `NOT NULL`
    /// column receives NULL; nothing is stored in that case.
    pub fn insert<T: Table>(&self, obj: &mut T) -> Result<usize> {
        self.insert_with_extra(obj, "")
    }

    /// Inserts `obj`, replacing any row with the same key. Every stored
    /// column is written, including an auto-increment key.
    pub fn insert_or_replace<T: Table>(&self, obj: &mut T) -> Result<usize> {
        self.insert_with_extra(obj, "OR REPLACE")
    }

    /// Inserts `obj` with a conflict clause such as `OR IGNORE` placed after `INSERT`.
    pub fn insert_with_extra<T: Table>(&self, obj: &mut T, extra: &str) -> Result<usize> {
        let mapping = self.mapping::<T>()?;
        let columns: Vec<&Column> = if extra.trim().eq_ignore_ascii_case("OR REPLACE") {
            mapping.insert_or_replace_columns().collect()
        } else {
            mapping.insert_columns().collect()
        };
        let sql = insert_sql(mapping.table_name(), &columns, extra);
        let mut bindings: Vec<Binding> = columns
            .iter()
            .map(|c| Binding::positional(mapping.column_value(obj, c)))
            .collect();

        debug!(sql = %sql, params = bindings.len(), "executing");
        let mut stmt = self
            .conn
            .prepare_cached(&sql)
            .map_err(SqliteError::from_prepare)?;
        bind_all(&mut stmt, &mut bindings)?;
        let changes = stmt.raw_execute().map_err(SqliteError::from_step)?;

        if changes > 0 && mapping.has_auto_inc_pk() {
            mapping.set_auto_inc_pk(obj, self.conn.last_insert_rowid());
        }
        Ok(changes)
    }

    /// Inserts every object, optionally inside one transaction.
    ///
    /// Without a transaction, objects inserted before a failure stay inserted.
    pub fn insert_all<T: Table>(&self, objs: &mut [T], in_transaction: bool) -> Result<usize> {
        let mut insert_each = |conn: &Self| -> Result<usize> {
            let mut total = 0;
            for obj in objs.iter_mut() {
                total += conn.insert(obj)?;
            }
            Ok(total)
        };
        if in_transaction {
            self.run_in_transaction(insert_each)
        } else {
            insert_each(self)
        }
    }

    /// Writes every non-key column of `obj` to the row with its primary key.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteError::NoPrimaryKey`] when `T` has no primary key.
    pub fn update<T: Table>(&self, obj: &T) -> Result<usize> {
        let mapping = self.mapping::<T>()?;
        let pk = require_pk(&mapping)?;
        let columns: Vec<&Column> = mapping.stored_columns().filter(|c| !c.is_pk).collect();
        if columns.is_empty() {
            return Ok(0);
        }

        let assignments: Vec<String> = columns
            .iter()
            .map(|c| format!("{} = ?", quote_identifier(&c.name)))
            .collect();
        let sql = format!(
            "UPDATE {} SET {} WHERE {} = ?",
            quote_identifier(mapping.table_name()),
            assignments.join(", "),
            quote_identifier(&pk.name)
        );
        let mut params: Vec<Value> = columns
            .iter()
            .map(|c| mapping.column_value(obj, c))
            .collect();
        params.push(mapping.column_value(obj, pk));
        self.execute(&sql, &params)
    }

    /// Deletes the row with the primary key of `obj`.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteError::NoPrimaryKey`] when `T` has no primary key.
    pub fn delete<T: Table>(&self, obj: &T) -> Result<usize> {
        let mapping = self.mapping::<T>()?;
        let pk = require_pk(&mapping)?;
        let sql = format!(
            "DELETE FROM {} WHERE {} = ?",
            quote_identifier(mapping.table_name()),
            quote_identifier(&pk.name)
        );
        self.execute(&sql, &[mapping.column_value(obj, pk)])
    }

    /// Deletes every row of the table of `T`.
    pub fn delete_all<T: Table>(&self) -> Result<usize> {
        let mapping = self.mapping::<T>()?;
        let sql = format!("DELETE FROM {}", quote_identifier(mapping.table_name()));
        self.execute(&sql, &[])
    }

    // ======================================================================
    // Transactions
    // ======================================================================

    /// Issues `BEGIN`.
    pub fn begin_transaction(&self) -> Result<()> {
        transaction::begin(&self.conn)
    }

    /// Issues `COMMIT`.
    pub fn commit(&self) -> Result<()> {
        transaction::commit(&self.conn)
    }

    /// Issues `ROLLBACK`.
    pub fn rollback(&self) -> Result<()> {
        transaction::rollback(&self.conn)
    }

    /// Whether a transaction is open.
    pub fn is_in_transaction(&self) -> bool {
        !self.conn.is_autocommit()
    }

    /// Opens a transaction that rolls back when dropped uncommitted.
    pub fn transaction(&self) -> Result<TransactionGuard<'_>> {
        TransactionGuard::begin(&self.conn)
    }

    /// Runs `f` inside a transaction.
    ///
    /// Commits when `f` returns `Ok`; rolls back when it returns `Err` or
    /// panics. Inside an open transaction a savepoint is used instead.
    pub fn run_in_transaction<R, F>(&self, f: F) -> Result<R>
    where
        F: FnOnce(&Self) -> Result<R>,
    {
        let tx = self.transaction()?;
        let value = f(self)?;
        tx.commit()?;
        Ok(value)
    }
}

fn require_pk<T>(mapping: &TableMapping<T>) -> Result<&Column> {
    mapping
        .pk()
        .ok_or_else(|| SqliteError::NoPrimaryKey(mapping.table_name().to_string()))
}

fn insert_sql(table: &str, columns: &[&Column], extra: &str) -> String {
    let verb = match extra.trim() {
        "" => "INSERT".to_string(),
        extra => format!("INSERT {extra}"),
    };
    let table = quote_identifier(table);
    if columns.is_empty() {
        return format!("{verb} INTO {table} DEFAULT VALUES");
    }
    let names: Vec<String> = columns.iter().map(|c| quote_identifier(&c.name)).collect();
    let placeholders = vec!["?"; columns.len()].join(", ");
    format!(
        "{verb} INTO {table} ({}) VALUES ({placeholders})",
        names.join(", ")
    )
}
