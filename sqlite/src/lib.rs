//! SQLite backend for the tablekit object mapper.
//!
//! Stores values of [`Table`](tablekit_core::Table) types as rows of SQLite
//! tables and reads them back, creating and migrating the tables on demand.
//!
//! # Architecture
//!
//! - **`connection`**: [`Connection`], the entry point for every operation
//! - **`registry`**: per-type cache of table mappings
//! - **`schema`**: table creation, column migration and indexes
//! - **`command`**: prepare, bind and step one SQL statement
//! - **`binder`**: parameter binding by value kind
//! - **`materialize`**: typed column reads and row decoding through `serde_json`
//! - **`table_query`**: executable, immutable `SELECT` builders
//! - **`transaction`**: scoped transactions with rollback on drop
//! - **`config`**: YAML-loadable connection settings
//!
//! # Quick start
//!
//! ```no_run
//! use serde::Deserialize;
//! use tablekit_core::{Field, FieldType, SqliteAttribute, Table};
//! use tablekit_sqlite::{Connection, ConnectionConfig};
//!
//! #[derive(Deserialize)]
//! struct Note {
//!     id: i64,
//!     body: String,
//! }
//!
//! impl Table for Note {
//!     fn fields() -> Vec<Field<Self>> {
//!         vec![
//!             Field::new("id", FieldType::Int, |n: &Note| n.id.into())
//!                 .with_setter(|n, v| n.id = v.as_i64().unwrap_or_default()),
//!             Field::new("body", FieldType::String, |n: &Note| n.body.as_str().into()),
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
//! let config = ConnectionConfig::load("db.yml").unwrap();
//! let conn = Connection::open_with_config(&config).unwrap();
//! conn.create_table::<Note>().unwrap();
//!
//! let mut note = Note { id: 0, body: "hello".into() };
//! conn.insert(&mut note).unwrap();
//! println!("stored note {}", note.id);
//! ```
//!
//! # Logging
//!
//! Executed SQL and mapping builds are reported through `tracing` at
//! `debug` level, table creation and migration at `info`. No subscriber is
//! installed.

mod binder;
mod command;
mod config;
mod connection;
mod error;
mod materialize;
mod registry;
mod schema;
mod table_query;
mod transaction;

pub use binder::{Binding, bind_all, bind_parameter};
pub use command::Command;
pub use config::{ConnectionConfig, OpenFlagsConfig};
pub use connection::Connection;
pub use error::{Result, SqliteError};
pub use materialize::{execute_deferred_query, read_column, read_value};
pub use registry::MappingRegistry;
pub use schema::{
    CreateTableResult, ExistingColumn, create_index_sql, create_or_migrate, create_table_sql,
    table_info,
};
pub use table_query::TableQuery;
pub use transaction::TransactionGuard;
