//! Engine-independent core of the tablekit object mapper.
//!
//! This crate turns a type description into a table layout and compiles
//! read queries, without touching a database:
//!
//! - [`Value`], [`FieldType`], [`StorageClass`]: the closed value model and
//!   the declared-type → storage-class table.
//! - [`SqliteAttribute`] / [`AttributeRegistry`]: declared column attributes
//!   folded per field.
//! - [`Table`], [`Field`], [`TableMapping`]: explicit per-type descriptors
//!   and the immutable mapping derived from them.
//! - [`sql_declaration`]: column declarations for `CREATE` / `ALTER`.
//! - [`SelectQuery`]: the immutable `SELECT` builder.
//! - [`timestamp`]: `serde` helpers for timestamp fields.
//!
//! The `tablekit-sqlite` crate executes all of this against SQLite.
//!
//! # Example
//!
//! ```
//! use serde::Deserialize;
//! use tablekit_core::*;
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
//! }
//!
//! let mapping = TableMapping::<Note>::build(CreateFlags::IMPLICIT_PK).unwrap();
//! let decls: Vec<_> = mapping.stored_columns().map(sql_declaration).collect();
//! assert_eq!(decls, vec!["\"id\" INTEGER PRIMARY KEY", "\"body\" TEXT"]);
//! ```

mod attribute;
mod error;
mod mapping;
mod query;
mod sql_type;
pub mod timestamp;
mod value;

pub use attribute::{Attribute, AttributeRegistry, ColumnAttributes, SqliteAttribute};
pub use error::MappingError;
pub use mapping::{Column, CreateFlags, Field, Table, TableMapping};
pub use query::{Ordering, SelectQuery};
pub use sql_type::{quote_identifier, sql_declaration, sql_type};
pub use value::{FieldType, StorageClass, Value, seconds_to_timestamp, timestamp_to_seconds};
