//! Error types for building table mappings.

use thiserror::Error;

/// Errors raised while deriving a [`TableMapping`](crate::TableMapping)
/// from a type's field descriptors and attributes.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MappingError {
    /// Two field descriptors share a name.
    #[error("duplicate field '{field}' in table '{table}'")]
    DuplicateField { table: String, field: String },

    /// More than one field is marked as primary key.
    #[error("table '{table}' declares more than one primary key ('{first}', '{second}')")]
    MultiplePrimaryKeys {
        table: String,
        first: String,
        second: String,
    },

    /// `AutoIncrement` was declared on a field that is not the primary key.
    #[error("column '{column}' in table '{table}' is auto-increment but not a primary key")]
    AutoIncrementWithoutPrimaryKey { table: String, column: String },

    /// The auto-increment primary key can not be written back after insert.
    #[error("auto-increment primary key '{column}' in table '{table}' has no setter")]
    MissingSetter { table: String, column: String },

    /// `WITHOUT ROWID` tables must have a primary key.
    #[error("table '{0}' is declared WITHOUT ROWID but has no primary key")]
    WithoutRowIdRequiresPrimaryKey(String),

    /// SQLite rejects `AUTOINCREMENT` on `WITHOUT ROWID` tables.
    #[error("table '{table}' is declared WITHOUT ROWID but '{column}' is auto-increment")]
    WithoutRowIdAutoIncrement { table: String, column: String },
}
