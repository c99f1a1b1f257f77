//! Error types for SQLite mapping operations.
//!
//! Statement failures are classified the way callers need to react to them:
//! open and prepare failures, constraint violations, generic execution
//! failures, and row-decoding failures are distinct variants.

use rusqlite::ErrorCode;
use rusqlite::ffi;
use thiserror::Error;

use tablekit_core::MappingError;

/// Errors that can occur during SQLite mapping operations.
#[derive(Debug, Error)]
pub enum SqliteError {
    /// The database file could not be opened.
    #[error("unable to open database: {0}")]
    OpenDatabase(String),

    /// SQL text failed to compile into a statement.
    #[error("prepare error: {0}")]
    Prepare(String),

    /// A statement failed while executing.
    #[error("execute error ({code}): {message}")]
    Execute { code: i32, message: String },

    /// A `NOT NULL` constraint rejected the statement.
    #[error("not null constraint violation ({code}): {message}")]
    NotNullConstraintViolation { code: i32, message: String },

    /// Any other constraint (unique, primary key, check, ...) rejected the statement.
    #[error("constraint violation ({code}): {message}")]
    ConstraintViolation { code: i32, message: String },

    /// A result row could not be rebuilt into the target type.
    #[error("row decode error: {0}")]
    JsonDecode(#[from] serde_json::Error),

    /// The type's descriptor could not be turned into a mapping.
    #[error("mapping error: {0}")]
    Mapping(#[from] MappingError),

    /// The operation needs a primary key and the table has none.
    #[error("table '{0}' has no primary key")]
    NoPrimaryKey(String),

    /// A named binding does not match any statement parameter.
    #[error("unknown statement parameter: {0}")]
    UnknownParameter(String),

    /// Connection configuration could not be parsed.
    #[error("configuration error: {0}")]
    Config(#[from] serde_yaml::Error),

    /// Reading a configuration file failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Any other SQLite failure.
    #[error("database error: {0}")]
    DatabaseError(#[from] rusqlite::Error),
}

impl SqliteError {
    /// Classifies a failure raised while stepping a statement.
    pub(crate) fn from_step(err: rusqlite::Error) -> Self {
        match err {
            rusqlite::Error::SqliteFailure(failure, message) => {
                let code = failure.extended_code;
                let message = message.unwrap_or_else(|| failure.to_string());
                match failure.code {
                    ErrorCode::ConstraintViolation if code == ffi::SQLITE_CONSTRAINT_NOTNULL => {
                        Self::NotNullConstraintViolation { code, message }
                    }
                    ErrorCode::ConstraintViolation => Self::ConstraintViolation { code, message },
                    _ => Self::Execute { code, message },
                }
            }
            other => Self::DatabaseError(other),
        }
    }

    /// Classifies a failure raised while compiling SQL text.
    pub(crate) fn from_prepare(err: rusqlite::Error) -> Self {
        match err {
            rusqlite::Error::SqliteFailure(failure, message) => {
                Self::Prepare(message.unwrap_or_else(|| failure.to_string()))
            }
            other => Self::Prepare(other.to_string()),
        }
    }

    /// Classifies a failure raised while opening a database.
    pub(crate) fn from_open(err: rusqlite::Error) -> Self {
        match err {
            rusqlite::Error::SqliteFailure(failure, message) => {
                Self::OpenDatabase(message.unwrap_or_else(|| failure.to_string()))
            }
            other => Self::OpenDatabase(other.to_string()),
        }
    }

    /// Whether the error is any kind of constraint violation.
    pub fn is_constraint_violation(&self) -> bool {
        matches!(
            self,
            Self::NotNullConstraintViolation { .. } | Self::ConstraintViolation { .. }
        )
    }
}

/// Convenience alias for results with [`SqliteError`].
pub type Result<T> = std::result::Result<T, SqliteError>;
