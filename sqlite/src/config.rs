//! Connection configuration.
//!
//! Describes where the database lives and how it is opened. Serializable so
//! applications can keep it in a YAML file next to their other settings.
//!
//! # Example YAML
//!
//! ```yaml
//! path: data/app.db
//! foreign_keys: true
//! open_flags:
//!   read_only: false
//!   create: true
//!   full_mutex: false
//!   shared_cache: false
//! ```

use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

use rusqlite::OpenFlags;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Flags controlling how the database file is opened.
///
/// Every field is optional in YAML; missing fields take the defaults of a
/// read-write connection that creates the file when needed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OpenFlagsConfig {
    /// Open the database read-only. Overrides `create`.
    pub read_only: bool,
    /// Create the database file if it does not exist.
    pub create: bool,
    /// Use the multi-thread threading mode.
    pub no_mutex: bool,
    /// Use the serialized threading mode.
    pub full_mutex: bool,
    /// Enable shared cache mode.
    pub shared_cache: bool,
    /// Disable shared cache mode.
    pub private_cache: bool,
    /// Interpret the path as a URI.
    pub uri: bool,
}

impl Default for OpenFlagsConfig {
    fn default() -> Self {
        Self {
            read_only: false,
            create: true,
            no_mutex: true,
            full_mutex: false,
            shared_cache: false,
            private_cache: false,
            uri: true,
        }
    }
}

impl OpenFlagsConfig {
    /// Converts to the engine's open flags.
    pub fn to_open_flags(&self) -> OpenFlags {
        let mut flags = if self.read_only {
            OpenFlags::SQLITE_OPEN_READ_ONLY
        } else {
            let mut flags = OpenFlags::SQLITE_OPEN_READ_WRITE;
            if self.create {
                flags |= OpenFlags::SQLITE_OPEN_CREATE;
            }
            flags
        };
        if self.no_mutex {
            flags |= OpenFlags::SQLITE_OPEN_NO_MUTEX;
        }
        if self.full_mutex {
            flags |= OpenFlags::SQLITE_OPEN_FULL_MUTEX;
        }
        if self.shared_cache {
            flags |= OpenFlags::SQLITE_OPEN_SHARED_CACHE;
        }
        if self.private_cache {
            flags |= OpenFlags::SQLITE_OPEN_PRIVATE_CACHE;
        }
        if self.uri {
            flags |= OpenFlags::SQLITE_OPEN_URI;
        }
        flags
    }
}

/// Settings used by [`Connection::open_with_config`](crate::Connection::open_with_config).
///
/// # Examples
///
/// ```
/// use tablekit_sqlite::ConnectionConfig;
///
/// let config = ConnectionConfig::from_yaml_str("path: app.db\n").unwrap();
/// assert_eq!(config.path.as_deref(), Some(std::path::Path::new("app.db")));
/// assert!(config.open_flags.create);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionConfig {
    /// Database file; `None` opens a private in-memory database.
    pub path: Option<PathBuf>,
    /// Open flags.
    pub open_flags: OpenFlagsConfig,
    /// Run `PRAGMA foreign_keys = ON` after opening.
    pub foreign_keys: bool,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            path: None,
            open_flags: OpenFlagsConfig::default(),
            foreign_keys: true,
        }
    }
}

impl ConnectionConfig {
    /// Configuration for a database file with default flags.
    pub fn for_path(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
            ..Self::default()
        }
    }

    /// Parses configuration from YAML text.
    ///
    /// # Errors
    ///
    /// Returns [`Config`](crate::SqliteError::Config) if parsing fails.
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Loads configuration from a YAML file.
    ///
    /// # Errors
    ///
    /// Returns [`Io`](crate::SqliteError::Io) if the file cannot be read, or
    /// [`Config`](crate::SqliteError::Config) if parsing fails.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let file = std::fs::File::open(path)?;
        let reader = BufReader::new(file);
        let config = serde_yaml::from_reader(reader)?;
        Ok(config)
    }

    /// Saves the configuration as YAML.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let file = std::fs::File::create(path)?;
        let writer = BufWriter::new(file);
        serde_yaml::to_writer(writer, self)?;
        Ok(())
    }
}
