//! Table mappings derived from explicit type descriptors.
//!
//! A type opts into mapping by implementing [`Table`]: it lists its fields as
//! [`Field`] descriptors (name, declared type, getter and optional setter)
//! and declares its column attributes. [`TableMapping::build`] combines the
//! two into an immutable column layout that the engine layer caches per type.
//!
//! # Example
//!
//! ```
//! use serde::Deserialize;
//! use tablekit_core::{CreateFlags, Field, FieldType, SqliteAttribute, Table, TableMapping};
//!
//! #[derive(Deserialize)]
//! struct Person {
//!     id: i64,
//!     name: String,
//! }
//!
//! impl Table for Person {
//!     fn fields() -> Vec<Field<Self>> {
//!         vec![
//!             Field::new("id", FieldType::Int, |p: &Person| p.id.into())
//!                 .with_setter(|p, v| p.id = v.as_i64().unwrap_or_default()),
//!             Field::new("name", FieldType::String, |p: &Person| p.name.as_str().into()),
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
//! let mapping = TableMapping::<Person>::build(CreateFlags::NONE).unwrap();
//! assert_eq!(mapping.table_name(), "Person");
//! assert!(mapping.has_auto_inc_pk());
//! assert_eq!(mapping.insert_columns().count(), 1);
//! ```

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::ops::{BitOr, BitOrAssign};

use serde::de::DeserializeOwned;
use tracing::debug;

use crate::attribute::{AttributeRegistry, SqliteAttribute};
use crate::error::MappingError;
use crate::sql_type::quote_identifier;
use crate::value::{FieldType, StorageClass, Value};

/// Descriptor for one field of a mapped type.
///
/// Holds plain function pointers, so descriptors are `Send + Sync` for any
/// `T` and can live inside a shared mapping cache.
pub struct Field<T> {
    name: &'static str,
    field_type: FieldType,
    get: fn(&T) -> Value,
    set: Option<fn(&mut T, Value)>,
}

impl<T> Field<T> {
    /// Creates a read-only field descriptor.
    pub fn new(name: &'static str, field_type: FieldType, get: fn(&T) -> Value) -> Self {
        Self {
            name,
            field_type,
            get,
            set: None,
        }
    }

    /// Attaches a setter, required for auto-increment primary keys.
    pub fn with_setter(mut self, set: fn(&mut T, Value)) -> Self {
        self.set = Some(set);
        self
    }

    /// Field name, which is also the column name.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Declared field type.
    pub fn field_type(&self) -> FieldType {
        self.field_type
    }

    /// Reads the field from an object.
    pub fn get(&self, obj: &T) -> Value {
        (self.get)(obj)
    }

    /// Writes the field on an object. Returns `false` when there is no setter.
    pub fn set(&self, obj: &mut T, value: Value) -> bool {
        match self.set {
            Some(set) => {
                set(obj, value);
                true
            }
            None => false,
        }
    }

    /// Whether a setter is attached.
    pub fn has_setter(&self) -> bool {
        self.set.is_some()
    }
}

impl<T> Clone for Field<T> {
    fn clone(&self) -> Self {
        Self {
            name: self.name,
            field_type: self.field_type,
            get: self.get,
            set: self.set,
        }
    }
}

impl<T> fmt::Debug for Field<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Field")
            .field("name", &self.name)
            .field("field_type", &self.field_type)
            .field("has_setter", &self.has_setter())
            .finish()
    }
}

/// A type that can be stored as rows of a table.
///
/// Rows are rebuilt through `serde`: every stored column is placed in a map
/// keyed by field name and deserialized into `Self`. Ignored fields therefore
/// need `#[serde(default)]`.
pub trait Table: DeserializeOwned + Sized + 'static {
    /// Field descriptors in column order.
    fn fields() -> Vec<Field<Self>>;

    /// Declared column attributes.
    fn attributes() -> Vec<SqliteAttribute> {
        Vec::new()
    }

    /// Name used for the table when no [`Attribute::TableName`](crate::Attribute::TableName)
    /// entry is declared.
    fn type_name() -> &'static str {
        short_type_name(std::any::type_name::<Self>())
    }

    /// Whether the table is created `WITHOUT ROWID`.
    fn without_rowid() -> bool {
        false
    }
}

/// Strips the module path and generic arguments from a Rust type name.
fn short_type_name(full: &'static str) -> &'static str {
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base)
}

/// Flags controlling implicit key/index conventions and full-text tables.
///
/// Part of a mapping's identity: asking for a cached type with different
/// non-default flags rebuilds its mapping.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct CreateFlags(u32);

impl CreateFlags {
    /// Default creation options.
    pub const NONE: Self = Self(0x000);
    /// A field named `id` (case-insensitive) becomes the primary key.
    pub const IMPLICIT_PK: Self = Self(0x001);
    /// Fields whose name ends in `id` (case-insensitive) are indexed.
    pub const IMPLICIT_INDEX: Self = Self(0x002);
    /// Both implicit conventions.
    pub const ALL_IMPLICIT: Self = Self(0x003);
    /// The primary key is forced to auto-increment.
    pub const AUTO_INC_PK: Self = Self(0x004);
    /// Create a virtual table using FTS3.
    pub const FULL_TEXT_SEARCH3: Self = Self(0x100);
    /// Create a virtual table using FTS4.
    pub const FULL_TEXT_SEARCH4: Self = Self(0x200);

    /// Raw bit representation.
    pub fn bits(self) -> u32 {
        self.0
    }

    /// Whether every bit of `other` is set.
    pub fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// Whether no flag is set.
    pub fn is_none(self) -> bool {
        self.0 == 0
    }

    /// Whether either full-text search mode is requested.
    pub fn is_full_text(self) -> bool {
        self.contains(Self::FULL_TEXT_SEARCH3) || self.contains(Self::FULL_TEXT_SEARCH4)
    }
}

impl BitOr for CreateFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for CreateFlags {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl fmt::Debug for CreateFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CreateFlags({:#05x})", self.0)
    }
}

/// Column metadata derived from one field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    /// Column name (identical to the field name).
    pub name: String,
    /// Declared field type.
    pub field_type: FieldType,
    /// Column is the primary key.
    pub is_pk: bool,
    /// Column is auto-incrementing.
    pub is_auto_inc: bool,
    /// Column accepts NULL.
    pub is_nullable: bool,
    /// An index is created for the column.
    pub is_indexed: bool,
    /// Field is not stored.
    pub ignored: bool,
    position: usize,
}

impl Column {
    /// Creates column metadata for the field at `position`.
    pub fn new(name: impl Into<String>, field_type: FieldType, position: usize) -> Self {
        Self {
            name: name.into(),
            field_type,
            is_pk: false,
            is_auto_inc: false,
            is_nullable: true,
            is_indexed: false,
            ignored: false,
            position,
        }
    }

    /// Storage class of the column.
    pub fn storage_class(&self) -> StorageClass {
        self.field_type.storage_class()
    }

    /// Index of the backing field in the type's descriptor list.
    pub fn position(&self) -> usize {
        self.position
    }
}

/// The derived schema of one mapped type.
///
/// Built once per type and never mutated afterwards.
pub struct TableMapping<T> {
    table_name: String,
    create_flags: CreateFlags,
    columns: Vec<Column>,
    fields: Vec<Field<T>>,
    insert_columns: Vec<usize>,
    insert_or_replace_columns: Vec<usize>,
    pk: Option<usize>,
    auto_inc_pk: Option<usize>,
    without_rowid: bool,
    query_by_primary_key_sql: String,
    by_name: HashMap<String, usize>,
}

impl<T: Table> TableMapping<T> {
    /// Derives the mapping of `T`.
    ///
    /// # Errors
    ///
    /// Returns a [`MappingError`] when the declared attributes are
    /// contradictory (see the error variants).
    pub fn build(create_flags: CreateFlags) -> Result<Self, MappingError> {
        Self::from_descriptor(
            T::type_name(),
            T::fields(),
            &T::attributes(),
            T::without_rowid(),
            create_flags,
        )
    }
}

impl<T> TableMapping<T> {
    /// Derives a mapping from an explicit descriptor.
    ///
    /// Attribute entries naming a field that is not in `fields` are skipped.
    pub fn from_descriptor(
        type_name: &str,
        fields: Vec<Field<T>>,
        attributes: &[SqliteAttribute],
        without_rowid: bool,
        create_flags: CreateFlags,
    ) -> Result<Self, MappingError> {
        let registry = AttributeRegistry::parse(attributes);
        let table_name = registry
            .table_name()
            .map_or_else(|| type_name.to_string(), str::to_string);

        let mut seen = HashSet::new();
        let mut columns = Vec::with_capacity(fields.len());
        for (position, field) in fields.iter().enumerate() {
            if !seen.insert(field.name()) {
                return Err(MappingError::DuplicateField {
                    table: table_name,
                    field: field.name().to_string(),
                });
            }
            let attrs = registry.for_field(field.name());
            let mut column = Column::new(field.name(), field.field_type(), position);
            column.is_pk = attrs.primary_key;
            column.is_auto_inc = attrs.auto_increment;
            column.is_nullable = !attrs.not_null;
            column.is_indexed = attrs.indexed;
            column.ignored = attrs.ignore;
            columns.push(column);
        }

        for name in registry.field_names() {
            if !seen.contains(name) {
                debug!(table = %table_name, field = name, "attribute names unknown field, skipped");
            }
        }

        apply_create_flags(&mut columns, create_flags);

        let mut pk: Option<usize> = None;
        for (idx, column) in columns.iter().enumerate() {
            if column.ignored {
                continue;
            }
            if column.is_auto_inc && !column.is_pk {
                return Err(MappingError::AutoIncrementWithoutPrimaryKey {
                    table: table_name,
                    column: column.name.clone(),
                });
            }
            if column.is_pk {
                if let Some(first) = pk {
                    return Err(MappingError::MultiplePrimaryKeys {
                        table: table_name,
                        first: columns[first].name.clone(),
                        second: column.name.clone(),
                    });
                }
                pk = Some(idx);
            }
        }

        // AUTOINCREMENT is only meaningful on an INTEGER PRIMARY KEY.
        let auto_inc_pk = pk.filter(|&idx| {
            columns[idx].is_auto_inc && columns[idx].storage_class() == StorageClass::Integer
        });
        if let Some(idx) = auto_inc_pk {
            if !fields[idx].has_setter() {
                return Err(MappingError::MissingSetter {
                    table: table_name,
                    column: columns[idx].name.clone(),
                });
            }
        }
        if without_rowid && pk.is_none() {
            return Err(MappingError::WithoutRowIdRequiresPrimaryKey(table_name));
        }
        if let Some(idx) = auto_inc_pk.filter(|_| without_rowid) {
            return Err(MappingError::WithoutRowIdAutoIncrement {
                table: table_name,
                column: columns[idx].name.clone(),
            });
        }

        let insert_or_replace_columns: Vec<usize> = columns
            .iter()
            .enumerate()
            .filter(|(_, c)| !c.ignored)
            .map(|(idx, _)| idx)
            .collect();
        let insert_columns: Vec<usize> = insert_or_replace_columns
            .iter()
            .copied()
            .filter(|&idx| Some(idx) != auto_inc_pk)
            .collect();
        let by_name = insert_or_replace_columns
            .iter()
            .map(|&idx| (columns[idx].name.clone(), idx))
            .collect();

        let table = quote_identifier(&table_name);
        let query_by_primary_key_sql = match pk {
            Some(idx) => format!(
                "SELECT * FROM {table} WHERE {} = ?",
                quote_identifier(&columns[idx].name)
            ),
            None => format!("SELECT * FROM {table} LIMIT 1"),
        };

        Ok(Self {
            table_name,
            create_flags,
            columns,
            fields,
            insert_columns,
            insert_or_replace_columns,
            pk,
            auto_inc_pk,
            without_rowid,
            query_by_primary_key_sql,
            by_name,
        })
    }

    /// Table name.
    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    /// Flags the mapping was built with.
    pub fn create_flags(&self) -> CreateFlags {
        self.create_flags
    }

    /// Every column, including ignored ones, in field order.
    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    /// Columns that are stored in the table.
    pub fn stored_columns(&self) -> impl Iterator<Item = &Column> {
        self.insert_or_replace_columns.iter().map(|&idx| &self.columns[idx])
    }

    /// Columns written by a plain INSERT (no auto-increment key).
    pub fn insert_columns(&self) -> impl Iterator<Item = &Column> {
        self.insert_columns.iter().map(|&idx| &self.columns[idx])
    }

    /// Columns written by INSERT OR REPLACE.
    pub fn insert_or_replace_columns(&self) -> impl Iterator<Item = &Column> {
        self.stored_columns()
    }

    /// Whether the mapping has at least one stored column.
    pub fn has_columns(&self) -> bool {
        !self.insert_or_replace_columns.is_empty()
    }

    /// Primary key column.
    pub fn pk(&self) -> Option<&Column> {
        self.pk.map(|idx| &self.columns[idx])
    }

    /// Auto-increment primary key column.
    pub fn auto_inc_pk(&self) -> Option<&Column> {
        self.auto_inc_pk.map(|idx| &self.columns[idx])
    }

    /// Whether the primary key is assigned by the engine.
    pub fn has_auto_inc_pk(&self) -> bool {
        self.auto_inc_pk.is_some()
    }

    /// Whether the table is created `WITHOUT ROWID`.
    pub fn without_rowid(&self) -> bool {
        self.without_rowid
    }

    /// `SELECT` for one row by primary key.
    ///
    /// Tables without a primary key fall back to the first row.
    pub fn query_by_primary_key_sql(&self) -> &str {
        &self.query_by_primary_key_sql
    }

    /// Looks up a stored column by name.
    pub fn find_column(&self, name: &str) -> Option<&Column> {
        self.by_name.get(name).map(|&idx| &self.columns[idx])
    }

    /// Reads a column's value from an object.
    pub fn column_value(&self, obj: &T, column: &Column) -> Value {
        self.fields[column.position].get(obj)
    }

    /// Reads the primary key value from an object.
    pub fn pk_value(&self, obj: &T) -> Option<Value> {
        self.pk().map(|pk| self.column_value(obj, pk))
    }

    /// Writes an engine-assigned row id into the auto-increment key.
    ///
    /// Returns `false` when the mapping has no auto-increment key.
    pub fn set_auto_inc_pk(&self, obj: &mut T, rowid: i64) -> bool {
        match self.auto_inc_pk {
            Some(idx) => self.fields[idx].set(obj, Value::Integer(rowid)),
            None => false,
        }
    }
}

impl<T> fmt::Debug for TableMapping<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TableMapping")
            .field("table_name", &self.table_name)
            .field("create_flags", &self.create_flags)
            .field("columns", &self.columns)
            .field("without_rowid", &self.without_rowid)
            .finish_non_exhaustive()
    }
}

fn apply_create_flags(columns: &mut [Column], flags: CreateFlags) {
    if flags.contains(CreateFlags::IMPLICIT_PK) && !columns.iter().any(|c| c.is_pk && !c.ignored)
    {
        if let Some(column) = columns
            .iter_mut()
            .find(|c| !c.ignored && c.name.eq_ignore_ascii_case("id"))
        {
            column.is_pk = true;
        }
    }

    if flags.contains(CreateFlags::AUTO_INC_PK) {
        for column in columns.iter_mut() {
            if column.is_pk && column.storage_class() == StorageClass::Integer {
                column.is_auto_inc = true;
            }
        }
    }

    if flags.contains(CreateFlags::IMPLICIT_INDEX) {
        for column in columns.iter_mut() {
            if !column.is_pk && !column.ignored && column.name.to_ascii_lowercase().ends_with("id")
            {
                column.is_indexed = true;
            }
        }
    }
}
