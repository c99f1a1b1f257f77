//! Declared column attributes and their per-field registry.
//!
//! A [`Table`](crate::Table) type declares its attributes as a flat list of
//! [`SqliteAttribute`] entries, one attribute per entry. A field may appear
//! in several entries. [`AttributeRegistry::parse`] folds that list into one
//! [`ColumnAttributes`] record per field plus the optional explicit table
//! name.

use std::collections::HashMap;

/// A single attribute that can be attached to a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Attribute {
    /// No effect; accepted so descriptors can list a field explicitly.
    None,
    /// Column is the table's primary key.
    PrimaryKey,
    /// Primary key values are assigned by the engine.
    AutoIncrement,
    /// Column value can not be NULL.
    NotNull,
    /// An index is created for the column.
    Indexed,
    /// The entry's name is the explicit table name rather than a field.
    TableName,
    /// Field is not stored in the table.
    Ignore,
}

/// A `(name, attribute)` pair declared by a table type.
///
/// # Examples
///
/// ```
/// use tablekit_core::{Attribute, SqliteAttribute};
///
/// let attrs = vec![
///     SqliteAttribute::table_name("people"),
///     SqliteAttribute::new("id", Attribute::PrimaryKey),
///     SqliteAttribute::new("id", Attribute::AutoIncrement),
/// ];
/// assert_eq!(attrs[1].name, "id");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SqliteAttribute {
    /// Field name, or the table name for [`Attribute::TableName`].
    pub name: String,
    /// The attribute applied.
    pub attribute: Attribute,
}

impl SqliteAttribute {
    /// Creates a new attribute entry.
    pub fn new(name: impl Into<String>, attribute: Attribute) -> Self {
        Self {
            name: name.into(),
            attribute,
        }
    }

    /// Declares the explicit table name.
    pub fn table_name(name: impl Into<String>) -> Self {
        Self::new(name, Attribute::TableName)
    }

    /// Marks a field as primary key.
    pub fn primary_key(field: impl Into<String>) -> Self {
        Self::new(field, Attribute::PrimaryKey)
    }

    /// Marks a field as auto-incrementing.
    pub fn auto_increment(field: impl Into<String>) -> Self {
        Self::new(field, Attribute::AutoIncrement)
    }

    /// Marks a field as `NOT NULL`.
    pub fn not_null(field: impl Into<String>) -> Self {
        Self::new(field, Attribute::NotNull)
    }

    /// Requests an index on a field.
    pub fn indexed(field: impl Into<String>) -> Self {
        Self::new(field, Attribute::Indexed)
    }

    /// Excludes a field from the table.
    pub fn ignore(field: impl Into<String>) -> Self {
        Self::new(field, Attribute::Ignore)
    }
}

/// Attributes collected for one field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ColumnAttributes {
    pub primary_key: bool,
    pub auto_increment: bool,
    pub not_null: bool,
    pub indexed: bool,
    pub ignore: bool,
}

impl ColumnAttributes {
    fn apply(&mut self, attribute: Attribute) {
        match attribute {
            Attribute::PrimaryKey => self.primary_key = true,
            Attribute::AutoIncrement => self.auto_increment = true,
            Attribute::NotNull => self.not_null = true,
            Attribute::Indexed => self.indexed = true,
            Attribute::Ignore => self.ignore = true,
            Attribute::None | Attribute::TableName => {}
        }
    }
}

/// Per-field view over a type's declared attribute list.
#[derive(Debug, Clone, Default)]
pub struct AttributeRegistry {
    table_name: Option<String>,
    columns: HashMap<String, ColumnAttributes>,
}

impl AttributeRegistry {
    /// Folds a declared attribute list into per-field attribute sets.
    ///
    /// When several [`Attribute::TableName`] entries are present the first
    /// one wins.
    pub fn parse(attributes: &[SqliteAttribute]) -> Self {
        let mut registry = Self::default();
        for entry in attributes {
            if entry.attribute == Attribute::TableName {
                if registry.table_name.is_none() {
                    registry.table_name = Some(entry.name.clone());
                }
                continue;
            }
            registry
                .columns
                .entry(entry.name.clone())
                .or_default()
                .apply(entry.attribute);
        }
        registry
    }

    /// Explicit table name, if one was declared.
    pub fn table_name(&self) -> Option<&str> {
        self.table_name.as_deref()
    }

    /// Attributes for a field; fields without entries get the defaults.
    pub fn for_field(&self, name: &str) -> ColumnAttributes {
        self.columns.get(name).copied().unwrap_or_default()
    }

    /// Names of every field that carries at least one attribute.
    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.columns.keys().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_merges_entries_per_field() {
        let registry = AttributeRegistry::parse(&[
            SqliteAttribute::primary_key("id"),
            SqliteAttribute::auto_increment("id"),
            SqliteAttribute::not_null("name"),
        ]);
        let id = registry.for_field("id");
        assert!(id.primary_key);
        assert!(id.auto_increment);
        assert!(!id.not_null);
        assert!(registry.for_field("name").not_null);
    }

    #[test]
    fn test_missing_field_has_default_attributes() {
        let registry = AttributeRegistry::parse(&[]);
        assert_eq!(registry.for_field("age"), ColumnAttributes::default());
        assert!(registry.table_name().is_none());
    }

    #[test]
    fn test_table_name_first_entry_wins() {
        let registry = AttributeRegistry::parse(&[
            SqliteAttribute::table_name("people"),
            SqliteAttribute::table_name("persons"),
        ]);
        assert_eq!(registry.table_name(), Some("people"));
        assert_eq!(registry.field_names().count(), 0);
    }

    #[test]
    fn test_none_attribute_registers_field() {
        let registry = AttributeRegistry::parse(&[SqliteAttribute::new("age", Attribute::None)]);
        assert_eq!(registry.field_names().collect::<Vec<_>>(), vec!["age"]);
        assert_eq!(registry.for_field("age"), ColumnAttributes::default());
    }
}
