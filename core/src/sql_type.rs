//! SQL type mapping and column declaration rendering.

use crate::mapping::Column;
use crate::value::StorageClass;

/// Quotes an identifier for use in generated SQL.
///
/// Embedded double quotes are doubled, so any field or table name is safe.
pub fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Returns the SQL storage type for a column.
pub fn sql_type(column: &Column) -> StorageClass {
    column.storage_class()
}

/// Renders a column declaration for `CREATE TABLE` / `ALTER TABLE ADD COLUMN`.
///
/// `AUTOINCREMENT` is only emitted for an `INTEGER PRIMARY KEY`; SQLite
/// rejects it anywhere else.
///
/// # Examples
///
/// ```
/// use tablekit_core::{Column, FieldType, sql_declaration};
///
/// let mut id = Column::new("id", FieldType::Int, 0);
/// id.is_pk = true;
/// id.is_auto_inc = true;
/// assert_eq!(sql_declaration(&id), "\"id\" INTEGER PRIMARY KEY AUTOINCREMENT");
/// ```
pub fn sql_declaration(column: &Column) -> String {
    let storage = sql_type(column);
    let mut decl = format!("{} {}", quote_identifier(&column.name), storage.as_sql());
    if column.is_pk {
        decl.push_str(" PRIMARY KEY");
        if column.is_auto_inc && storage == StorageClass::Integer {
            decl.push_str(" AUTOINCREMENT");
        }
    }
    if !column.is_nullable {
        decl.push_str(" NOT NULL");
    }
    decl
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::FieldType;

    #[test]
    fn test_quote_identifier() {
        assert_eq!(quote_identifier("name"), "\"name\"");
        assert_eq!(quote_identifier("we\"ird"), "\"we\"\"ird\"");
    }

    #[test]
    fn test_plain_declarations() {
        assert_eq!(
            sql_declaration(&Column::new("age", FieldType::Int, 0)),
            "\"age\" INTEGER"
        );
        assert_eq!(
            sql_declaration(&Column::new("active", FieldType::Bool, 0)),
            "\"active\" INTEGER"
        );
        assert_eq!(
            sql_declaration(&Column::new("score", FieldType::Double, 0)),
            "\"score\" REAL"
        );
        assert_eq!(
            sql_declaration(&Column::new("born", FieldType::Timestamp, 0)),
            "\"born\" REAL"
        );
        assert_eq!(
            sql_declaration(&Column::new("home", FieldType::Uri, 0)),
            "\"home\" TEXT"
        );
        assert_eq!(
            sql_declaration(&Column::new("avatar", FieldType::Bytes, 0)),
            "\"avatar\" BLOB"
        );
    }

    #[test]
    fn test_not_null_declaration() {
        let mut column = Column::new("name", FieldType::String, 0);
        column.is_nullable = false;
        assert_eq!(sql_declaration(&column), "\"name\" TEXT NOT NULL");
    }

    #[test]
    fn test_autoincrement_requires_integer_primary_key() {
        let mut text_pk = Column::new("code", FieldType::String, 0);
        text_pk.is_pk = true;
        text_pk.is_auto_inc = true;
        assert_eq!(sql_declaration(&text_pk), "\"code\" TEXT PRIMARY KEY");

        let mut not_pk = Column::new("seq", FieldType::Int, 0);
        not_pk.is_auto_inc = true;
        assert_eq!(sql_declaration(&not_pk), "\"seq\" INTEGER");
    }
}
