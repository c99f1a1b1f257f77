//! Creating and migrating mapped tables.
//!
//! [`create_or_migrate`] compares a [`TableMapping`] against what the
//! database already holds:
//!
//! - no stored columns: nothing is executed, [`CreateTableResult::NoColumnsFound`]
//! - table absent: `CREATE TABLE IF NOT EXISTS` (or a full-text virtual table)
//! - table present: one `ALTER TABLE ... ADD COLUMN` per missing column
//!
//! # Partial migrations
//!
//! Each `ALTER TABLE` runs as its own statement. If one fails, the columns
//! added before it stay added. Existing columns are matched by name only;
//! their declared types are never compared with the mapping.
//!
//! A missing column declared `NOT NULL` is added with that constraint and no
//! default. SQLite rejects such an `ALTER TABLE`, so migrating a table to a
//! mapping that gains a not-null column fails.

use std::collections::HashSet;

use rusqlite::Connection;
use tracing::info;

use tablekit_core::{CreateFlags, TableMapping, quote_identifier, sql_declaration};

use crate::command::Command;
use crate::error::Result;

/// Outcome of [`create_or_migrate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreateTableResult {
    /// The table did not exist and was created.
    Created,
    /// The table existed; missing columns (possibly none) were added.
    Migrated,
    /// The mapping has no stored columns; nothing was executed.
    NoColumnsFound,
}

/// A column as reported by `PRAGMA table_info`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExistingColumn {
    pub name: String,
    pub declared_type: String,
    pub not_null: bool,
    pub pk: bool,
}

/// Reads the columns of `table`. Returns an empty list when the table does not exist.
pub fn table_info(conn: &Connection, table: &str) -> Result<Vec<ExistingColumn>> {
    let sql = format!("PRAGMA table_info({})", quote_identifier(table));
    let mut stmt = conn.prepare(&sql)?;
    let columns = stmt
        .query_map([], |row| {
            Ok(ExistingColumn {
                name: row.get("name")?,
                declared_type: row.get("type")?,
                not_null: row.get::<_, i64>("notnull")? != 0,
                pk: row.get::<_, i64>("pk")? != 0,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(columns)
}

/// Builds the `CREATE TABLE` (or `CREATE VIRTUAL TABLE`) statement for a mapping.
///
/// Full-text tables list bare column names; FTS3 wins when both FTS flags are set.
pub fn create_table_sql<T>(mapping: &TableMapping<T>) -> String {
    let table = quote_identifier(mapping.table_name());
    let flags = mapping.create_flags();

    if flags.is_full_text() {
        let module = if flags.contains(CreateFlags::FULL_TEXT_SEARCH3) {
            "FTS3"
        } else {
            "FTS4"
        };
        let columns: Vec<String> = mapping
            .stored_columns()
            .map(|c| quote_identifier(&c.name))
            .collect();
        return format!(
            "CREATE VIRTUAL TABLE IF NOT EXISTS {table} USING {module}({})",
            columns.join(", ")
        );
    }

    let decls: Vec<String> = mapping.stored_columns().map(sql_declaration).collect();
    let mut sql = format!("CREATE TABLE IF NOT EXISTS {table} ({})", decls.join(", "));
    if mapping.without_rowid() {
        sql.push_str(" WITHOUT ROWID");
    }
    sql
}

/// Builds one `ALTER TABLE ... ADD COLUMN` statement per mapped column
/// missing from `existing`, in mapping order.
pub fn migration_sql<T>(mapping: &TableMapping<T>, existing: &[ExistingColumn]) -> Vec<String> {
    let present: HashSet<&str> = existing.iter().map(|c| c.name.as_str()).collect();
    let table = quote_identifier(mapping.table_name());
    mapping
        .stored_columns()
        .filter(|c| !present.contains(c.name.as_str()))
        .map(|c| format!("ALTER TABLE {table} ADD COLUMN {}", sql_declaration(c)))
        .collect()
}

/// Builds a `CREATE [UNIQUE] INDEX IF NOT EXISTS` statement.
///
/// # Examples
///
/// ```
/// use tablekit_sqlite::create_index_sql;
///
/// assert_eq!(
///     create_index_sql("Person_age", "Person", &["age"], false),
///     "CREATE INDEX IF NOT EXISTS \"Person_age\" ON \"Person\"(\"age\")"
/// );
/// ```
pub fn create_index_sql(index_name: &str, table: &str, columns: &[&str], unique: bool) -> String {
    let columns: Vec<String> = columns.iter().map(|c| quote_identifier(c)).collect();
    format!(
        "CREATE {}INDEX IF NOT EXISTS {} ON {}({})",
        if unique { "UNIQUE " } else { "" },
        quote_identifier(index_name),
        quote_identifier(table),
        columns.join(", ")
    )
}

/// Index statements for every indexed column. Full-text tables get none.
pub fn index_sql<T>(mapping: &TableMapping<T>) -> Vec<String> {
    if mapping.create_flags().is_full_text() {
        return Vec::new();
    }
    let table = mapping.table_name();
    mapping
        .stored_columns()
        .filter(|c| c.is_indexed)
        .map(|c| create_index_sql(&format!("{table}_{}", c.name), table, &[&c.name], false))
        .collect()
}

/// Creates the mapped table, or adds the columns it is missing.
///
/// # Errors
///
/// Any failing statement is returned as is. See the module docs for what a
/// failure midway through a migration leaves behind.
pub fn create_or_migrate<T>(
    conn: &Connection,
    mapping: &TableMapping<T>,
) -> Result<CreateTableResult> {
    if !mapping.has_columns() {
        return Ok(CreateTableResult::NoColumnsFound);
    }

    let existing = table_info(conn, mapping.table_name())?;
    let result = if existing.is_empty() {
        Command::new(conn, create_table_sql(mapping)).execute_non_query()?;
        info!(table = mapping.table_name(), "created table");
        CreateTableResult::Created
    } else {
        for sql in migration_sql(mapping, &existing) {
            Command::new(conn, sql.as_str()).execute_non_query()?;
            info!(table = mapping.table_name(), %sql, "added missing column");
        }
        CreateTableResult::Migrated
    };

    for sql in index_sql(mapping) {
        Command::new(conn, sql).execute_non_query()?;
    }
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tablekit_core::{Field, FieldType, SqliteAttribute};

    struct Person {
        id: i64,
        name: String,
        age: i64,
    }

    fn fields() -> Vec<Field<Person>> {
        vec![
            Field::new("id", FieldType::Int, |p: &Person| p.id.into())
                .with_setter(|p, v| p.id = v.as_i64().unwrap_or_default()),
            Field::new("name", FieldType::String, |p: &Person| p.name.as_str().into()),
            Field::new("age", FieldType::Int, |p: &Person| p.age.into()),
        ]
    }

    fn mapping(attrs: &[SqliteAttribute], flags: CreateFlags) -> TableMapping<Person> {
        TableMapping::from_descriptor("Person", fields(), attrs, false, flags).unwrap()
    }

    fn keyed() -> TableMapping<Person> {
        mapping(
            &[
                SqliteAttribute::primary_key("id"),
                SqliteAttribute::auto_increment("id"),
                SqliteAttribute::not_null("name"),
            ],
            CreateFlags::NONE,
        )
    }

    #[test]
    fn test_create_table_sql() {
        assert_eq!(
            create_table_sql(&keyed()),
            "CREATE TABLE IF NOT EXISTS \"Person\" (\"id\" INTEGER PRIMARY KEY AUTOINCREMENT, \
             \"name\" TEXT NOT NULL, \"age\" INTEGER)"
        );
    }

    #[test]
    fn test_without_rowid_suffix() {
        let m = TableMapping::from_descriptor(
            "Person",
            fields(),
            &[SqliteAttribute::primary_key("name")],
            true,
            CreateFlags::NONE,
        )
        .unwrap();
        assert!(create_table_sql(&m).ends_with(") WITHOUT ROWID"));
    }

    #[test]
    fn test_full_text_table_sql() {
        let m = mapping(&[SqliteAttribute::indexed("age")], CreateFlags::FULL_TEXT_SEARCH4);
        assert_eq!(
            create_table_sql(&m),
            "CREATE VIRTUAL TABLE IF NOT EXISTS \"Person\" USING FTS4(\"id\", \"name\", \"age\")"
        );
        assert!(index_sql(&m).is_empty());

        let m = mapping(&[], CreateFlags::FULL_TEXT_SEARCH3);
        assert!(create_table_sql(&m).contains("USING FTS3("));
    }

    #[test]
    fn test_create_then_migrate() {
        let conn = Connection::open_in_memory().unwrap();
        let m = keyed();
        assert_eq!(create_or_migrate(&conn, &m).unwrap(), CreateTableResult::Created);
        assert_eq!(create_or_migrate(&conn, &m).unwrap(), CreateTableResult::Migrated);

        let names: Vec<_> = table_info(&conn, "Person")
            .unwrap()
            .into_iter()
            .map(|c| c.name)
            .collect();
        assert_eq!(names, vec!["id", "name", "age"]);
    }

    #[test]
    fn test_migration_adds_only_missing_columns() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("CREATE TABLE \"Person\" (\"id\" INTEGER PRIMARY KEY, \"name\" TEXT);")
            .unwrap();
        let m = keyed();
        let existing = table_info(&conn, "Person").unwrap();
        assert_eq!(
            migration_sql(&m, &existing),
            vec!["ALTER TABLE \"Person\" ADD COLUMN \"age\" INTEGER"]
        );
        assert_eq!(create_or_migrate(&conn, &m).unwrap(), CreateTableResult::Migrated);
        assert_eq!(table_info(&conn, "Person").unwrap().len(), 3);
    }

    #[test]
    fn test_adding_not_null_column_fails() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("CREATE TABLE \"Person\" (\"id\" INTEGER PRIMARY KEY, \"age\" INTEGER);")
            .unwrap();
        let m = keyed();
        let existing = table_info(&conn, "Person").unwrap();
        assert_eq!(
            migration_sql(&m, &existing),
            vec!["ALTER TABLE \"Person\" ADD COLUMN \"name\" TEXT NOT NULL"]
        );
        assert!(create_or_migrate(&conn, &m).is_err());
        assert_eq!(table_info(&conn, "Person").unwrap().len(), 2);
    }

    #[test]
    fn test_table_info_flags() {
        let conn = Connection::open_in_memory().unwrap();
        create_or_migrate(&conn, &keyed()).unwrap();
        let info = table_info(&conn, "Person").unwrap();
        assert!(info[0].pk);
        assert_eq!(info[0].declared_type, "INTEGER");
        assert!(info[1].not_null);
        assert!(!info[2].not_null);
        assert!(table_info(&conn, "Missing").unwrap().is_empty());
    }

    #[test]
    fn test_indexed_columns_get_indexes() {
        let conn = Connection::open_in_memory().unwrap();
        let m = mapping(&[SqliteAttribute::indexed("age")], CreateFlags::NONE);
        create_or_migrate(&conn, &m).unwrap();
        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'index' AND name = 'Person_age'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn test_no_columns_found() {
        let conn = Connection::open_in_memory().unwrap();
        let m = mapping(
            &[
                SqliteAttribute::ignore("id"),
                SqliteAttribute::ignore("name"),
                SqliteAttribute::ignore("age"),
            ],
            CreateFlags::NONE,
        );
        assert_eq!(
            create_or_migrate(&conn, &m).unwrap(),
            CreateTableResult::NoColumnsFound
        );
        assert!(table_info(&conn, "Person").unwrap().is_empty());
    }

    #[test]
    fn test_unique_index_sql() {
        assert_eq!(
            create_index_sql("ix", "t", &["a", "b"], true),
            "CREATE UNIQUE INDEX IF NOT EXISTS \"ix\" ON \"t\"(\"a\", \"b\")"
        );
    }
}
