//! Immutable `SELECT` builder.
//!
//! Every modifier returns a new [`SelectQuery`]; the receiver is never
//! changed, so a base query can be refined in several directions.
//!
//! # Example
//!
//! ```
//! use tablekit_core::{Ordering, SelectQuery};
//!
//! let base = SelectQuery::new("Person");
//! let top = base.order_by(Ordering::Desc("age".into())).limit(1);
//!
//! assert_eq!(base.select_sql(), "SELECT * FROM \"Person\"");
//! assert_eq!(
//!     top.select_sql(),
//!     "SELECT * FROM \"Person\" ORDER BY \"age\" DESC LIMIT 1"
//! );
//! ```

use crate::sql_type::quote_identifier;
use crate::value::Value;

/// Sort direction for one column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Ordering {
    /// Ascending.
    Asc(String),
    /// Descending.
    Desc(String),
}

impl Ordering {
    /// Renders the `ORDER BY` term.
    pub fn declaration(&self) -> String {
        match self {
            Self::Asc(name) => format!("{} ASC", quote_identifier(name)),
            Self::Desc(name) => format!("{} DESC", quote_identifier(name)),
        }
    }
}

/// Accumulated state of a read query against one table.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SelectQuery {
    table: String,
    distinct: Option<Vec<String>>,
    conditions: Vec<String>,
    params: Vec<Value>,
    order_bys: Vec<Ordering>,
    limit: Option<i64>,
    offset: Option<i64>,
}

impl SelectQuery {
    /// Starts an unrestricted query over `table`.
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            ..Self::default()
        }
    }

    /// Table the query reads from.
    pub fn table(&self) -> &str {
        &self.table
    }

    /// Caps the number of rows returned.
    pub fn limit(&self, n: i64) -> Self {
        let mut q = self.clone();
        q.limit = Some(n);
        q
    }

    /// Skips the first `n` rows.
    pub fn offset(&self, n: i64) -> Self {
        let mut q = self.clone();
        q.offset = Some(n);
        q
    }

    /// Adds a raw SQL condition; conditions are joined with `AND`.
    ///
    /// `params` bind to the `?` placeholders of the condition, in order.
    pub fn where_sql(&self, condition: impl Into<String>, params: Vec<Value>) -> Self {
        let mut q = self.clone();
        q.conditions.push(condition.into());
        q.params.extend(params);
        q
    }

    /// Appends a sort key after any existing ones.
    pub fn order_by(&self, ordering: Ordering) -> Self {
        let mut q = self.clone();
        q.order_bys.push(ordering);
        q
    }

    /// Selects only distinct combinations of `columns`.
    pub fn distinct<I, S>(&self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut q = self.clone();
        q.distinct = Some(columns.into_iter().map(Into::into).collect());
        q
    }

    /// Parameters bound by the `WHERE` conditions.
    pub fn params(&self) -> &[Value] {
        &self.params
    }

    /// Current limit.
    pub fn limit_value(&self) -> Option<i64> {
        self.limit
    }

    /// Current offset.
    pub fn offset_value(&self) -> Option<i64> {
        self.offset
    }

    /// Compiles the row-returning `SELECT`.
    pub fn select_sql(&self) -> String {
        let selection = self.distinct_selection().unwrap_or_else(|| "*".to_string());
        let mut sql = self.base_sql(&selection);

        if !self.order_bys.is_empty() {
            let terms: Vec<String> = self.order_bys.iter().map(Ordering::declaration).collect();
            sql.push_str(" ORDER BY ");
            sql.push_str(&terms.join(", "));
        }
        match (self.limit, self.offset) {
            (Some(limit), _) => sql.push_str(&format!(" LIMIT {limit}")),
            // SQLite only accepts OFFSET after a LIMIT clause.
            (None, Some(_)) => sql.push_str(" LIMIT -1"),
            (None, None) => {}
        }
        if let Some(offset) = self.offset {
            sql.push_str(&format!(" OFFSET {offset}"));
        }
        sql
    }

    /// Compiles `SELECT COUNT(*)`; ordering and paging do not apply.
    ///
    /// A distinct query counts the distinct rows through a subquery.
    pub fn count_sql(&self) -> String {
        match self.distinct_selection() {
            Some(selection) => format!("SELECT COUNT(*) FROM ({})", self.base_sql(&selection)),
            None => self.base_sql("COUNT(*)"),
        }
    }

    fn distinct_selection(&self) -> Option<String> {
        let columns = self.distinct.as_ref().filter(|c| !c.is_empty())?;
        let columns: Vec<String> = columns.iter().map(|c| quote_identifier(c)).collect();
        Some(format!("DISTINCT {}", columns.join(", ")))
    }

    fn base_sql(&self, selection: &str) -> String {
        let mut sql = format!("SELECT {selection} FROM {}", quote_identifier(&self.table));
        if !self.conditions.is_empty() {
            let clauses: Vec<String> = self.conditions.iter().map(|c| format!("({c})")).collect();
            sql.push_str(" WHERE ");
            sql.push_str(&clauses.join(" AND "));
        }
        sql
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_select() {
        let q = SelectQuery::new("Person");
        assert_eq!(q.select_sql(), "SELECT * FROM \"Person\"");
        assert_eq!(q.count_sql(), "SELECT COUNT(*) FROM \"Person\"");
    }

    #[test]
    fn test_modifiers_do_not_mutate_receiver() {
        let q1 = SelectQuery::new("Person");
        let q2 = q1.limit(5);
        let q3 = q2.order_by(Ordering::Asc("name".into()));
        assert_eq!(q1.select_sql(), "SELECT * FROM \"Person\"");
        assert_eq!(q2.select_sql(), "SELECT * FROM \"Person\" LIMIT 5");
        assert_eq!(
            q3.select_sql(),
            "SELECT * FROM \"Person\" ORDER BY \"name\" ASC LIMIT 5"
        );
        assert_eq!(q2.limit_value(), Some(5));
        assert_eq!(q1.limit_value(), None);
    }

    #[test]
    fn test_offset_without_limit_forces_unbounded_limit() {
        let q = SelectQuery::new("Person").offset(10);
        assert_eq!(q.select_sql(), "SELECT * FROM \"Person\" LIMIT -1 OFFSET 10");
    }

    #[test]
    fn test_limit_and_offset() {
        let q = SelectQuery::new("Person").offset(2).limit(3);
        assert_eq!(q.select_sql(), "SELECT * FROM \"Person\" LIMIT 3 OFFSET 2");
    }

    #[test]
    fn test_multiple_orderings() {
        let q = SelectQuery::new("Person")
            .order_by(Ordering::Desc("age".into()))
            .order_by(Ordering::Asc("name".into()));
        assert_eq!(
            q.select_sql(),
            "SELECT * FROM \"Person\" ORDER BY \"age\" DESC, \"name\" ASC"
        );
    }

    #[test]
    fn test_where_conditions_and_params() {
        let q = SelectQuery::new("Person")
            .where_sql("age > ?", vec![Value::Integer(10)])
            .where_sql("name <> ?", vec![Value::from("A")])
            .limit(1);
        assert_eq!(
            q.select_sql(),
            "SELECT * FROM \"Person\" WHERE (age > ?) AND (name <> ?) LIMIT 1"
        );
        assert_eq!(
            q.count_sql(),
            "SELECT COUNT(*) FROM \"Person\" WHERE (age > ?) AND (name <> ?)"
        );
        assert_eq!(q.params(), &[Value::Integer(10), Value::from("A")]);
    }

    #[test]
    fn test_distinct_columns() {
        let q = SelectQuery::new("Person").distinct(["age", "name"]);
        assert_eq!(
            q.select_sql(),
            "SELECT DISTINCT \"age\", \"name\" FROM \"Person\""
        );
    }

    #[test]
    fn test_distinct_count_uses_subquery() {
        let q = SelectQuery::new("Person")
            .distinct(["age"])
            .where_sql("age > ?", vec![Value::Integer(1)])
            .limit(2);
        assert_eq!(
            q.count_sql(),
            "SELECT COUNT(*) FROM (SELECT DISTINCT \"age\" FROM \"Person\" WHERE (age > ?))"
        );
    }
}
