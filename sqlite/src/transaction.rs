//! Scoped transactions.
//!
//! A [`TransactionGuard`] opens a transaction (or a savepoint when one is
//! already open) and rolls it back on drop unless it was committed, so an
//! early `?` return or a panic never leaves work half-applied.

use rusqlite::Connection;
use tracing::{debug, warn};

use crate::error::{Result, SqliteError};

const SAVEPOINT: &str = "tablekit_savepoint";

/// An open transaction or savepoint, rolled back on drop unless committed.
#[derive(Debug)]
pub struct TransactionGuard<'c> {
    conn: &'c Connection,
    nested: bool,
    finished: bool,
}

impl<'c> TransactionGuard<'c> {
    /// Starts a transaction, or a savepoint inside the one already open.
    pub fn begin(conn: &'c Connection) -> Result<Self> {
        let nested = !conn.is_autocommit();
        let sql = if nested {
            format!("SAVEPOINT {SAVEPOINT}")
        } else {
            "BEGIN".to_string()
        };
        run(conn, &sql)?;
        Ok(Self {
            conn,
            nested,
            finished: false,
        })
    }

    /// Whether this guard is a savepoint inside an outer transaction.
    pub fn is_nested(&self) -> bool {
        self.nested
    }

    /// Makes the changes permanent (or releases the savepoint).
    ///
    /// A failed commit leaves the guard unfinished, so dropping it rolls
    /// the work back.
    pub fn commit(mut self) -> Result<()> {
        let result = if self.nested {
            run(self.conn, &format!("RELEASE {SAVEPOINT}"))
        } else {
            run(self.conn, "COMMIT")
        };
        self.finished = result.is_ok();
        result
    }

    /// Discards the changes.
    pub fn rollback(mut self) -> Result<()> {
        self.finished = true;
        self.undo()
    }

    fn undo(&self) -> Result<()> {
        if self.nested {
            run(
                self.conn,
                &format!("ROLLBACK TO {SAVEPOINT}; RELEASE {SAVEPOINT}"),
            )
        } else {
            run(self.conn, "ROLLBACK")
        }
    }
}

impl Drop for TransactionGuard<'_> {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        if let Err(e) = self.undo() {
            warn!(error = %e, nested = self.nested, "rollback failed");
        }
    }
}

fn run(conn: &Connection, sql: &str) -> Result<()> {
    debug!(sql, "executing");
    conn.execute_batch(sql).map_err(SqliteError::from_step)
}

/// Issues a plain `BEGIN`.
pub fn begin(conn: &Connection) -> Result<()> {
    run(conn, "BEGIN")
}

/// Issues a plain `COMMIT`.
pub fn commit(conn: &Connection) -> Result<()> {
    run(conn, "COMMIT")
}

/// Issues a plain `ROLLBACK`.
pub fn rollback(conn: &Connection) -> Result<()> {
    run(conn, "ROLLBACK")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("CREATE TABLE t (v INTEGER);").unwrap();
        conn
    }

    fn count(conn: &Connection) -> i64 {
        conn.query_row("SELECT COUNT(*) FROM t", [], |r| r.get(0))
            .unwrap()
    }

    #[test]
    fn test_commit_persists() {
        let conn = setup();
        let tx = TransactionGuard::begin(&conn).unwrap();
        assert!(!tx.is_nested());
        conn.execute("INSERT INTO t VALUES (1)", []).unwrap();
        tx.commit().unwrap();
        assert_eq!(count(&conn), 1);
        assert!(conn.is_autocommit());
    }

    #[test]
    fn test_drop_rolls_back() {
        let conn = setup();
        {
            let _tx = TransactionGuard::begin(&conn).unwrap();
            conn.execute("INSERT INTO t VALUES (1)", []).unwrap();
        }
        assert_eq!(count(&conn), 0);
        assert!(conn.is_autocommit());
    }

    #[test]
    fn test_nested_savepoint_rollback_keeps_outer_work() {
        let conn = setup();
        let outer = TransactionGuard::begin(&conn).unwrap();
        conn.execute("INSERT INTO t VALUES (1)", []).unwrap();

        let inner = TransactionGuard::begin(&conn).unwrap();
        assert!(inner.is_nested());
        conn.execute("INSERT INTO t VALUES (2)", []).unwrap();
        inner.rollback().unwrap();

        outer.commit().unwrap();
        assert_eq!(count(&conn), 1);
    }

    #[test]
    fn test_plain_statements() {
        let conn = setup();
        begin(&conn).unwrap();
        conn.execute("INSERT INTO t VALUES (1)", []).unwrap();
        rollback(&conn).unwrap();
        assert_eq!(count(&conn), 0);

        begin(&conn).unwrap();
        conn.execute("INSERT INTO t VALUES (1)", []).unwrap();
        commit(&conn).unwrap();
        assert_eq!(count(&conn), 1);
    }

    #[test]
    fn test_failed_commit_rolls_back() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "PRAGMA foreign_keys = ON;
             CREATE TABLE p (id INTEGER PRIMARY KEY);
             CREATE TABLE c (pid INTEGER REFERENCES p(id) DEFERRABLE INITIALLY DEFERRED);",
        )
        .unwrap();

        let tx = TransactionGuard::begin(&conn).unwrap();
        conn.execute("INSERT INTO c VALUES (99)", []).unwrap();
        assert!(tx.commit().is_err());

        assert!(conn.is_autocommit());
        let rows: i64 = conn
            .query_row("SELECT COUNT(*) FROM c", [], |r| r.get(0))
            .unwrap();
        assert_eq!(rows, 0);
        assert!(!TransactionGuard::begin(&conn).unwrap().is_nested());
    }

    #[test]
    fn test_commit_without_transaction_fails() {
        let conn = setup();
        assert!(commit(&conn).is_err());
    }
}
