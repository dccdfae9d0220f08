//! SQLite-backed store for accounts, their signals, and predictions.
//!
//! `CrmDb` wraps a single connection in WAL mode. The account/signal tables
//! mirror records the surrounding CRM owns; the `predictions` table is this
//! subsystem's own append-only store. Schema is managed by numbered
//! migrations (see `crate::migrations`).

use std::path::PathBuf;

use rusqlite::Connection;

pub mod types;
pub use types::*;

pub mod accounts;
pub mod activities;
pub mod follow_ups;
pub mod health_history;
pub mod opportunities;
pub mod playbooks;
pub mod predictions;

pub struct CrmDb {
    conn: Connection,
}

impl CrmDb {
    /// Borrow the underlying connection for ad-hoc queries.
    pub fn conn_ref(&self) -> &Connection {
        &self.conn
    }

    /// Execute a closure within a SQLite transaction.
    /// Commits on Ok, rolls back on Err.
    pub fn with_transaction<F, T>(&self, f: F) -> Result<T, DbError>
    where
        F: FnOnce(&Self) -> Result<T, DbError>,
    {
        self.conn.execute_batch("BEGIN IMMEDIATE")?;
        match f(self) {
            Ok(val) => {
                self.conn.execute_batch("COMMIT")?;
                Ok(val)
            }
            Err(e) => {
                let _ = self.conn.execute_batch("ROLLBACK");
                Err(e)
            }
        }
    }

    /// Open (or create) the database at `~/.accountpulse/accountpulse.db`
    /// and apply the schema.
    pub fn open() -> Result<Self, DbError> {
        let home = dirs::home_dir().ok_or(DbError::HomeDirNotFound)?;
        let path = home.join(".accountpulse").join("accountpulse.db");
        Self::open_at(path)
    }

    /// Open a database at an explicit path. Useful for testing and for
    /// embedding apps that manage their own data directory.
    pub fn open_at(path: PathBuf) -> Result<Self, DbError> {
        if let Some(parent) = path.parent() {
            if !parent.exists() {
                std::fs::create_dir_all(parent).map_err(DbError::CreateDir)?;
            }
        }

        let conn = Connection::open(&path)?;

        // WAL mode: concurrent readers (getLatest during validation) observe
        // either the pre- or post-update row, never a torn one.
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;

        crate::migrations::run_migrations(&conn).map_err(DbError::Migration)?;

        Ok(Self { conn })
    }
}

// =============================================================================
// Shared test utilities
// =============================================================================


// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::test_utils::test_db;

    #[test]
    fn test_open_creates_tables() {
        let db = test_db();
        for table in [
            "accounts",
            "health_history",
            "activities",
            "follow_ups",
            "opportunities",
            "predictions",
            "playbooks",
        ] {
            let count: i64 = db
                .conn
                .query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |row| {
                    row.get(0)
                })
                .unwrap_or_else(|_| panic!("{} table should exist", table));
            assert_eq!(count, 0);
        }
    }

    #[test]
    fn test_transaction_rolls_back_on_err() {
        let db = test_db();
        let result: Result<(), super::DbError> = db.with_transaction(|db| {
            db.conn_ref().execute(
                "INSERT INTO playbooks (id, action_type, title) VALUES ('pb-1', 'retention_call', 'T')",
                [],
            )?;
            Err(super::DbError::Migration("forced".to_string()))
        });
        assert!(result.is_err());

        let count: i64 = db
            .conn
            .query_row("SELECT COUNT(*) FROM playbooks", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 0, "insert should have been rolled back");
    }
}
