//! SQLite persistence for the sync state.
//!
//! One connection serves the whole crate, guarded by a mutex: SQLite
//! serializes writers anyway and the sync engine touches the store in short
//! bursts, so a single locked connection is simpler than a pool. Schema
//! setup runs through versioned migrations on every open.
//!
//! Three tables carry the sync state: `accounts` (credential material plus
//! the per-account history cursor), `processed_messages` (the idempotency
//! ledger) and `extracted_events` (one row per account/message/link).

use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use rusqlite::Connection;
use thiserror::Error;

pub mod account_repo;
pub mod event_repo;
pub mod ledger_repo;
pub mod migrations;

/// Errors from the persistence layer.
#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("Query failed: {0}")]
    Query(#[from] rusqlite::Error),

    #[error("Could not prepare database directory '{path}': {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Migration {version} failed: {reason}")]
    Migration { version: u32, reason: String },

    /// A previous holder of the connection lock panicked.
    #[error("Database connection lock poisoned")]
    Poisoned,
}

/// Shared handle to the crate's SQLite store. Cloning shares the underlying
/// connection.
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    /// Opens (creating if needed) the store at `path`, switches it to WAL
    /// and brings the schema up to date.
    pub fn open(path: &Path) -> Result<Self, DatabaseError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| DatabaseError::CreateDir {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }

        let conn = Connection::open(path)?;
        conn.execute_batch(
            "PRAGMA journal_mode=WAL;
             PRAGMA foreign_keys=ON;
             PRAGMA busy_timeout=5000;",
        )?;

        log::info!("Database opened at {}", path.display());
        Self::from_conn(conn)
    }

    /// In-memory store for tests, fully migrated.
    pub fn open_in_memory() -> Result<Self, DatabaseError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        Self::from_conn(conn)
    }

    fn from_conn(conn: Connection) -> Result<Self, DatabaseError> {
        migrations::run_all(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Runs `f` with the connection lock held.
    pub fn exec<F, T>(&self, f: F) -> Result<T, DatabaseError>
    where
        F: FnOnce(&Connection) -> Result<T, DatabaseError>,
    {
        let conn = self.conn.lock().map_err(|_| DatabaseError::Poisoned)?;
        f(&conn)
    }
}

/// The conventional store location, `~/.clubmail/data/clubmail.db`. Binaries
/// embedding this crate use it when no explicit path is configured; the
/// library itself never opens it implicitly.
pub fn default_database_path() -> Option<PathBuf> {
    dirs::home_dir().map(|h| h.join(".clubmail").join("data").join("clubmail.db"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_in_memory_is_migrated() {
        let db = Database::open_in_memory().unwrap();
        let applied: u32 = db
            .exec(|conn| {
                Ok(conn.query_row("SELECT COUNT(*) FROM _migrations", [], |r| r.get(0))?)
            })
            .unwrap();
        assert!(applied > 0);
    }

    #[test]
    fn test_open_creates_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("store.db");
        let db = Database::open(&path).unwrap();
        db.exec(|conn| {
            let applied: u32 =
                conn.query_row("SELECT COUNT(*) FROM _migrations", [], |r| r.get(0))?;
            assert!(applied > 0);
            Ok(())
        })
        .unwrap();
        assert!(path.exists());
    }

    #[test]
    fn test_clones_share_the_connection() {
        let db = Database::open_in_memory().unwrap();
        let other = db.clone();
        db.exec(|conn| {
            conn.execute(
                "INSERT INTO accounts (email, created_at, updated_at)
                 VALUES ('a@b.c', '2026-01-01', '2026-01-01')",
                [],
            )?;
            Ok(())
        })
        .unwrap();
        let count: u32 = other
            .exec(|conn| Ok(conn.query_row("SELECT COUNT(*) FROM accounts", [], |r| r.get(0))?))
            .unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn test_default_database_path() {
        let path = default_database_path().unwrap();
        assert!(path.ends_with("clubmail.db"));
        assert!(path.to_string_lossy().contains(".clubmail"));
    }
}
