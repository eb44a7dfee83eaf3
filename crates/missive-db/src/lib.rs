pub mod error;
pub mod migrations;
pub mod models;
pub mod queries;

use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, SubsecRound, Utc};
use rusqlite::Connection;
use tracing::info;

pub use error::{DbError, Result};

/// Single-connection SQLite store.
///
/// Every `with_conn` / `with_tx` call is one round trip: the closure runs
/// against the locked connection and the lock is released when it returns.
pub struct Database {
    conn: Mutex<Connection>,
    round_trips: AtomicU64,
}

impl Database {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;

        // WAL mode for concurrent readers from other processes
        conn.pragma_update(None, "journal_mode", "WAL")?;

        let db = Self::init(conn)?;
        info!("Database opened at {}", path.display());
        Ok(db)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.pragma_update(None, "foreign_keys", "ON")?;
        migrations::run(&conn)?;

        Ok(Self {
            conn: Mutex::new(conn),
            round_trips: AtomicU64::new(0),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.round_trips.fetch_add(1, Ordering::Relaxed);
        self.conn.lock().map_err(|_| DbError::Poisoned)
    }

    /// Run a read against the connection.
    pub fn with_conn<F, T, E>(&self, f: F) -> std::result::Result<T, E>
    where
        F: FnOnce(&Connection) -> std::result::Result<T, E>,
        E: From<DbError>,
    {
        let conn = self.lock()?;
        f(&conn)
    }

    /// Run `f` inside a transaction. Commits on `Ok`, rolls back on `Err`
    /// (including a failed commit, e.g. a deferred foreign key check).
    pub fn with_tx<F, T, E>(&self, f: F) -> std::result::Result<T, E>
    where
        F: FnOnce(&Connection) -> std::result::Result<T, E>,
        E: From<DbError>,
    {
        let mut conn = self.lock()?;
        let tx = conn.transaction().map_err(DbError::from)?;
        let value = f(&tx)?;
        tx.commit().map_err(DbError::from)?;
        Ok(value)
    }

    /// Total store round trips issued through this handle.
    pub fn round_trips(&self) -> u64 {
        self.round_trips.load(Ordering::Relaxed)
    }
}

/// Current time at the precision timestamps are stored with.
pub fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_database_runs_migrations_once() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missive.db");

        drop(Database::open(&path).unwrap());
        let db = Database::open(&path).unwrap();

        let version: i64 = db
            .with_conn(|conn| {
                conn.query_row("SELECT MAX(version) FROM schema_version", [], |r| r.get(0))
                    .map_err(DbError::from)
            })
            .unwrap();
        assert_eq!(version, migrations::LATEST_VERSION);
    }

    #[test]
    fn failed_closure_rolls_back() {
        let db = Database::open_in_memory().unwrap();

        let result: Result<()> = db.with_tx(|conn| {
            conn.execute(
                "INSERT INTO users (id, username, created_at) VALUES ('u1', 'alice', 'x')",
                [],
            )?;
            Err(DbError::Poisoned)
        });
        assert!(result.is_err());

        let count: i64 = db
            .with_conn(|conn| {
                conn.query_row("SELECT COUNT(*) FROM users", [], |r| r.get(0))
                    .map_err(DbError::from)
            })
            .unwrap();
        assert_eq!(count, 0);
    }

    #[test]
    fn round_trips_count_each_acquisition() {
        let db = Database::open_in_memory().unwrap();
        let before = db.round_trips();

        db.with_conn(|_| Ok::<_, DbError>(())).unwrap();
        db.with_tx(|_| Ok::<_, DbError>(())).unwrap();

        assert_eq!(db.round_trips() - before, 2);
    }
}
