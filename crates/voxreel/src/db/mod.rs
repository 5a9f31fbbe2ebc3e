//! Database module for persistent storage.
//!
//! Uses rusqlite (SQLite) in WAL mode with two connections: a writer that
//! serializes every mutation behind a `Mutex`, and a reader used for status
//! queries. WAL lets the reader see the last committed state without waiting
//! on an in-flight write transaction.

use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use rusqlite::Connection;

pub mod error;
pub mod job_repo;
pub mod migrations;

pub use error::DatabaseError;

/// Milliseconds a connection waits on a locked database before giving up.
const BUSY_TIMEOUT_MS: u32 = 10_000;

/// Thread-safe database handle.
///
/// Cloning is cheap (inner `Arc`s). For in-memory databases both handles
/// point at the same connection, since a private in-memory database cannot
/// be shared between connections.
#[derive(Clone)]
pub struct Database {
    writer: Arc<Mutex<Connection>>,
    reader: Arc<Mutex<Connection>>,
}

impl Database {
    /// Opens (or creates) the database at the given path and runs all
    /// pending migrations.
    pub fn open(path: &Path) -> Result<Self, DatabaseError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| DatabaseError::Io {
                    path: parent.to_path_buf(),
                    source: e,
                })?;
            }
        }

        let writer = Connection::open(path)?;
        writer.execute_batch(&format!(
            "PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON; PRAGMA busy_timeout={};",
            BUSY_TIMEOUT_MS
        ))?;

        migrations::run_all(&writer)?;

        let reader = Connection::open(path)?;
        reader.execute_batch(&format!(
            "PRAGMA foreign_keys=ON; PRAGMA busy_timeout={}; PRAGMA query_only=ON;",
            BUSY_TIMEOUT_MS
        ))?;

        log::info!("Database opened at {}", path.display());

        Ok(Self {
            writer: Arc::new(Mutex::new(writer)),
            reader: Arc::new(Mutex::new(reader)),
        })
    }

    /// Opens an in-memory database for testing. Runs all migrations.
    pub fn open_in_memory() -> Result<Self, DatabaseError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;

        migrations::run_all(&conn)?;

        let shared = Arc::new(Mutex::new(conn));
        Ok(Self {
            writer: Arc::clone(&shared),
            reader: shared,
        })
    }

    /// Provides exclusive access to the writer connection.
    pub fn with_writer<F, T>(&self, f: F) -> Result<T, DatabaseError>
    where
        F: FnOnce(&mut Connection) -> Result<T, DatabaseError>,
    {
        let mut conn = lock(&self.writer);
        f(&mut conn)
    }

    /// Provides access to the reader connection.
    pub fn with_reader<F, T>(&self, f: F) -> Result<T, DatabaseError>
    where
        F: FnOnce(&Connection) -> Result<T, DatabaseError>,
    {
        let conn = lock(&self.reader);
        f(&conn)
    }
}

/// A panic while a connection was held leaves it poisoned but usable: any
/// open transaction was rolled back when its guard dropped.
fn lock(conn: &Mutex<Connection>) -> MutexGuard<'_, Connection> {
    conn.lock().unwrap_or_else(PoisonError::into_inner)
}
