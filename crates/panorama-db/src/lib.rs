pub mod error;
pub mod graph;
pub mod migrations;
pub mod models;
pub mod queries;

use rusqlite::{Connection, OpenFlags, Transaction, TransactionBehavior};
use std::path::Path;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::info;

pub use error::DbError;

pub const DEFAULT_READER_POOL_SIZE: usize = 4;

/// SQLite handle with a reader/writer split.
///
/// All mutations go through the single writer connection, one transaction at a
/// time, so conflicting multi-step writes are serialized. Reads are spread over
/// a small pool of read-only connections and never block on the writer (WAL).
pub struct Database {
    writer: Mutex<Connection>,
    readers: Vec<Mutex<Connection>>,
    reader_idx: AtomicUsize,
}

impl Database {
    pub fn open(path: &Path) -> Result<Self, DbError> {
        Self::open_with_readers(path, DEFAULT_READER_POOL_SIZE)
    }

    pub fn open_with_readers(path: &Path, reader_count: usize) -> Result<Self, DbError> {
        let writer = Connection::open(path)?;

        // WAL mode for concurrent reads
        writer.pragma_update(None, "journal_mode", "WAL")?;
        writer.pragma_update(None, "foreign_keys", "ON")?;

        migrations::run(&writer)?;

        let reader_count = reader_count.max(1);
        let mut readers = Vec::with_capacity(reader_count);
        for _ in 0..reader_count {
            let conn = Connection::open_with_flags(
                path,
                OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
            )?;
            readers.push(Mutex::new(conn));
        }

        info!(
            "Database opened at {} (1 writer + {} readers)",
            path.display(),
            reader_count
        );
        Ok(Self {
            writer: Mutex::new(writer),
            readers,
            reader_idx: AtomicUsize::new(0),
        })
    }

    /// Run a read on one of the pooled read-only connections.
    pub fn with_conn<F, T, E>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce(&Connection) -> Result<T, E>,
        E: From<DbError>,
    {
        let idx = self.reader_idx.fetch_add(1, Ordering::Relaxed) % self.readers.len();
        let conn = self.readers[idx]
            .lock()
            .map_err(|e| DbError::Poisoned(format!("reader: {e}")))?;
        f(&conn)
    }

    /// Run `f` inside one `BEGIN IMMEDIATE` transaction on the writer.
    ///
    /// Commits when `f` returns `Ok`; any `Err` (or a panic) drops the
    /// transaction, which rolls it back. The writer lock is held for the whole
    /// call, so no other mutation can observe a half-applied state.
    pub fn transaction<F, T, E>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce(&Transaction<'_>) -> Result<T, E>,
        E: From<DbError>,
    {
        let mut conn = self
            .writer
            .lock()
            .map_err(|e| DbError::Poisoned(format!("writer: {e}")))?;
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(DbError::from)?;
        let value = f(&tx)?;
        tx.commit().map_err(DbError::from)?;
        Ok(value)
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::open_temp;

    #[test]
    fn failed_transaction_rolls_back() {
        let (_dir, db) = open_temp();

        let res: Result<(), DbError> = db.transaction(|tx| {
            graph::insert_scene(tx, "lost", "panorama", None)?;
            Err(DbError::Poisoned("forced".into()))
        });
        assert!(res.is_err());

        let roots = db.list_roots().unwrap();
        assert!(roots.is_empty());
    }

    #[test]
    fn readers_see_committed_writes() {
        let (_dir, db) = open_temp();

        let id = db
            .transaction(|tx| graph::insert_scene(tx, "lobby", "panorama", None))
            .unwrap();

        // Hit every reader in the pool at least once.
        for _ in 0..4 {
            let scene = db.get_scene(id).unwrap().unwrap();
            assert_eq!(scene.name, "lobby");
        }
    }

    #[test]
    fn reopening_keeps_data_and_schema() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("reopen.db");
        {
            let db = Database::open(&path).unwrap();
            db.transaction(|tx| graph::insert_scene(tx, "kept", "photo", None))
                .unwrap();
        }
        let db = Database::open(&path).unwrap();
        assert_eq!(db.list_roots().unwrap().len(), 1);
    }
}
