pub mod items;
pub mod migrations;
pub mod models;
pub mod rooms;

use std::path::Path;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use anyhow::{Result, anyhow};
use rusqlite::{Connection, OpenFlags};
use tracing::info;

/// Readers opened when the caller does not say otherwise. Queries here are
/// short point lookups and small scans, so a handful is plenty.
const DEFAULT_READERS: usize = 4;

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Room and content metadata store.
///
/// One read-write connection serializes every mutation; reads fan out over a
/// fixed set of read-only connections picked round-robin. WAL mode keeps the
/// two sides from blocking each other.
pub struct Database {
    writer: Mutex<Connection>,
    readers: Box<[Mutex<Connection>]>,
    cursor: AtomicUsize,
}

impl Database {
    pub fn open(path: &Path) -> Result<Self> {
        Self::open_with_readers(path, DEFAULT_READERS)
    }

    pub fn open_with_readers(path: &Path, reader_count: usize) -> Result<Self> {
        let writer = Connection::open(path)?;
        writer.busy_timeout(BUSY_TIMEOUT)?;
        writer.pragma_update(None, "journal_mode", "WAL")?;
        writer.pragma_update(None, "synchronous", "NORMAL")?;
        writer.pragma_update(None, "foreign_keys", "ON")?;

        migrations::run(&writer)?;

        let readers = (0..reader_count.max(1))
            .map(|_| open_reader(path).map(Mutex::new))
            .collect::<Result<Box<[_]>>>()?;

        info!(
            path = %path.display(),
            readers = readers.len(),
            "content database ready"
        );
        Ok(Self {
            writer: Mutex::new(writer),
            readers,
            cursor: AtomicUsize::new(0),
        })
    }

    /// Run a query on the next read-only connection.
    pub fn read<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T>,
    {
        let n = self.cursor.fetch_add(1, Ordering::Relaxed) % self.readers.len();
        let conn = self.readers[n]
            .lock()
            .map_err(|_| anyhow!("read connection mutex poisoned"))?;
        f(&conn)
    }

    /// Run a mutation on the read-write connection. Multi-statement work
    /// that must be atomic opens a transaction inside `f`.
    pub fn write<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T>,
    {
        let conn = self
            .writer
            .lock()
            .map_err(|_| anyhow!("write connection mutex poisoned"))?;
        f(&conn)
    }
}

fn open_reader(path: &Path) -> Result<Connection> {
    let conn = Connection::open_with_flags(
        path,
        OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
    )?;
    conn.busy_timeout(BUSY_TIMEOUT)?;
    Ok(conn)
}
