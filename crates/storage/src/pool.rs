//! Connection management: the single write connection plus a small
//! read-only pool, split between a write path and a small read pool,
//! the one backend this engine actually has (SQLite, WAL mode).

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use rusqlite::{Connection, OpenFlags};

use crate::error::StorageError;

/// Opens the write connection: WAL journal mode (so the read pool below
/// can run lock-free against it, per spec §5) and foreign keys enforced
/// (Invariant I1).
pub fn open_write_connection(path: &str) -> Result<Connection, StorageError> {
    let conn = Connection::open(path)?;
    configure(&conn)?;
    Ok(conn)
}

fn configure(conn: &Connection) -> Result<(), StorageError> {
    conn.pragma_update(None, "journal_mode", "WAL")?;
    conn.pragma_update(None, "foreign_keys", "ON")?;
    Ok(())
}

/// Runs a blocking rusqlite closure on the blocking thread pool without
/// holding the async runtime's worker thread hostage. `conn` is locked
/// only inside the blocking closure, never across an `.await`.
pub async fn run_blocking<F, T>(conn: Arc<Mutex<Connection>>, f: F) -> Result<T, StorageError>
where
    F: FnOnce(&Connection) -> Result<T, StorageError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(move || {
        let guard = conn.lock().expect("sqlite connection mutex poisoned");
        f(&guard)
    })
    .await
    .map_err(|e| StorageError::Join(e.to_string()))?
}

/// A small round-robin pool of read-only connections over the same WAL
/// file, sized by `read_pool_size`.
pub struct ReadPool {
    conns: Vec<Arc<Mutex<Connection>>>,
    next: AtomicUsize,
}

impl ReadPool {
    pub fn open(path: &str, size: usize) -> Result<Self, StorageError> {
        let size = size.max(1);
        let mut conns = Vec::with_capacity(size);
        for _ in 0..size {
            let conn = Connection::open_with_flags(
                path,
                OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
            )?;
            conn.pragma_update(None, "query_only", "ON")?;
            conns.push(Arc::new(Mutex::new(conn)));
        }
        Ok(Self {
            conns,
            next: AtomicUsize::new(0),
        })
    }

    fn pick(&self) -> Arc<Mutex<Connection>> {
        let idx = self.next.fetch_add(1, Ordering::Relaxed) % self.conns.len();
        self.conns[idx].clone()
    }

    pub async fn with_conn<F, T>(&self, f: F) -> Result<T, StorageError>
    where
        F: FnOnce(&Connection) -> Result<T, StorageError> + Send + 'static,
        T: Send + 'static,
    {
        run_blocking(self.pick(), f).await
    }
}
