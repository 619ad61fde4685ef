//! Transaction handler over the embedded engine
//!
//! One write connection is opened at startup and shared by every sub-store
//! for the life of the process. SQLite allows a single writer; the handler
//! serializes access to it, so read-modify-write sequences run inside one
//! [`TxHandler::execute`] call are atomic.
//!
//! A file-backed handler also opens a read connection. The database runs
//! in WAL mode, so read-only units on it see the last committed snapshot
//! and never wait for an open writer. In-memory handlers have only the
//! write connection, which read-only units share.
//!
//! The handler is not reentrant: calling back into it for a write
//! (directly or through a sub-store) from inside `execute`, or while
//! holding a [`StoreTx`], blocks forever.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use govstore_core::storage::{BackendKind, StoreError};
use parking_lot::lock_api::ArcMutexGuard;
use parking_lot::{Mutex, RawMutex};
use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};
use tracing::{error, warn};

use crate::error::Result;
use crate::telemetry::component;

type Slot = Arc<Mutex<Option<Connection>>>;

/// Shared handle to the engine.
#[derive(Clone)]
pub struct TxHandler {
    conn: Slot,
    reader: Option<Slot>,
}

impl TxHandler {
    /// Wrap a connection that already has migrations applied.
    pub fn new(conn: Connection) -> Self {
        Self {
            conn: Arc::new(Mutex::new(Some(conn))),
            reader: None,
        }
    }

    /// Like [`TxHandler::new`], with a second connection to the same
    /// database serving read-only units.
    pub fn with_reader(conn: Connection, reader: Connection) -> Self {
        Self {
            conn: Arc::new(Mutex::new(Some(conn))),
            reader: Some(Arc::new(Mutex::new(Some(reader)))),
        }
    }

    /// Open an in-memory engine (for testing).
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        crate::migrate::migrate(&conn)?;
        Ok(Self::new(conn))
    }

    /// Open a file-backed engine in WAL mode.
    pub fn open(path: impl AsRef<Path>, busy_timeout: Duration) -> Result<Self> {
        let path = path.as_ref();
        let conn = Connection::open(path)?;
        conn.busy_timeout(busy_timeout)?;
        let _mode: String =
            conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;
        crate::migrate::migrate(&conn)?;

        let reader = Connection::open(path)?;
        reader.busy_timeout(busy_timeout)?;
        Ok(Self::with_reader(conn, reader))
    }

    /// Run `f` as one atomic unit of work.
    ///
    /// Commits when `f` returns `Ok`, rolls back on `Err`. A read-only
    /// unit rejects writes with [`BackendKind::ReadOnly`].
    pub fn execute<T, F>(&self, writable: bool, f: F) -> Result<T>
    where
        F: FnOnce(&Tx<'_>) -> Result<T>,
    {
        let slot = match &self.reader {
            Some(reader) if !writable => reader,
            _ => &self.conn,
        };
        let mut guard = slot.lock();
        let conn = guard.as_mut().ok_or_else(closed)?;

        let behavior = if writable {
            TransactionBehavior::Immediate
        } else {
            TransactionBehavior::Deferred
        };
        let txn = conn.transaction_with_behavior(behavior)?;

        let result = f(&Tx {
            conn: &txn,
            writable,
        });

        match result {
            Ok(value) => {
                txn.commit()?;
                Ok(value)
            }
            Err(err) => {
                if let Err(rollback_err) = txn.rollback() {
                    error!(
                        component = component::TXN,
                        error = %rollback_err,
                        "rollback failed"
                    );
                }
                Err(err)
            }
        }
    }

    /// Begin a write transaction whose commit or rollback is driven by
    /// the caller. Other writers wait until the returned [`StoreTx`] is
    /// committed, rolled back or dropped. So do readers when there is no
    /// read connection (in-memory handlers).
    pub fn start_tx(&self) -> Result<StoreTx> {
        let guard = self.conn.lock_arc();
        match guard.as_ref() {
            Some(conn) => conn.execute_batch("BEGIN IMMEDIATE")?,
            None => return Err(closed().into()),
        }
        Ok(StoreTx {
            guard,
            finished: false,
        })
    }

    /// Release the engine. Later calls fail with [`BackendKind::Closed`].
    pub fn close(&self) -> Result<()> {
        if let Some(reader) = &self.reader {
            let conn = reader.lock().take();
            if let Some(conn) = conn {
                conn.close().map_err(|(_, e)| e)?;
            }
        }
        let conn = self.conn.lock().take();
        if let Some(conn) = conn {
            conn.close().map_err(|(_, e)| e)?;
        }
        Ok(())
    }

    pub fn has_reader(&self) -> bool {
        self.reader.is_some()
    }

    pub fn is_closed(&self) -> bool {
        self.conn.lock().is_none()
    }
}

fn closed() -> StoreError {
    StoreError::backend(BackendKind::Closed, "store handler is closed")
}

/// A transaction driven by the caller.
///
/// Dropping it without calling [`StoreTx::commit`] rolls it back.
pub struct StoreTx {
    guard: ArcMutexGuard<RawMutex, Option<Connection>>,
    finished: bool,
}

impl StoreTx {
    /// Writable view for running query-engine operations.
    pub fn tx(&self) -> Result<Tx<'_>> {
        let conn = self.guard.as_ref().ok_or_else(closed)?;
        Ok(Tx {
            conn,
            writable: true,
        })
    }

    pub fn commit(mut self) -> Result<()> {
        self.finish("COMMIT")
    }

    pub fn rollback(mut self) -> Result<()> {
        self.finish("ROLLBACK")
    }

    fn finish(&mut self, statement: &str) -> Result<()> {
        let conn = self.guard.as_ref().ok_or_else(closed)?;
        conn.execute_batch(statement)?;
        self.finished = true;
        Ok(())
    }
}

impl Drop for StoreTx {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        if let Some(conn) = self.guard.as_ref() {
            if let Err(e) = conn.execute_batch("ROLLBACK") {
                warn!(
                    component = component::TXN,
                    error = %e,
                    "rollback of abandoned transaction failed"
                );
            }
        }
    }
}

/// View of an open transaction.
///
/// Exposes the engine's native capability: point get/put/delete and an
/// ordered scan of one bucket. Typed access is in [`crate::query`].
pub struct Tx<'a> {
    conn: &'a Connection,
    writable: bool,
}

impl<'a> Tx<'a> {
    pub fn is_writable(&self) -> bool {
        self.writable
    }

    fn ensure_writable(&self) -> Result<()> {
        if self.writable {
            Ok(())
        } else {
            Err(StoreError::backend(
                BackendKind::ReadOnly,
                "write attempted in a read-only transaction",
            )
            .into())
        }
    }

    /// Raw bytes stored under `key`.
    pub fn get_raw(&self, bucket: &str, key: &str) -> Result<Option<Vec<u8>>> {
        let sql = format!("SELECT value FROM \"{}\" WHERE key = ?1", bucket_name(bucket)?);
        let value = self
            .conn
            .prepare_cached(&sql)?
            .query_row([key], |row| row.get::<_, Vec<u8>>(0))
            .optional()?;
        Ok(value)
    }

    /// Store raw bytes under `key`, replacing any previous value.
    pub fn put_raw(&self, bucket: &str, key: &str, value: &[u8]) -> Result<()> {
        self.ensure_writable()?;
        let sql = format!(
            "INSERT OR REPLACE INTO \"{}\" (key, value) VALUES (?1, ?2)",
            bucket_name(bucket)?
        );
        self.conn.prepare_cached(&sql)?.execute(params![key, value])?;
        Ok(())
    }

    /// Physically remove `key`. Returns whether a row was removed.
    pub fn delete_raw(&self, bucket: &str, key: &str) -> Result<bool> {
        self.ensure_writable()?;
        let sql = format!("DELETE FROM \"{}\" WHERE key = ?1", bucket_name(bucket)?);
        let removed = self.conn.prepare_cached(&sql)?.execute([key])?;
        Ok(removed > 0)
    }

    /// Visit every `(key, value)` of a bucket in key order.
    pub fn scan_raw<F>(&self, bucket: &str, mut visit: F) -> Result<()>
    where
        F: FnMut(String, Vec<u8>) -> Result<()>,
    {
        let sql = format!(
            "SELECT key, value FROM \"{}\" ORDER BY key",
            bucket_name(bucket)?
        );
        let mut stmt = self.conn.prepare_cached(&sql)?;
        let mut rows = stmt.query([])?;
        while let Some(row) = rows.next()? {
            visit(row.get(0)?, row.get(1)?)?;
        }
        Ok(())
    }
}

/// Bucket names are interpolated into SQL, so only plain identifiers pass.
fn bucket_name(bucket: &str) -> Result<&str> {
    let plain = !bucket.is_empty()
        && bucket
            .bytes()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'_');
    if plain {
        Ok(bucket)
    } else {
        Err(StoreError::InvalidArgument(format!("invalid bucket name `{}`", bucket)).into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_execute_commits_on_ok() {
        let handler = TxHandler::in_memory().unwrap();
        handler
            .execute(true, |tx| tx.put_raw("service", "s1", b"{}"))
            .unwrap();

        let value = handler
            .execute(false, |tx| tx.get_raw("service", "s1"))
            .unwrap();
        assert_eq!(value, Some(b"{}".to_vec()));
    }

    #[test]
    fn test_execute_rolls_back_on_err() {
        let handler = TxHandler::in_memory().unwrap();
        let result: Result<()> = handler.execute(true, |tx| {
            tx.put_raw("service", "s1", b"{}")?;
            Err(StoreError::InvalidArgument("abort".to_string()).into())
        });
        assert!(result.is_err());

        let value = handler
            .execute(false, |tx| tx.get_raw("service", "s1"))
            .unwrap();
        assert_eq!(value, None);
    }

    #[test]
    fn test_read_only_rejects_writes() {
        let handler = TxHandler::in_memory().unwrap();
        let err = handler
            .execute(false, |tx| tx.put_raw("service", "s1", b"{}"))
            .unwrap_err();
        assert_eq!(err.backend_kind(), Some(BackendKind::ReadOnly));
    }

    #[test]
    fn test_bucket_name_is_checked() {
        let handler = TxHandler::in_memory().unwrap();
        let err = handler
            .execute(false, |tx| tx.get_raw("service; DROP TABLE service", "s1"))
            .unwrap_err();
        assert!(matches!(
            StoreError::from(err),
            StoreError::InvalidArgument(_)
        ));
    }

    #[test]
    fn test_close_is_idempotent() {
        let handler = TxHandler::in_memory().unwrap();
        handler.close().unwrap();
        handler.close().unwrap();
        assert!(handler.is_closed());

        let err = handler
            .execute(false, |tx| tx.get_raw("service", "s1"))
            .unwrap_err();
        assert_eq!(err.backend_kind(), Some(BackendKind::Closed));
    }
}
