//! SQLite Counter Store
//!
//! Implements CounterStore on a local SQLite file in WAL mode.
//! On replicas the file is kept in sync by an external replicator; this
//! adapter only ever writes to it on the primary.

use crate::domain::entities::CounterRow;
use crate::domain::ports::CounterStore;
use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use parking_lot::Mutex;
use rusqlite::{Connection, OptionalExtension};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// SQLite-backed counter store.
///
/// One connection shared behind a mutex; SQLite serializes writers anyway
/// and every query here is a single-row statement.
pub struct SqliteCounterStore {
    conn: Arc<Mutex<Connection>>,
    path: PathBuf,
}

impl SqliteCounterStore {
    /// Open (or create) the data file and switch it to WAL journaling.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let conn = Connection::open(&path)
            .with_context(|| format!("open database {}", path.display()))?;

        let mode: String = conn
            .query_row("PRAGMA journal_mode = wal", [], |row| row.get(0))
            .context("set journal mode")?;
        conn.busy_timeout(Duration::from_secs(5))?;
        tracing::debug!(path = %path.display(), journal_mode = %mode, "database opened");

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            path,
        })
    }

    /// Create the counter table and its single row if they are missing.
    pub fn bootstrap(&self) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS t (id INTEGER PRIMARY KEY, value INTEGER, timestamp TEXT);
             INSERT OR IGNORE INTO t (id, value, timestamp) VALUES (1, 0, '');",
        )
        .context("bootstrap schema")?;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write-ahead log sidecar of the data file.
    pub fn wal_path(&self) -> PathBuf {
        let mut name = self.path.as_os_str().to_owned();
        name.push("-wal");
        PathBuf::from(name)
    }

    /// Files whose writes signal a possible counter change.
    pub fn watched_paths(&self) -> Vec<PathBuf> {
        vec![self.path.clone(), self.wal_path()]
    }

    fn read_row(conn: &Connection) -> Result<CounterRow> {
        let row = conn
            .query_row("SELECT value, timestamp FROM t WHERE id = 1", [], |row| {
                Ok(CounterRow {
                    value: row.get::<_, Option<i64>>(0)?.unwrap_or_default(),
                    timestamp: row.get::<_, Option<String>>(1)?.unwrap_or_default(),
                })
            })
            .optional()?;
        row.context("counter row missing")
    }

    fn increment_row(conn: &Connection, committed_at: &str) -> Result<()> {
        let changed = conn.execute(
            "UPDATE t SET value = value + 1, timestamp = ?1 WHERE id = 1",
            [committed_at],
        )?;
        if changed == 0 {
            bail!("counter row missing");
        }
        Ok(())
    }
}

#[async_trait]
impl CounterStore for SqliteCounterStore {
    async fn read(&self) -> Result<CounterRow> {
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || Self::read_row(&conn.lock()))
            .await
            .context("read task failed")?
    }

    async fn increment(&self, committed_at: DateTime<Utc>) -> Result<()> {
        let conn = self.conn.clone();
        let timestamp = committed_at.to_rfc3339_opts(SecondsFormat::Nanos, true);
        tokio::task::spawn_blocking(move || Self::increment_row(&conn.lock(), &timestamp))
            .await
            .context("increment task failed")?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn open_store() -> (TempDir, SqliteCounterStore) {
        let dir = TempDir::new().unwrap();
        let store = SqliteCounterStore::open(dir.path().join("counter.db")).unwrap();
        store.bootstrap().unwrap();
        (dir, store)
    }

    #[test]
    fn test_wal_path() {
        let (_dir, store) = open_store();
        assert_eq!(
            store.wal_path().file_name().unwrap().to_str().unwrap(),
            "counter.db-wal"
        );
        assert_eq!(store.watched_paths(), vec![store.path().to_path_buf(), store.wal_path()]);
    }

    #[test]
    fn test_open_uses_wal_journal() {
        let (_dir, store) = open_store();
        let mode: String = store
            .conn
            .lock()
            .query_row("PRAGMA journal_mode", [], |row| row.get(0))
            .unwrap();
        assert_eq!(mode, "wal");
    }

    #[tokio::test]
    async fn test_bootstrap_creates_zero_row() {
        let (_dir, store) = open_store();
        let row = store.read().await.unwrap();
        assert_eq!(row, CounterRow::default());
    }

    #[tokio::test]
    async fn test_bootstrap_is_idempotent() {
        let (_dir, store) = open_store();
        store.increment(Utc::now()).await.unwrap();
        store.bootstrap().unwrap();
        assert_eq!(store.read().await.unwrap().value, 1);
    }

    #[tokio::test]
    async fn test_increment_is_monotonic() {
        let (_dir, store) = open_store();
        let before = store.read().await.unwrap().value;
        for _ in 0..25 {
            store.increment(Utc::now()).await.unwrap();
        }
        assert_eq!(store.read().await.unwrap().value, before + 25);
    }

    #[tokio::test]
    async fn test_concurrent_increments() {
        let (_dir, store) = open_store();
        let store = Arc::new(store);
        let tasks: Vec<_> = (0..10)
            .map(|_| {
                let store = store.clone();
                tokio::spawn(async move { store.increment(Utc::now()).await })
            })
            .collect();
        for task in tasks {
            task.await.unwrap().unwrap();
        }
        assert_eq!(store.read().await.unwrap().value, 10);
    }

    #[tokio::test]
    async fn test_increment_records_timestamp() {
        let (_dir, store) = open_store();
        let at = DateTime::parse_from_rfc3339("2024-05-01T12:00:00.123456789Z")
            .unwrap()
            .with_timezone(&Utc);
        store.increment(at).await.unwrap();

        let row = store.read().await.unwrap();
        assert_eq!(row.timestamp, "2024-05-01T12:00:00.123456789Z");
    }

    #[tokio::test]
    async fn test_read_without_schema_fails() {
        let dir = TempDir::new().unwrap();
        let store = SqliteCounterStore::open(dir.path().join("empty.db")).unwrap();
        assert!(store.read().await.is_err());
    }

    #[tokio::test]
    async fn test_increment_without_row_fails() {
        let dir = TempDir::new().unwrap();
        let store = SqliteCounterStore::open(dir.path().join("norow.db")).unwrap();
        store
            .conn
            .lock()
            .execute_batch("CREATE TABLE t (id INTEGER PRIMARY KEY, value INTEGER, timestamp TEXT)")
            .unwrap();

        let err = store.increment(Utc::now()).await.unwrap_err();
        assert!(err.to_string().contains("counter row missing"));
    }

    #[tokio::test]
    async fn test_second_connection_sees_writes() {
        let (dir, store) = open_store();
        let reader = SqliteCounterStore::open(dir.path().join("counter.db")).unwrap();

        store.increment(Utc::now()).await.unwrap();
        assert_eq!(reader.read().await.unwrap().value, 1);
    }
}
