//! SQLite-backed ledger store.
//!
//! All access is serialized through a `Mutex<Connection>` and runs on the
//! blocking thread pool. Expiry is an `expires_at` column in unix
//! milliseconds; reads ignore expired rows and writes sweep them.

use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};

use super::{migrations, LedgerError, LedgerStore};

#[derive(Clone)]
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Opens (or creates) the database at `path` and runs pending migrations.
    pub fn open(path: &Path) -> Result<Self, LedgerError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| LedgerError::Io {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }

        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        migrations::run_all(&conn)?;

        log::info!("Ledger database opened at {}", path.display());

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn open_in_memory() -> Result<Self, LedgerError> {
        let conn = Connection::open_in_memory()?;
        migrations::run_all(&conn)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Runs `f` with the locked connection on the blocking pool.
    async fn with_conn<F, T>(&self, f: F) -> Result<T, LedgerError>
    where
        F: FnOnce(&Connection) -> Result<T, LedgerError> + Send + 'static,
        T: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let conn = conn.lock().map_err(|_| LedgerError::LockPoisoned)?;
            f(&conn)
        })
        .await
        .map_err(|e| LedgerError::Backend(e.to_string()))?
    }
}

fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

#[async_trait]
impl LedgerStore for SqliteStore {
    async fn set_with_ttl(
        &self,
        key: &str,
        value: String,
        ttl: Duration,
    ) -> Result<(), LedgerError> {
        let key = key.to_string();
        let ttl_ms = i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX);

        self.with_conn(move |conn| {
            let now = now_millis();
            conn.execute(
                "DELETE FROM ledger_entries WHERE expires_at <= ?1",
                params![now],
            )?;
            conn.execute(
                "INSERT INTO ledger_entries (key, value, expires_at) VALUES (?1, ?2, ?3)
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value, expires_at = excluded.expires_at",
                params![key, value, now.saturating_add(ttl_ms)],
            )?;
            Ok(())
        })
        .await
    }

    async fn get(&self, key: &str) -> Result<Option<String>, LedgerError> {
        let key = key.to_string();

        self.with_conn(move |conn| {
            let value = conn
                .query_row(
                    "SELECT value FROM ledger_entries WHERE key = ?1 AND expires_at > ?2",
                    params![key, now_millis()],
                    |row| row.get(0),
                )
                .optional()?;
            Ok(value)
        })
        .await
    }

    async fn push(&self, list: &str, value: String) -> Result<(), LedgerError> {
        let list = list.to_string();

        self.with_conn(move |conn| {
            conn.execute(
                "INSERT INTO ledger_lists (list, value) VALUES (?1, ?2)",
                params![list, value],
            )?;
            Ok(())
        })
        .await
    }

    async fn list_len(&self, list: &str) -> Result<usize, LedgerError> {
        let list = list.to_string();

        self.with_conn(move |conn| {
            let count: i64 = conn.query_row(
                "SELECT COUNT(*) FROM ledger_lists WHERE list = ?1",
                params![list],
                |row| row.get(0),
            )?;
            Ok(usize::try_from(count).unwrap_or(0))
        })
        .await
    }
}
