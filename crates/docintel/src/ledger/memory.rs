use std::collections::HashMap;
use std::sync::RwLock;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use moka::sync::Cache;
use moka::Expiry;

use super::{LedgerError, LedgerStore};

#[derive(Clone)]
struct Entry {
    value: String,
    ttl: Duration,
}

/// Every write restarts the entry's own ttl.
struct PerEntryTtl;

impl Expiry<String, Entry> for PerEntryTtl {
    fn expire_after_create(
        &self,
        _key: &String,
        entry: &Entry,
        _created_at: Instant,
    ) -> Option<Duration> {
        Some(entry.ttl)
    }

    fn expire_after_update(
        &self,
        _key: &String,
        entry: &Entry,
        _updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        Some(entry.ttl)
    }
}

/// In-process ledger store. Entries live in a moka cache with per-entry
/// expiry; lists are plain vectors.
pub struct MemoryStore {
    entries: Cache<String, Entry>,
    lists: RwLock<HashMap<String, Vec<String>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            entries: Cache::builder().expire_after(PerEntryTtl).build(),
            lists: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LedgerStore for MemoryStore {
    async fn set_with_ttl(
        &self,
        key: &str,
        value: String,
        ttl: Duration,
    ) -> Result<(), LedgerError> {
        self.entries.insert(key.to_string(), Entry { value, ttl });
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>, LedgerError> {
        Ok(self.entries.get(key).map(|entry| entry.value))
    }

    async fn push(&self, list: &str, value: String) -> Result<(), LedgerError> {
        let mut lists = match self.lists.write() {
            Ok(guard) => guard,
            Err(poisoned) => {
                log::warn!("Ledger list lock was poisoned, recovering");
                poisoned.into_inner()
            }
        };
        lists.entry(list.to_string()).or_default().push(value);
        Ok(())
    }

    async fn list_len(&self, list: &str) -> Result<usize, LedgerError> {
        let lists = match self.lists.read() {
            Ok(guard) => guard,
            Err(poisoned) => {
                log::warn!("Ledger list lock was poisoned, recovering");
                poisoned.into_inner()
            }
        };
        Ok(lists.get(list).map(Vec::len).unwrap_or(0))
    }
}
