use std::time::Duration;

use async_trait::async_trait;

use super::LedgerError;

/// Expiring key-value storage plus append-only lists.
///
/// Each `set_with_ttl` restarts the entry's expiry window. An expired entry
/// reads exactly like a key that was never written.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    async fn set_with_ttl(&self, key: &str, value: String, ttl: Duration)
        -> Result<(), LedgerError>;

    async fn get(&self, key: &str) -> Result<Option<String>, LedgerError>;

    async fn push(&self, list: &str, value: String) -> Result<(), LedgerError>;

    async fn list_len(&self, list: &str) -> Result<usize, LedgerError>;
}
