use async_trait::async_trait;
use core_types::CoreError;
use std::time::Duration;

/// Pluggable backing store for the distributed lock's SETNX-with-expiry +
/// delete semantics (§4.3).
#[async_trait]
pub trait LockBackend: Send + Sync {
    /// Attempts to set `key` to `token` with `ttl`, only if `key` is absent
    /// or already expired. Returns whether the acquisition succeeded.
    async fn try_acquire(&self, key: &str, token: &str, ttl: Duration) -> Result<bool, CoreError>;

    /// Deletes `key` only if its current value equals `token` — this is what
    /// makes release idempotent and safe even after the lease has expired and
    /// some other holder has since acquired the same key.
    async fn release(&self, key: &str, token: &str) -> Result<(), CoreError>;
}
