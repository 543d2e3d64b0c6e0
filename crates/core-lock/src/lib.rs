//! Distributed Lock: named mutual exclusion across processes.
//!
//! A named lock with a lease TTL, backed by a pluggable [`LockBackend`].
//! The production backend (`RedisLockBackend`) uses atomic SETNX-with-expiry;
//! the in-memory backend is a relational-row-style fallback used for
//! tests and single-process deployments.

mod backend;
mod guard;
mod memory;
mod redis_backend;

pub use backend::LockBackend;
pub use guard::LockGuard;
pub use memory::InMemoryLockBackend;
pub use redis_backend::RedisLockBackend;

use core_types::CoreError;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{sleep, Instant};

/// Interval between re-polls while waiting for a held lock to free up.
const BLOCKING_POLL_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Clone)]
pub struct DistributedLock {
    backend: Arc<dyn LockBackend>,
}

impl DistributedLock {
    pub fn new(backend: Arc<dyn LockBackend>) -> Self {
        Self { backend }
    }

    /// Attempts to acquire `key`, waiting up to `blocking_timeout` if the key
    /// is currently held and `blocking` is true. On success, runs `body` and
    /// releases the lock (via RAII guard) regardless of how `body` returns,
    /// including on panic unwind.
    pub async fn with_lock<F, Fut, T>(
        &self,
        key: &str,
        lease: Duration,
        blocking: bool,
        blocking_timeout: Duration,
        body: F,
    ) -> Result<T, CoreError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        let guard = self.acquire(key, lease, blocking, blocking_timeout).await?;
        let result = body().await;
        drop(guard);
        Ok(result)
    }

    /// Lower-level acquire returning an RAII guard; prefer [`with_lock`] when
    /// the body doesn't need to outlive a single expression.
    pub async fn acquire(
        &self,
        key: &str,
        lease: Duration,
        blocking: bool,
        blocking_timeout: Duration,
    ) -> Result<LockGuard, CoreError> {
        let token = random_token();
        let deadline = Instant::now() + blocking_timeout;

        loop {
            if self.backend.try_acquire(key, &token, lease).await? {
                return Ok(LockGuard::new(self.backend.clone(), key.to_string(), token));
            }
            if !blocking || Instant::now() >= deadline {
                return Err(CoreError::LockUnavailable { key: key.to_string() });
            }
            sleep(BLOCKING_POLL_INTERVAL).await;
        }
    }
}

fn random_token() -> String {
    use rand::Rng;
    let mut rng = rand::thread_rng();
    let bytes: [u8; 16] = rng.gen();
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn two_acquires_on_same_key_serialize() {
        let backend = Arc::new(InMemoryLockBackend::new());
        let lock = DistributedLock::new(backend);

        let guard = lock
            .acquire("user:1:create_deposit", Duration::from_secs(5), false, Duration::from_millis(10))
            .await
            .unwrap();

        let second = lock
            .acquire("user:1:create_deposit", Duration::from_secs(5), false, Duration::from_millis(10))
            .await;
        assert!(matches!(second, Err(CoreError::LockUnavailable { .. })));

        drop(guard);

        let third = lock
            .acquire("user:1:create_deposit", Duration::from_secs(5), false, Duration::from_millis(10))
            .await;
        assert!(third.is_ok());
    }

    #[tokio::test]
    async fn blocking_acquire_waits_for_release() {
        let backend = Arc::new(InMemoryLockBackend::new());
        let lock = DistributedLock::new(backend);

        let guard = lock
            .acquire("nonce_lock:0xabc", Duration::from_secs(5), false, Duration::from_millis(10))
            .await
            .unwrap();

        let lock2 = lock.clone();
        let waiter = tokio::spawn(async move {
            lock2
                .acquire("nonce_lock:0xabc", Duration::from_secs(5), true, Duration::from_secs(1))
                .await
        });

        tokio::time::sleep(Duration::from_millis(50)).await;
        drop(guard);

        let result = waiter.await.unwrap();
        assert!(result.is_ok());
    }
}
