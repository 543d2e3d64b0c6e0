use crate::backend::LockBackend;
use std::sync::Arc;

/// RAII handle for an acquired lock. Releases on drop, including on panic
/// unwind, which is the one place this implementation deliberately diverges
/// from the source's `async with` context manager: Rust's ownership model
/// gives a stronger guarantee than a bare `finally` block does.
pub struct LockGuard {
    backend: Arc<dyn LockBackend>,
    key: String,
    token: String,
    released: bool,
}

impl LockGuard {
    pub(crate) fn new(backend: Arc<dyn LockBackend>, key: String, token: String) -> Self {
        Self { backend, key, token, released: false }
    }

    /// Releases the lock early and explicitly. Calling this is optional;
    /// dropping the guard has the same effect.
    pub async fn release(mut self) {
        self.released = true;
        if let Err(err) = self.backend.release(&self.key, &self.token).await {
            tracing::warn!(key = %self.key, error = %err, "lock release failed");
        }
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        let backend = self.backend.clone();
        let key = self.key.clone();
        let token = self.token.clone();
        tokio::spawn(async move {
            if let Err(err) = backend.release(&key, &token).await {
                tracing::warn!(%key, error = %err, "lock release failed on drop");
            }
        });
    }
}
