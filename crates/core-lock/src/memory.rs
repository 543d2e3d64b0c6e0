use crate::backend::LockBackend;
use async_trait::async_trait;
use core_types::CoreError;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

struct Entry {
    token: String,
    expires_at: Instant,
}

/// In-process lock backend. Serves as both the test double for
/// `core-lock`'s own test suite and the documented "relational-row
/// fallback" for single-instance deployments that don't run Redis.
pub struct InMemoryLockBackend {
    entries: Mutex<HashMap<String, Entry>>,
}

impl InMemoryLockBackend {
    pub fn new() -> Self {
        Self { entries: Mutex::new(HashMap::new()) }
    }
}

impl Default for InMemoryLockBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LockBackend for InMemoryLockBackend {
    async fn try_acquire(&self, key: &str, token: &str, ttl: Duration) -> Result<bool, CoreError> {
        let mut entries = self.entries.lock().map_err(|_| CoreError::Internal("lock poisoned".into()))?;
        let now = Instant::now();
        if let Some(existing) = entries.get(key) {
            if existing.expires_at > now {
                return Ok(false);
            }
        }
        entries.insert(key.to_string(), Entry { token: token.to_string(), expires_at: now + ttl });
        Ok(true)
    }

    async fn release(&self, key: &str, token: &str) -> Result<(), CoreError> {
        let mut entries = self.entries.lock().map_err(|_| CoreError::Internal("lock poisoned".into()))?;
        if let Some(existing) = entries.get(key) {
            if existing.token == token {
                entries.remove(key);
            }
        }
        Ok(())
    }
}
