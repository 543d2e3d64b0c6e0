use crate::backend::LockBackend;
use async_trait::async_trait;
use core_types::CoreError;
use redis::aio::ConnectionManager;
use std::time::Duration;

/// Redis-backed lock: `SET key token NX PX ttl_ms` for acquisition, a
/// check-then-delete Lua script for release (so a holder can never delete a
/// lock acquired by someone else after its lease expired).
pub struct RedisLockBackend {
    conn: ConnectionManager,
}

impl RedisLockBackend {
    pub async fn connect(url: &str) -> Result<Self, CoreError> {
        let client = redis::Client::open(url).map_err(|e| CoreError::Internal(e.to_string()))?;
        let conn = client
            .get_tokio_connection_manager()
            .await
            .map_err(|e| CoreError::Internal(e.to_string()))?;
        Ok(Self { conn })
    }
}

const RELEASE_SCRIPT: &str = r#"
if redis.call("GET", KEYS[1]) == ARGV[1] then
    return redis.call("DEL", KEYS[1])
else
    return 0
end
"#;

#[async_trait]
impl LockBackend for RedisLockBackend {
    async fn try_acquire(&self, key: &str, token: &str, ttl: Duration) -> Result<bool, CoreError> {
        let mut conn = self.conn.clone();
        let result: Option<String> = redis::cmd("SET")
            .arg(key)
            .arg(token)
            .arg("NX")
            .arg("PX")
            .arg(ttl.as_millis() as u64)
            .query_async(&mut conn)
            .await
            .map_err(|e| CoreError::RpcTransient(e.to_string()))?;
        Ok(result.is_some())
    }

    async fn release(&self, key: &str, token: &str) -> Result<(), CoreError> {
        let mut conn = self.conn.clone();
        let script = redis::Script::new(RELEASE_SCRIPT);
        script
            .key(key)
            .arg(token)
            .invoke_async::<_, i64>(&mut conn)
            .await
            .map_err(|e| CoreError::RpcTransient(e.to_string()))?;
        Ok(())
    }
}
