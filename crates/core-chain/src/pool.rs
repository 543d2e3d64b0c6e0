//! RPC Provider Pool: a primary provider is used until it fails, at which
//! point the pool retries once against a backup before giving up. Health
//! checks and the settings-driven active-provider switch round this out.

use core_types::{CoreError, GlobalSettingsSnapshot};
use ethers::providers::{Http, Middleware, Provider};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, RwLock};

const SETTINGS_REFRESH_INTERVAL: Duration = Duration::from_secs(30);
const HEALTH_CHECK_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Clone, Debug)]
pub struct ProviderHealth {
    pub name: String,
    pub healthy: bool,
    pub latest_block: Option<u64>,
}

/// A named pool of HTTP JSON-RPC clients with single-hop failover.
///
/// `checked_chain_ids` remembers which backup providers have already had
/// their `eth_chainId` verified against `chain_id`, so a misconfigured
/// backup pointed at the wrong network is never silently promoted twice.
pub struct ProviderPool {
    providers: HashMap<String, Provider<Http>>,
    active_name: RwLock<String>,
    auto_switch_enabled: bool,
    chain_id: u64,
    checked_chain_ids: Mutex<HashSet<String>>,
    last_settings_refresh: Mutex<Instant>,
}

impl ProviderPool {
    pub fn new(providers: HashMap<String, Provider<Http>>, active_name: String, chain_id: u64, auto_switch_enabled: bool) -> Result<Self, CoreError> {
        if !providers.contains_key(&active_name) {
            return Err(CoreError::Internal(format!(
                "active provider {active_name} is not in the pool"
            )));
        }
        Ok(Self {
            providers,
            active_name: RwLock::new(active_name),
            auto_switch_enabled,
            chain_id,
            checked_chain_ids: Mutex::new(HashSet::new()),
            last_settings_refresh: Mutex::new(Instant::now() - SETTINGS_REFRESH_INTERVAL),
        })
    }

    /// Returns a cheap clone of the currently active client. `ethers`'
    /// `Provider` is `Arc`-backed internally, so this is not a new
    /// connection.
    pub async fn get_active(&self) -> Provider<Http> {
        let name = self.active_name.read().await;
        self.providers
            .get(name.as_str())
            .or_else(|| self.providers.values().next())
            .cloned()
            .expect("pool constructed with at least one provider")
    }

    /// Runs `op` against the active provider; on failure, tries exactly one
    /// backup. Never attempts a third provider even if more than two are
    /// configured — this avoids cascading latency when the whole pool is
    /// degraded.
    pub async fn execute<F, T>(&self, op: F) -> Result<T, CoreError>
    where
        F: Fn(Provider<Http>) -> core::pin::Pin<Box<dyn core::future::Future<Output = Result<T, CoreError>> + Send>>,
    {
        let active_name = self.active_name.read().await.clone();
        let active = self.get_active().await;

        match op(active).await {
            Ok(v) => Ok(v),
            Err(primary_err) => {
                // §4.1: the backup attempt itself, not just the promotion
                // afterward, is gated on `auto_switch_enabled` — disabling
                // it must stop traffic from reaching the backup at all.
                if !self.auto_switch_enabled {
                    return Err(primary_err);
                }

                let Some((backup_name, backup)) = self
                    .providers
                    .iter()
                    .find(|(name, _)| *name != &active_name)
                else {
                    return Err(primary_err);
                };

                if self.verify_chain_id(backup_name, backup).await.is_err() {
                    tracing::warn!(provider = %backup_name, "backup provider chain_id mismatch, not promoting");
                    return Err(primary_err);
                }

                let result = op(backup.clone()).await;
                if result.is_ok() {
                    *self.active_name.write().await = backup_name.clone();
                    tracing::warn!(from = %active_name, to = %backup_name, "switched active RPC provider after failover");
                }
                result
            }
        }
    }

    async fn verify_chain_id(&self, name: &str, provider: &Provider<Http>) -> Result<(), CoreError> {
        {
            let checked = self.checked_chain_ids.lock().await;
            if checked.contains(name) {
                return Ok(());
            }
        }
        let id = tokio::time::timeout(HEALTH_CHECK_TIMEOUT, provider.get_chainid())
            .await
            .map_err(|_| CoreError::RpcTimeout)?
            .map_err(|e| CoreError::RpcTransient(e.to_string()))?;
        if id.as_u64() != self.chain_id {
            return Err(CoreError::RpcTransient(format!(
                "provider {name} reports chain_id {id}, expected {}",
                self.chain_id
            )));
        }
        self.checked_chain_ids.lock().await.insert(name.to_string());
        Ok(())
    }

    pub async fn health(&self) -> Vec<ProviderHealth> {
        let mut out = Vec::with_capacity(self.providers.len());
        for (name, provider) in &self.providers {
            let result = tokio::time::timeout(HEALTH_CHECK_TIMEOUT, provider.get_block_number()).await;
            let (healthy, latest_block) = match result {
                Ok(Ok(n)) => (true, Some(n.as_u64())),
                _ => (false, None),
            };
            out.push(ProviderHealth { name: name.clone(), healthy, latest_block });
        }
        out
    }

    /// No-ops unless 30s have elapsed since the last refresh (§4.1).
    pub async fn refresh_settings(&self, settings: &GlobalSettingsSnapshot) {
        let mut last = self.last_settings_refresh.lock().await;
        if last.elapsed() < SETTINGS_REFRESH_INTERVAL {
            return;
        }
        *last = Instant::now();

        if self.providers.contains_key(&settings.active_rpc_provider) {
            let mut active = self.active_name.write().await;
            if *active != settings.active_rpc_provider {
                tracing::info!(provider = %settings.active_rpc_provider, "active RPC provider updated from settings");
                *active = settings.active_rpc_provider.clone();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pool_of(names: &[&str]) -> ProviderPool {
        let mut providers = HashMap::new();
        for name in names {
            providers.insert(name.to_string(), Provider::<Http>::try_from("http://localhost:8545").unwrap());
        }
        ProviderPool::new(providers, names[0].to_string(), 56, true).unwrap()
    }

    #[tokio::test]
    async fn construction_rejects_unknown_active_name() {
        let providers = HashMap::from([(
            "a".to_string(),
            Provider::<Http>::try_from("http://localhost:8545").unwrap(),
        )]);
        let result = ProviderPool::new(providers, "b".to_string(), 56, true);
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn get_active_returns_configured_provider() {
        let pool = pool_of(&["primary", "backup"]);
        let _ = pool.get_active().await;
        assert_eq!(*pool.active_name.read().await, "primary");
    }

    #[tokio::test]
    async fn execute_does_not_attempt_backup_when_auto_switch_disabled() {
        let mut providers = HashMap::new();
        providers.insert("primary".to_string(), Provider::<Http>::try_from("http://localhost:8545").unwrap());
        providers.insert("backup".to_string(), Provider::<Http>::try_from("http://localhost:8546").unwrap());
        let pool = ProviderPool::new(providers, "primary".to_string(), 56, false).unwrap();

        let calls = Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let calls_clone = calls.clone();
        let result: Result<(), CoreError> = pool
            .execute(move |_provider| {
                let calls = calls_clone.clone();
                Box::pin(async move {
                    calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
                    Err(CoreError::RpcTransient("boom".into()))
                })
            })
            .await;

        assert!(result.is_err());
        assert_eq!(calls.load(std::sync::atomic::Ordering::SeqCst), 1);
    }
}
