//! Top-level scheduler: spawns N independently-locked periodic tasks,
//! each its own `tokio::spawn`ed loop checkpointing against a shared
//! cancellation token.

use crate::deposit_monitor::DepositMonitor;
use chrono::Utc;
use core_plex::PlexMonitor;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::interval;
use tokio_util::sync::CancellationToken;

pub struct Scheduler {
    deposit_monitor: Arc<DepositMonitor>,
    plex_monitor: Arc<PlexMonitor>,
    deposit_tick: Duration,
    plex_tick: Duration,
}

impl Scheduler {
    pub fn new(deposit_monitor: Arc<DepositMonitor>, plex_monitor: Arc<PlexMonitor>, deposit_tick: Duration, plex_tick: Duration) -> Self {
        Self { deposit_monitor, plex_monitor, deposit_tick, plex_tick }
    }

    /// Spawns both periodic loops, returning their join handles. Each loop
    /// checks `cancel` at the top of every tick and between ticks — never
    /// mid-tick — so a shutdown request always waits for in-flight work to
    /// finish before the loop exits.
    pub fn spawn(self: Arc<Self>, cancel: CancellationToken) -> (tokio::task::JoinHandle<()>, tokio::task::JoinHandle<()>) {
        let deposit_handle = {
            let this = self.clone();
            let cancel = cancel.clone();
            tokio::spawn(async move { this.run_deposit_loop(cancel).await })
        };
        let plex_handle = {
            let this = self.clone();
            let cancel = cancel.clone();
            tokio::spawn(async move { this.run_plex_loop(cancel).await })
        };
        (deposit_handle, plex_handle)
    }

    async fn run_deposit_loop(&self, cancel: CancellationToken) {
        let mut ticker = interval(self.deposit_tick);
        loop {
            if cancel.is_cancelled() {
                return;
            }
            tokio::select! {
                _ = ticker.tick() => {}
                _ = cancel.cancelled() => return,
            }
            if cancel.is_cancelled() {
                return;
            }
            match self.deposit_monitor.run_tick(Utc::now()).await {
                Ok(Some(report)) => tracing::info!(?report, "deposit monitor tick complete"),
                Ok(None) => tracing::debug!("deposit monitor tick skipped, lock held"),
                Err(err) => tracing::error!(error = %err, "deposit monitor tick failed"),
            }
        }
    }

    async fn run_plex_loop(&self, cancel: CancellationToken) {
        let mut ticker = interval(self.plex_tick);
        loop {
            if cancel.is_cancelled() {
                return;
            }
            tokio::select! {
                _ = ticker.tick() => {}
                _ = cancel.cancelled() => return,
            }
            if cancel.is_cancelled() {
                return;
            }
            match self.plex_monitor.run_sweep(Utc::now()).await {
                Ok(report) => tracing::info!(?report, "plex monitor sweep complete"),
                Err(err) => tracing::error!(error = %err, "plex monitor sweep failed"),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_chain::{ChainGateway, PayoutSigner, ProviderPool, RateLimiter};
    use core_lock::{DistributedLock, InMemoryLockBackend};
    use core_notify::NullNotificationSink;
    use core_store::{InMemoryStore, SettingsRepository};
    use core_types::EvmAddress;
    use ethers::providers::{Http, Provider};
    use std::collections::HashMap;

    fn local_chain_gateway() -> ChainGateway {
        let provider = Provider::<Http>::try_from("http://127.0.0.1:1").unwrap();
        let mut providers = HashMap::new();
        providers.insert("primary".to_string(), provider);
        let pool = ProviderPool::new(providers, "primary".to_string(), 56, false).unwrap();
        let limiter = RateLimiter::new(4, 100);
        let payout = PayoutSigner::from_private_key([0xa1u8; 32], 56).unwrap();
        let usdt = EvmAddress::from_bytes([1u8; 20]);
        let plex = EvmAddress::from_bytes([2u8; 20]);
        let system_wallet = EvmAddress::from_bytes([3u8; 20]);
        ChainGateway::new(pool, limiter, usdt, plex, system_wallet, payout, 12, DistributedLock::new(Arc::new(InMemoryLockBackend::new())))
    }

    #[tokio::test]
    async fn shutdown_before_first_tick_exits_promptly() {
        let store = Arc::new(InMemoryStore::new());
        store
            .put_settings(core_types::GlobalSettings {
                max_open_deposit_level: 5,
                min_withdrawal_amount: core_types::Amount::try_from_str("10").unwrap(),
                auto_withdrawal_enabled: true,
                is_daily_limit_enabled: false,
                daily_withdrawal_limit: None,
                emergency_stop_withdrawals: false,
                emergency_stop_deposits: false,
                active_rpc_provider: "primary".to_string(),
                is_auto_switch_enabled: false,
                project_start_at: Utc::now() - chrono::Duration::days(365),
                blockchain_maintenance_mode: false,
                roi_settings: HashMap::new(),
            })
            .await
            .unwrap();

        let chain = Arc::new(local_chain_gateway());
        let referral = Arc::new(core_referral::ReferralEngine::new(store.clone(), Arc::new(NullNotificationSink)));
        let engine = Arc::new(core_deposit::DepositEngine::new(
            store.clone(),
            store.clone(),
            store.clone(),
            DistributedLock::new(Arc::new(InMemoryLockBackend::new())),
            chain.clone(),
            referral,
            Arc::new(NullNotificationSink),
        ));
        let deposit_monitor = Arc::new(DepositMonitor::new(
            store.clone(),
            store.clone(),
            engine,
            chain.clone(),
            Arc::new(NullNotificationSink),
            DistributedLock::new(Arc::new(InMemoryLockBackend::new())),
        ));
        let plex_monitor = Arc::new(PlexMonitor::new(
            store.clone(),
            store,
            chain,
            DistributedLock::new(Arc::new(InMemoryLockBackend::new())),
            Arc::new(NullNotificationSink),
        ));

        let scheduler = Arc::new(Scheduler::new(deposit_monitor, plex_monitor, Duration::from_secs(60), Duration::from_secs(60)));
        let cancel = CancellationToken::new();
        cancel.cancel();
        let (d, p) = scheduler.spawn(cancel);
        tokio::time::timeout(Duration::from_secs(1), d).await.unwrap().unwrap();
        tokio::time::timeout(Duration::from_secs(1), p).await.unwrap().unwrap();
    }
}
