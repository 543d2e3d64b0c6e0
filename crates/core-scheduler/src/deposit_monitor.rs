//! Deposit monitor tick: network-recovery conversion, 24h-timeout
//! failure, and confirmation-depth confirmation, all under one
//! `deposit_monitoring` lock per tick.

use chrono::{DateTime, Duration, Utc};
use core_chain::ChainGateway;
use core_deposit::DepositEngine;
use core_lock::DistributedLock;
use core_notify::NotificationSink;
use core_store::{DepositRepository, SettingsRepository};
use core_types::{constants, Amount, CoreError, Deposit, DepositStatus, EvmAddress};
use rust_decimal::Decimal;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration as StdDuration;

const LOCK_KEY: &str = "deposit_monitoring";
const LOCK_TTL: StdDuration = StdDuration::from_secs(300);
const SCAN_CHUNK_BLOCKS: u64 = 5_000;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DepositMonitorReport {
    pub recovery_confirmed: u32,
    pub recovery_reverted_to_pending: u32,
    pub expired: u32,
    pub confirmed: u32,
    pub still_pending: u32,
}

pub struct DepositMonitor {
    deposits: Arc<dyn DepositRepository>,
    settings: Arc<dyn SettingsRepository>,
    engine: Arc<DepositEngine>,
    chain: Arc<ChainGateway>,
    notify: Arc<dyn NotificationSink>,
    lock: DistributedLock,
}

impl DepositMonitor {
    pub fn new(
        deposits: Arc<dyn DepositRepository>,
        settings: Arc<dyn SettingsRepository>,
        engine: Arc<DepositEngine>,
        chain: Arc<ChainGateway>,
        notify: Arc<dyn NotificationSink>,
        lock: DistributedLock,
    ) -> Self {
        Self { deposits, settings, engine, chain, notify, lock }
    }

    /// Runs one tick. A held lock (a previous tick still running) is not
    /// queued — this tick is simply skipped, matching "missed ticks do not
    /// queue" (§4.9).
    pub async fn run_tick(&self, now: DateTime<Utc>) -> Result<Option<DepositMonitorReport>, CoreError> {
        match self.lock.acquire(LOCK_KEY, LOCK_TTL, false, StdDuration::from_secs(0)).await {
            Ok(guard) => {
                let report = self.run_tick_locked(now).await?;
                drop(guard);
                Ok(Some(report))
            }
            Err(CoreError::LockUnavailable { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn run_tick_locked(&self, now: DateTime<Utc>) -> Result<DepositMonitorReport, CoreError> {
        let mut report = DepositMonitorReport::default();

        // Step 1/2: network-recovery deposits, only once maintenance mode lifted.
        let settings = self.settings.get_settings().await?;
        if !settings.blockchain_maintenance_mode {
            for deposit in self.deposits.list_pending_network_recovery().await? {
                if self.try_find_and_confirm(&deposit).await? {
                    report.recovery_confirmed += 1;
                } else {
                    let mut d = deposit;
                    d.status.transition(DepositStatus::Pending)?;
                    d.updated_at = now;
                    self.deposits.put(d).await?;
                    report.recovery_reverted_to_pending += 1;
                }
            }
        }

        // Step 3: deposits pending without a tx_hash for longer than the timeout.
        let cutoff = now - Duration::hours(constants::DEPOSIT_PENDING_TIMEOUT_HOURS);
        for deposit in self.deposits.list_pending_without_tx_older_than(cutoff).await? {
            if self.try_find_and_confirm(&deposit).await? {
                report.confirmed += 1;
                continue;
            }
            let mut d = deposit;
            d.status.transition(DepositStatus::Failed)?;
            d.updated_at = now;
            let user_id = d.user_id.0;
            let level = d.level;
            self.deposits.put(d).await?;
            self.notify
                .notify_user(user_id, &format!("Deposit request for level {level} expired after 24h without an on-chain transaction"), false)
                .await;
            report.expired += 1;
        }

        // Step 4: deposits pending with a known tx_hash — check confirmation depth.
        for deposit in self.deposits.list_pending_with_tx().await? {
            let Some(tx_hash) = deposit.tx_hash else { continue };
            match self.chain.transaction_confirmations(tx_hash).await {
                Some((0, _)) => {
                    let mut d = deposit;
                    d.status.transition(DepositStatus::Failed)?;
                    d.updated_at = now;
                    self.deposits.put(d).await?;
                    report.expired += 1;
                }
                Some((confirmations, block_number)) if confirmations >= self.chain.confirmation_blocks() => {
                    self.engine.confirm_deposit(deposit.id, block_number, tx_hash).await?;
                    report.confirmed += 1;
                }
                _ => report.still_pending += 1,
            }
        }

        Ok(report)
    }

    /// Scans the chain for a deposit's expected USDT transfer, confirming it
    /// in place if found. `false` means the caller should fall through to
    /// its own not-found handling (revert to pending, or mark expired).
    async fn try_find_and_confirm(&self, deposit: &Deposit) -> Result<bool, CoreError> {
        let Some(wallet) = deposit.wallet_address else { return Ok(false) };
        let Some(found) = self.find_matching_deposit(wallet, deposit.amount).await else { return Ok(false) };

        self.deposits_set_tx_hash(deposit, found.tx_hash).await?;
        self.engine.confirm_deposit(deposit.id, found.block_number, found.tx_hash).await?;
        Ok(true)
    }

    async fn deposits_set_tx_hash(&self, deposit: &Deposit, tx_hash: core_types::TxHash) -> Result<(), CoreError> {
        let mut d = deposit.clone();
        d.tx_hash = Some(tx_hash);
        d.updated_at = Utc::now();
        self.deposits.put(d).await
    }

    async fn find_matching_deposit(&self, wallet: EvmAddress, expected: Amount) -> Option<core_chain::DepositMatch> {
        let tolerance = Amount::from_decimal(expected.as_decimal() * Decimal::from_str("0.05").ok()?);
        let matches = self.chain.scan_deposits(wallet, constants::MAX_SCAN_WINDOW_BLOCKS, SCAN_CHUNK_BLOCKS).await;
        matches.into_iter().find(|m| {
            let diff = if m.amount >= expected { m.amount.saturating_sub(expected) } else { expected.saturating_sub(m.amount) };
            diff <= tolerance
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_lock::InMemoryLockBackend;
    use core_notify::NullNotificationSink;
    use core_store::InMemoryStore;
    use core_types::{DepositId, DepositLevelVersion, DepositType, GlobalSettings, UserId};
    use std::collections::HashMap;

    fn settings() -> GlobalSettings {
        GlobalSettings {
            max_open_deposit_level: 5,
            min_withdrawal_amount: Amount::try_from_str("10").unwrap(),
            auto_withdrawal_enabled: true,
            is_daily_limit_enabled: false,
            daily_withdrawal_limit: None,
            emergency_stop_withdrawals: false,
            emergency_stop_deposits: false,
            active_rpc_provider: "primary".to_string(),
            is_auto_switch_enabled: false,
            project_start_at: Utc::now() - Duration::days(365),
            blockchain_maintenance_mode: false,
            roi_settings: HashMap::new(),
        }
    }

    fn local_chain_gateway() -> ChainGateway {
        use core_chain::{PayoutSigner, ProviderPool, RateLimiter};
        use ethers::providers::{Http, Provider};

        let provider = Provider::<Http>::try_from("http://127.0.0.1:1").unwrap();
        let mut providers = HashMap::new();
        providers.insert("primary".to_string(), provider);
        let pool = ProviderPool::new(providers, "primary".to_string(), 56, false).unwrap();
        let limiter = RateLimiter::new(4, 100);
        let payout = PayoutSigner::from_private_key([0x91u8; 32], 56).unwrap();
        let usdt = EvmAddress::from_bytes([1u8; 20]);
        let plex = EvmAddress::from_bytes([2u8; 20]);
        let system_wallet = EvmAddress::from_bytes([3u8; 20]);
        ChainGateway::new(pool, limiter, usdt, plex, system_wallet, payout, 12, DistributedLock::new(Arc::new(InMemoryLockBackend::new())))
    }

    fn pending_deposit(id: i64, created_at: DateTime<Utc>, tx_hash: Option<core_types::TxHash>) -> Deposit {
        Deposit {
            id: DepositId(id),
            user_id: UserId(1),
            level: 1,
            amount: Amount::try_from_str("100").unwrap(),
            deposit_type: DepositType::Level1,
            status: DepositStatus::Pending,
            tx_hash,
            block_number: None,
            wallet_address: Some(EvmAddress::from_bytes([7u8; 20])),
            deposit_version_id: 1,
            roi_cap_amount: Amount::try_from_str("200").unwrap(),
            roi_paid_amount: Amount::ZERO,
            is_roi_completed: false,
            completed_at: None,
            next_accrual_at: None,
            is_consolidated: false,
            consolidated_at: None,
            consolidated_tx_hashes: Vec::new(),
            plex_daily_required: Amount::try_from_str("1000").unwrap(),
            plex_cycle_start: None,
            created_at,
            confirmed_at: None,
            updated_at: created_at,
        }
    }

    async fn monitor(store: Arc<InMemoryStore>) -> DepositMonitor {
        let lock = DistributedLock::new(Arc::new(InMemoryLockBackend::new()));
        let referral = Arc::new(core_referral::ReferralEngine::new(store.clone(), Arc::new(NullNotificationSink)));
        let chain = Arc::new(local_chain_gateway());
        let engine = Arc::new(DepositEngine::new(
            store.clone(),
            store.clone(),
            store.clone(),
            DistributedLock::new(Arc::new(InMemoryLockBackend::new())),
            chain.clone(),
            referral,
            Arc::new(NullNotificationSink),
        ));
        store
            .seed_level_version(DepositLevelVersion {
                level: 1,
                amount: Amount::try_from_str("100").unwrap(),
                roi_cap_percent: Amount::try_from_str("200").unwrap(),
                is_active: true,
                version_number: 1,
            })
            .await;
        DepositMonitor::new(store.clone(), store, engine, chain, Arc::new(NullNotificationSink), lock)
    }

    #[tokio::test]
    async fn expires_pending_deposit_with_no_tx_past_timeout() {
        let store = Arc::new(InMemoryStore::new());
        store.put_settings(settings()).await.unwrap();
        let now = Utc::now();
        let old = pending_deposit(1, now - Duration::hours(25), None);
        core_store::DepositRepository::put(&*store, old).await.unwrap();

        let m = monitor(store.clone()).await;
        let report = m.run_tick(now).await.unwrap().unwrap();
        assert_eq!(report.expired, 1);

        let stored = core_store::DepositRepository::get(&*store, DepositId(1)).await.unwrap().unwrap();
        assert_eq!(stored.status, DepositStatus::Failed);
    }

    #[tokio::test]
    async fn leaves_recent_pending_deposit_without_tx_alone() {
        let store = Arc::new(InMemoryStore::new());
        store.put_settings(settings()).await.unwrap();
        let now = Utc::now();
        let recent = pending_deposit(1, now - Duration::hours(1), None);
        core_store::DepositRepository::put(&*store, recent).await.unwrap();

        let m = monitor(store.clone()).await;
        let report = m.run_tick(now).await.unwrap().unwrap();
        assert_eq!(report.expired, 0);

        let stored = core_store::DepositRepository::get(&*store, DepositId(1)).await.unwrap().unwrap();
        assert_eq!(stored.status, DepositStatus::Pending);
    }

    #[tokio::test]
    async fn second_concurrent_tick_is_skipped_not_queued() {
        let store = Arc::new(InMemoryStore::new());
        store.put_settings(settings()).await.unwrap();
        let m = monitor(store).await;

        let guard = m.lock.acquire(LOCK_KEY, LOCK_TTL, false, StdDuration::from_secs(0)).await.unwrap();
        let result = m.run_tick(Utc::now()).await.unwrap();
        assert!(result.is_none());
        drop(guard);
    }
}
