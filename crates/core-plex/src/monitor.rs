//! Monitoring sweep: activation reminders, warning/block batches, and a
//! verification pass, each step logged with its own counter.

use crate::requirement::PlexPaymentRequirementExt;
use chrono::{DateTime, Utc};
use core_chain::ChainGateway;
use core_lock::DistributedLock;
use core_notify::{NotificationSink, Priority};
use core_store::{DepositRepository, PlexRepository};
use core_types::{constants, CoreError, DepositStatus, DepositStatusExt};
use std::sync::Arc;
use std::time::Duration;

const LOCK_KEY: &str = "plex_monitoring";
const LOCK_TTL: Duration = Duration::from_secs(300);
const LOOKBACK_BLOCKS: u64 = 14_400; // ~24h at 6s blocks, matching the daily check window.
const VERIFY_TOLERANCE_PCT: i64 = 0; // exact-amount match, per §4.6.3 step 5.

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PlexSweepReport {
    pub activated_reminders: u32,
    pub warnings_sent: u32,
    pub blocked: u32,
    pub verified_paid: u32,
}

pub struct PlexMonitor {
    plex: Arc<dyn PlexRepository>,
    deposits: Arc<dyn DepositRepository>,
    chain: Arc<ChainGateway>,
    lock: DistributedLock,
    notify: Arc<dyn NotificationSink>,
}

impl PlexMonitor {
    pub fn new(
        plex: Arc<dyn PlexRepository>,
        deposits: Arc<dyn DepositRepository>,
        chain: Arc<ChainGateway>,
        lock: DistributedLock,
        notify: Arc<dyn NotificationSink>,
    ) -> Self {
        Self { plex, deposits, chain, lock, notify }
    }

    pub async fn run_sweep(&self, now: DateTime<Utc>) -> Result<PlexSweepReport, CoreError> {
        self.lock
            .with_lock(LOCK_KEY, LOCK_TTL, false, Duration::from_secs(0), || self.run_sweep_locked(now))
            .await?
    }

    async fn run_sweep_locked(&self, now: DateTime<Utc>) -> Result<PlexSweepReport, CoreError> {
        let mut report = PlexSweepReport::default();

        // Step 1: activation reminders for requirements never yet paid.
        for requirement in self.plex.list_not_activated().await? {
            if now >= requirement.next_payment_due {
                self.notify
                    .notify_user(
                        requirement.user_id.0,
                        &format!("{} PLEX due for deposit #{}", requirement.daily_plex_required, requirement.deposit_id),
                        false,
                    )
                    .await;
                report.activated_reminders += 1;
            }
        }

        // Step 2: warning batch.
        for mut requirement in self.plex.list_warning_due(now).await? {
            requirement.mark_warning_sent(now);
            self.notify
                .notify_user(requirement.user_id.0, "Your PLEX payment is overdue — pay within 24h to avoid being blocked", true)
                .await;
            self.plex.put(requirement).await?;
            report.warnings_sent += 1;
        }

        // Step 3: block batch. Flips both the requirement and its deposit,
        // since §4.5.4 models `blocked_plex` as a deposit-level status, not
        // just a PLEX-requirement one.
        for mut requirement in self.plex.list_block_due(now).await? {
            requirement.mark_blocked();

            if let Some(mut deposit) = self.deposits.get(requirement.deposit_id).await? {
                if deposit.status != DepositStatus::BlockedPlex {
                    deposit.status.transition(DepositStatus::BlockedPlex)?;
                    self.deposits.put(deposit).await?;
                }
            }

            self.notify
                .notify_user(
                    requirement.user_id.0,
                    &format!("Deposit #{} has been blocked for unpaid PLEX", requirement.deposit_id),
                    true,
                )
                .await;
            self.notify
                .notify_admins(
                    "plex_block",
                    Priority::High,
                    "Deposit blocked for unpaid PLEX",
                    &format!("deposit #{}, user #{}", requirement.deposit_id, requirement.user_id),
                )
                .await;
            self.plex.put(requirement).await?;
            report.blocked += 1;
        }

        // Step 4/5: verification loop against on-chain PLEX transfers.
        for mut requirement in self.plex.list_active_for_verification().await? {
            let Some(deposit) = self.deposits.get(requirement.deposit_id).await? else { continue };
            let Some(wallet) = deposit.wallet_address else { continue };

            if let Some(found) = self
                .chain
                .verify_plex_payment(wallet, requirement.daily_plex_required, LOOKBACK_BLOCKS)
                .await
            {
                requirement.mark_paid(found.tx_hash, found.amount, now);
                self.plex.put(requirement).await?;
                report.verified_paid += 1;
            }
        }

        let _ = VERIFY_TOLERANCE_PCT;
        let _ = constants::PLEX_MONITOR_TICK_SECS;
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration as ChronoDuration;
    use core_lock::InMemoryLockBackend;
    use core_notify::NullNotificationSink;
    use core_store::InMemoryStore;
    use core_types::{Amount, Deposit, DepositId, DepositStatus, DepositType, EvmAddress, UserId};

    fn blank_deposit(id: DepositId, wallet: EvmAddress) -> Deposit {
        let now = Utc::now();
        Deposit {
            id,
            user_id: UserId(1),
            level: 1,
            amount: Amount::try_from_str("100").unwrap(),
            deposit_type: DepositType::Level1,
            status: DepositStatus::Confirmed,
            tx_hash: None,
            block_number: Some(1),
            wallet_address: Some(wallet),
            deposit_version_id: 1,
            roi_cap_amount: Amount::try_from_str("200").unwrap(),
            roi_paid_amount: Amount::ZERO,
            is_roi_completed: false,
            completed_at: None,
            next_accrual_at: Some(now),
            is_consolidated: false,
            consolidated_at: None,
            consolidated_tx_hashes: Vec::new(),
            plex_daily_required: Amount::try_from_str("1000").unwrap(),
            plex_cycle_start: None,
            created_at: now,
            confirmed_at: Some(now),
            updated_at: now,
        }
    }

    fn local_chain_gateway() -> ChainGateway {
        use core_chain::{PayoutSigner, ProviderPool, RateLimiter};
        use ethers::providers::{Http, Provider};
        use std::collections::HashMap;

        let provider = Provider::<Http>::try_from("http://127.0.0.1:1").unwrap();
        let mut providers = HashMap::new();
        providers.insert("primary".to_string(), provider);
        let pool = ProviderPool::new(providers, "primary".to_string(), 56, false).unwrap();
        let limiter = RateLimiter::new(4, 100);
        let payout = PayoutSigner::from_private_key([0x42u8; 32], 56).unwrap();
        let usdt = EvmAddress::from_bytes([1u8; 20]);
        let plex = EvmAddress::from_bytes([2u8; 20]);
        let system_wallet = EvmAddress::from_bytes([3u8; 20]);
        ChainGateway::new(pool, limiter, usdt, plex, system_wallet, payout, 12, DistributedLock::new(Arc::new(InMemoryLockBackend::new())))
    }

    #[tokio::test]
    async fn block_batch_transitions_and_counts() {
        let store = Arc::new(InMemoryStore::new());
        let deposit_id = DepositId(1);
        let wallet = EvmAddress::from_bytes([3u8; 20]);
        store.put(blank_deposit(deposit_id, wallet)).await.unwrap();

        let now = Utc::now();
        let mut req = crate::requirement::PlexPaymentRequirementExt::new_for_deposit(
            deposit_id,
            UserId(1),
            Amount::try_from_str("1000").unwrap(),
            now - ChronoDuration::hours(50),
        );
        req.next_payment_due = now - ChronoDuration::hours(50);
        req.block_due = now - ChronoDuration::hours(1);
        core_store::PlexRepository::put(&*store, req).await.unwrap();

        let lock = DistributedLock::new(Arc::new(InMemoryLockBackend::new()));
        let monitor = PlexMonitor::new(store.clone(), store.clone(), Arc::new(local_chain_gateway()), lock, Arc::new(NullNotificationSink));

        let report = monitor.run_sweep(now).await.unwrap();
        assert_eq!(report.blocked, 1);
        assert_eq!(report.verified_paid, 0);

        let deposit = core_store::DepositRepository::get(&*store, deposit_id).await.unwrap().unwrap();
        assert_eq!(deposit.status, DepositStatus::BlockedPlex);
    }
}
