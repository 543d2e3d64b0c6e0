//! Deposit Engine: creation (six ordered checks under a per-user lock)
//! and confirmation (requirement creation, referral fan-out).

use chrono::Utc;
use core_chain::ChainGateway;
use core_lock::DistributedLock;
use core_notify::NotificationSink;
use core_plex::PlexPaymentRequirementExt;
use core_referral::ReferralEngine;
use core_store::{DepositRepository, PlexRepository, SettingsRepository};
use core_types::{
    constants, Amount, CoreError, Deposit, DepositId, DepositStatus, DepositStatusExt, DepositType,
    PlexPaymentRequirement, ReferralSourceType, TxHash, UserId, ValidationKind,
};
use rust_decimal::Decimal;
use std::sync::Arc;
use std::time::Duration;

const CREATE_LOCK_TTL: Duration = Duration::from_secs(30);
const CREATE_LOCK_BLOCKING_TIMEOUT: Duration = Duration::from_secs(5);

/// The chain client is kept on the struct (not just passed to methods that
/// need it) because §4.5.5 ties deposit confirmation to an eventual
/// consolidation sweep that reads wallet balances; it is unused by the two
/// methods implemented here but is part of the engine's public shape.
pub struct DepositEngine {
    store: Arc<dyn DepositRepository>,
    plex: Arc<dyn PlexRepository>,
    settings: Arc<dyn SettingsRepository>,
    lock: DistributedLock,
    #[allow(dead_code)]
    chain: Arc<ChainGateway>,
    referral: Arc<ReferralEngine>,
    notify: Arc<dyn NotificationSink>,
}

impl DepositEngine {
    pub fn new(
        store: Arc<dyn DepositRepository>,
        plex: Arc<dyn PlexRepository>,
        settings: Arc<dyn SettingsRepository>,
        lock: DistributedLock,
        chain: Arc<ChainGateway>,
        referral: Arc<ReferralEngine>,
        notify: Arc<dyn NotificationSink>,
    ) -> Self {
        Self { store, plex, settings, lock, chain, referral, notify }
    }

    /// §4.5.1: runs the six checks in order under `user:{id}:create_deposit`,
    /// short-circuiting on the first failure.
    pub async fn create_deposit(
        &self,
        user_id: UserId,
        level: u8,
        amount: Amount,
        tx_hash: Option<TxHash>,
    ) -> Result<Deposit, CoreError> {
        let key = format!("user:{}:create_deposit", user_id.0);
        self.lock
            .with_lock(&key, CREATE_LOCK_TTL, true, CREATE_LOCK_BLOCKING_TIMEOUT, || {
                self.create_deposit_locked(user_id, level, amount, tx_hash)
            })
            .await?
    }

    async fn create_deposit_locked(
        &self,
        user_id: UserId,
        level: u8,
        amount: Amount,
        tx_hash: Option<TxHash>,
    ) -> Result<Deposit, CoreError> {
        let settings = self.settings.get_settings().await?;

        // 1. emergency stop
        if settings.emergency_stop_deposits {
            return Err(CoreError::EmergencyStop);
        }
        // 2. level in 1..=5
        if !(1..=5).contains(&level) {
            return Err(CoreError::validation(ValidationKind::InvalidLevel));
        }
        // 3. amount > 0
        if amount.is_zero() {
            return Err(CoreError::validation(ValidationKind::InvalidAmount));
        }
        // 4. amount >= MIN_DEPOSIT
        let floor = Amount::try_from_str(constants::MIN_DEPOSIT).expect("valid constant");
        if amount < floor {
            return Err(CoreError::validation(ValidationKind::BelowMinimum));
        }
        // 5. level version exists and is active
        let level_version = self
            .store
            .get_level_version(level)
            .await?
            .filter(|lv| lv.is_active)
            .ok_or_else(|| CoreError::validation(ValidationKind::LevelUnavailable))?;
        // 6. amount >= level_version.amount
        if amount < level_version.amount {
            return Err(CoreError::validation(ValidationKind::AmountTooLow));
        }

        let id = self.store.next_id().await?;
        let now = Utc::now();
        let status = if settings.blockchain_maintenance_mode {
            DepositStatus::PendingNetworkRecovery
        } else {
            DepositStatus::Pending
        };

        let deposit = Deposit {
            id,
            user_id,
            level,
            amount,
            deposit_type: deposit_type_for_level(level),
            status,
            tx_hash,
            block_number: None,
            wallet_address: None,
            deposit_version_id: level_version.version_number,
            roi_cap_amount: level_version.roi_cap_for(amount),
            roi_paid_amount: Amount::ZERO,
            is_roi_completed: false,
            completed_at: None,
            next_accrual_at: None,
            is_consolidated: false,
            consolidated_at: None,
            consolidated_tx_hashes: Vec::new(),
            plex_daily_required: Amount::from_decimal(
                amount.as_decimal() * Decimal::from(constants::PLEX_PER_DOLLAR),
            ),
            plex_cycle_start: None,
            created_at: now,
            confirmed_at: None,
            updated_at: now,
        };

        self.store.put(deposit.clone()).await?;
        Ok(deposit)
    }

    /// §4.5.2: idempotent on an already-`Confirmed` deposit. Starts the ROI
    /// accrual clock, creates the PLEX payment requirement, and fans out a
    /// `Deposit`-type referral reward. Referral failures are logged and
    /// swallowed (§7 propagation policy) — a deposit that is already on
    /// chain must never be un-confirmed because a downstream reward write
    /// failed.
    pub async fn confirm_deposit(&self, deposit_id: DepositId, block_number: u64, tx_hash: TxHash) -> Result<(), CoreError> {
        let mut deposit = self
            .store
            .get(deposit_id)
            .await?
            .ok_or_else(|| CoreError::Internal(format!("unknown deposit {deposit_id}")))?;

        if matches!(deposit.status, DepositStatus::Confirmed) {
            return Ok(());
        }

        let now = Utc::now();
        deposit.status.transition(DepositStatus::Confirmed)?;
        deposit.block_number = Some(block_number);
        deposit.tx_hash = Some(tx_hash);
        deposit.confirmed_at = Some(now);
        deposit.updated_at = now;

        let settings = self.settings.get_settings().await?;
        let period_hours = settings.reward_accrual_period_hours();
        deposit.next_accrual_at = Some(now + chrono::Duration::hours(period_hours));

        self.store.put(deposit.clone()).await?;

        let mut requirement = PlexPaymentRequirement::new_for_deposit(
            deposit.id,
            deposit.user_id,
            deposit.plex_daily_required,
            now,
        );
        requirement.realign_to_project_start(settings.project_start_at, now);
        self.plex.put(requirement).await?;

        let source_event_id = format!("deposit-{}", deposit.id);
        if let Err(err) = self
            .referral
            .distribute_reward(deposit.user_id, deposit.amount, ReferralSourceType::Deposit, &source_event_id, now)
            .await
        {
            tracing::warn!(error = %err, deposit_id = %deposit.id, "referral reward distribution failed for confirmed deposit");
        }

        self.notify
            .notify_user(deposit.user_id.0, &format!("Deposit #{} confirmed on-chain", deposit.id), false)
            .await;

        Ok(())
    }
}

pub(crate) fn deposit_type_for_level(level: u8) -> DepositType {
    match level {
        1 => DepositType::Level1,
        2 => DepositType::Level2,
        3 => DepositType::Level3,
        4 => DepositType::Level4,
        5 => DepositType::Level5,
        _ => DepositType::Test,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration as ChronoDuration;
    use core_lock::InMemoryLockBackend;
    use core_notify::NullNotificationSink;
    use core_store::InMemoryStore;
    use core_types::{DepositLevelVersion, EvmAddress, GlobalSettings};
    use std::collections::HashMap;

    fn settings(maintenance: bool) -> GlobalSettings {
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
            project_start_at: Utc::now() - ChronoDuration::days(365),
            blockchain_maintenance_mode: maintenance,
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
        let payout = PayoutSigner::from_private_key([0x7au8; 32], 56).unwrap();
        let usdt = EvmAddress::from_bytes([1u8; 20]);
        let plex = EvmAddress::from_bytes([2u8; 20]);
        let system_wallet = EvmAddress::from_bytes([3u8; 20]);
        ChainGateway::new(pool, limiter, usdt, plex, system_wallet, payout, 12, DistributedLock::new(Arc::new(InMemoryLockBackend::new())))
    }

    async fn engine(store: Arc<InMemoryStore>) -> DepositEngine {
        let lock = DistributedLock::new(Arc::new(InMemoryLockBackend::new()));
        let referral = Arc::new(ReferralEngine::new(store.clone(), Arc::new(NullNotificationSink)));
        DepositEngine::new(
            store.clone(),
            store.clone(),
            store,
            lock,
            Arc::new(local_chain_gateway()),
            referral,
            Arc::new(NullNotificationSink),
        )
    }

    async fn seed_level(store: &InMemoryStore, level: u8, amount: &str, active: bool) {
        store
            .seed_level_version(DepositLevelVersion {
                level,
                amount: Amount::try_from_str(amount).unwrap(),
                roi_cap_percent: Amount::try_from_str("200").unwrap(),
                is_active: active,
                version_number: 1,
            })
            .await;
    }

    #[tokio::test]
    async fn create_deposit_rejects_amount_below_level_minimum() {
        let store = Arc::new(InMemoryStore::new());
        store.put_settings(settings(false)).await.unwrap();
        seed_level(&store, 1, "100", true).await;
        let e = engine(store).await;

        let result = e.create_deposit(UserId(1), 1, Amount::try_from_str("50").unwrap(), None).await;
        assert!(matches!(result, Err(CoreError::Validation(ValidationKind::AmountTooLow))));
    }

    #[tokio::test]
    async fn create_deposit_rejects_invalid_level() {
        let store = Arc::new(InMemoryStore::new());
        store.put_settings(settings(false)).await.unwrap();
        let e = engine(store).await;

        let result = e.create_deposit(UserId(1), 9, Amount::try_from_str("100").unwrap(), None).await;
        assert!(matches!(result, Err(CoreError::Validation(ValidationKind::InvalidLevel))));
    }

    #[tokio::test]
    async fn create_deposit_honors_emergency_stop() {
        let store = Arc::new(InMemoryStore::new());
        let mut s = settings(false);
        s.emergency_stop_deposits = true;
        store.put_settings(s).await.unwrap();
        let e = engine(store).await;

        let result = e.create_deposit(UserId(1), 1, Amount::try_from_str("100").unwrap(), None).await;
        assert!(matches!(result, Err(CoreError::EmergencyStop)));
    }

    #[tokio::test]
    async fn create_deposit_under_maintenance_is_pending_network_recovery() {
        let store = Arc::new(InMemoryStore::new());
        store.put_settings(settings(true)).await.unwrap();
        seed_level(&store, 1, "100", true).await;
        let e = engine(store).await;

        let deposit = e.create_deposit(UserId(1), 1, Amount::try_from_str("100").unwrap(), None).await.unwrap();
        assert_eq!(deposit.status, DepositStatus::PendingNetworkRecovery);
    }

    #[tokio::test]
    async fn confirm_deposit_is_idempotent() {
        let store = Arc::new(InMemoryStore::new());
        store.put_settings(settings(false)).await.unwrap();
        seed_level(&store, 1, "100", true).await;
        let e = engine(store.clone()).await;

        let deposit = e.create_deposit(UserId(1), 1, Amount::try_from_str("100").unwrap(), None).await.unwrap();
        let tx = TxHash::from_bytes([4u8; 32]);
        e.confirm_deposit(deposit.id, 10, tx).await.unwrap();
        // second call on an already-confirmed deposit is a no-op, not an error.
        e.confirm_deposit(deposit.id, 10, tx).await.unwrap();

        let stored = core_store::DepositRepository::get(&*store, deposit.id).await.unwrap().unwrap();
        assert_eq!(stored.status, DepositStatus::Confirmed);
        assert!(stored.next_accrual_at.is_some());
    }
}
