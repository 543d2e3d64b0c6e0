use crate::traits::{
    DepositRepository, PlexRepository, ReferralRepository, SettingsRepository,
    TransactionRepository, UserRepository,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use core_types::{
    Amount, CoreError, Deposit, DepositId, DepositLevelVersion, DepositStatus, EvmAddress,
    GlobalSettings, GlobalSettingsSnapshot, PlexPaymentRequirement, PlexPaymentStatus, Referral,
    ReferralEarning, ReferralEarningId, Transaction, TransactionType, TxHash, User, UserId,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;

/// Single in-process reference implementation of every `core-store` trait:
/// one `HashMap` per entity, one struct implementing every repository
/// trait. This is the store every other crate's test suite runs against;
/// a `sqlx::PgPool`-backed store is the intended production swap-in.
#[derive(Default)]
pub struct InMemoryStore {
    users: RwLock<HashMap<UserId, User>>,
    users_by_external: RwLock<HashMap<i64, UserId>>,
    users_by_wallet: RwLock<HashMap<[u8; 20], UserId>>,

    deposits: RwLock<HashMap<DepositId, Deposit>>,
    deposits_by_tx: RwLock<HashMap<[u8; 32], DepositId>>,
    next_deposit_id: AtomicI64,
    level_versions: RwLock<HashMap<u8, DepositLevelVersion>>,

    plex: RwLock<HashMap<DepositId, PlexPaymentRequirement>>,

    referral_edges: RwLock<HashMap<(UserId, UserId), Referral>>,
    level1_parent: RwLock<HashMap<UserId, UserId>>,
    earnings: RwLock<HashMap<ReferralEarningId, ReferralEarning>>,
    earning_keys: RwLock<std::collections::HashSet<(UserId, UserId, u8, String)>>,
    next_earning_id: AtomicI64,

    transactions: RwLock<Vec<Transaction>>,

    settings: RwLock<Option<GlobalSettingsSnapshot>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Test/bootstrap helper: seed a deposit-level version (not part of the
    /// trait contract since corridors are operator-managed data, not
    /// produced by the engines themselves).
    pub async fn seed_level_version(&self, version: DepositLevelVersion) {
        self.level_versions.write().await.insert(version.level, version);
    }
}

#[async_trait]
impl UserRepository for InMemoryStore {
    async fn get(&self, id: UserId) -> Result<Option<User>, CoreError> {
        Ok(self.users.read().await.get(&id).cloned())
    }

    async fn get_by_external_id(&self, external_id: i64) -> Result<Option<User>, CoreError> {
        let Some(id) = self.users_by_external.read().await.get(&external_id).copied() else {
            return Ok(None);
        };
        self.get(id).await
    }

    async fn get_by_wallet(&self, wallet: &EvmAddress) -> Result<Option<User>, CoreError> {
        let Some(id) = self.users_by_wallet.read().await.get(wallet.as_bytes()).copied() else {
            return Ok(None);
        };
        self.get(id).await
    }

    async fn put(&self, user: User) -> Result<(), CoreError> {
        self.users_by_external.write().await.insert(user.external_id, user.id);
        self.users_by_wallet
            .write()
            .await
            .insert(*user.wallet_address.as_bytes(), user.id);
        self.users.write().await.insert(user.id, user);
        Ok(())
    }
}

#[async_trait]
impl DepositRepository for InMemoryStore {
    async fn next_id(&self) -> Result<DepositId, CoreError> {
        Ok(DepositId(self.next_deposit_id.fetch_add(1, Ordering::SeqCst) + 1))
    }

    async fn get(&self, id: DepositId) -> Result<Option<Deposit>, CoreError> {
        Ok(self.deposits.read().await.get(&id).cloned())
    }

    async fn get_by_tx_hash(&self, tx_hash: &TxHash) -> Result<Option<Deposit>, CoreError> {
        let Some(id) = self.deposits_by_tx.read().await.get(tx_hash.as_bytes()).copied() else {
            return Ok(None);
        };
        self.get(id).await
    }

    async fn put(&self, deposit: Deposit) -> Result<(), CoreError> {
        if let Some(tx) = deposit.tx_hash {
            self.deposits_by_tx.write().await.insert(*tx.as_bytes(), deposit.id);
        }
        self.deposits.write().await.insert(deposit.id, deposit);
        Ok(())
    }

    async fn list_by_user(&self, user_id: UserId) -> Result<Vec<Deposit>, CoreError> {
        Ok(self
            .deposits
            .read()
            .await
            .values()
            .filter(|d| d.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn list_active(&self, user_id: UserId) -> Result<Vec<Deposit>, CoreError> {
        Ok(self
            .deposits
            .read()
            .await
            .values()
            .filter(|d| d.user_id == user_id && d.status == DepositStatus::Confirmed && !d.is_roi_completed)
            .cloned()
            .collect())
    }

    async fn list_pending_accrual(&self, now: DateTime<Utc>) -> Result<Vec<Deposit>, CoreError> {
        Ok(self
            .deposits
            .read()
            .await
            .values()
            .filter(|d| {
                d.status == DepositStatus::Confirmed
                    && !d.is_roi_completed
                    && d.next_accrual_at.map(|t| t <= now).unwrap_or(false)
            })
            .cloned()
            .collect())
    }

    async fn list_pending_network_recovery(&self) -> Result<Vec<Deposit>, CoreError> {
        Ok(self
            .deposits
            .read()
            .await
            .values()
            .filter(|d| d.status == DepositStatus::PendingNetworkRecovery)
            .cloned()
            .collect())
    }

    async fn list_pending_without_tx_older_than(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<Deposit>, CoreError> {
        Ok(self
            .deposits
            .read()
            .await
            .values()
            .filter(|d| d.status == DepositStatus::Pending && d.tx_hash.is_none() && d.created_at < cutoff)
            .cloned()
            .collect())
    }

    async fn list_pending_with_tx(&self) -> Result<Vec<Deposit>, CoreError> {
        Ok(self
            .deposits
            .read()
            .await
            .values()
            .filter(|d| d.status == DepositStatus::Pending && d.tx_hash.is_some())
            .cloned()
            .collect())
    }

    async fn get_level_version(&self, level: u8) -> Result<Option<DepositLevelVersion>, CoreError> {
        Ok(self.level_versions.read().await.get(&level).cloned())
    }

    async fn get_total_deposited(&self, user_id: UserId) -> Result<Amount, CoreError> {
        Ok(self
            .deposits
            .read()
            .await
            .values()
            .filter(|d| d.user_id == user_id)
            .fold(Amount::ZERO, |acc, d| acc + d.amount))
    }
}

#[async_trait]
impl PlexRepository for InMemoryStore {
    async fn get(&self, deposit_id: DepositId) -> Result<Option<PlexPaymentRequirement>, CoreError> {
        Ok(self.plex.read().await.get(&deposit_id).cloned())
    }

    async fn put(&self, requirement: PlexPaymentRequirement) -> Result<(), CoreError> {
        self.plex.write().await.insert(requirement.deposit_id, requirement);
        Ok(())
    }

    async fn list_by_user(&self, user_id: UserId) -> Result<Vec<PlexPaymentRequirement>, CoreError> {
        Ok(self
            .plex
            .read()
            .await
            .values()
            .filter(|p| p.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn list_not_activated(&self) -> Result<Vec<PlexPaymentRequirement>, CoreError> {
        Ok(self
            .plex
            .read()
            .await
            .values()
            .filter(|p| !p.is_work_active && p.status != PlexPaymentStatus::Paid)
            .cloned()
            .collect())
    }

    async fn list_warning_due(&self, now: DateTime<Utc>) -> Result<Vec<PlexPaymentRequirement>, CoreError> {
        Ok(self
            .plex
            .read()
            .await
            .values()
            .filter(|p| {
                p.status == PlexPaymentStatus::Active && p.warning_sent_at.is_none() && p.warning_due <= now
            })
            .cloned()
            .collect())
    }

    async fn list_block_due(&self, now: DateTime<Utc>) -> Result<Vec<PlexPaymentRequirement>, CoreError> {
        Ok(self
            .plex
            .read()
            .await
            .values()
            .filter(|p| {
                matches!(p.status, PlexPaymentStatus::Active | PlexPaymentStatus::Warning) && p.block_due <= now
            })
            .cloned()
            .collect())
    }

    async fn list_active_for_verification(&self) -> Result<Vec<PlexPaymentRequirement>, CoreError> {
        Ok(self
            .plex
            .read()
            .await
            .values()
            .filter(|p| matches!(p.status, PlexPaymentStatus::Active | PlexPaymentStatus::Warning))
            .cloned()
            .collect())
    }
}

#[async_trait]
impl ReferralRepository for InMemoryStore {
    async fn get_edge(&self, referrer_id: UserId, referral_id: UserId) -> Result<Option<Referral>, CoreError> {
        Ok(self.referral_edges.read().await.get(&(referrer_id, referral_id)).cloned())
    }

    async fn put_edge(&self, edge: Referral) -> Result<(), CoreError> {
        if edge.level == 1 {
            self.level1_parent.write().await.insert(edge.referral_id, edge.referrer_id);
        }
        self.referral_edges
            .write()
            .await
            .insert((edge.referrer_id, edge.referral_id), edge);
        Ok(())
    }

    async fn level1_parent_of(&self, user_id: UserId) -> Result<Option<UserId>, CoreError> {
        Ok(self.level1_parent.read().await.get(&user_id).copied())
    }

    async fn add_earned(&self, referrer_id: UserId, referral_id: UserId, amount: Amount) -> Result<(), CoreError> {
        let mut edges = self.referral_edges.write().await;
        let key = (referrer_id, referral_id);
        let edge = edges
            .get_mut(&key)
            .ok_or_else(|| CoreError::Internal(format!("referral edge {referrer_id}->{referral_id} missing")))?;
        edge.total_earned = edge.total_earned + amount;
        Ok(())
    }

    async fn next_earning_id(&self) -> Result<ReferralEarningId, CoreError> {
        Ok(ReferralEarningId(self.next_earning_id.fetch_add(1, Ordering::SeqCst) + 1))
    }

    async fn put_earning_if_absent(&self, earning: ReferralEarning) -> Result<(), CoreError> {
        let key = (
            earning.referrer_id,
            earning.referral_id,
            earning.level,
            earning.source_event_id.clone(),
        );
        let mut keys = self.earning_keys.write().await;
        if !keys.insert(key) {
            return Err(CoreError::Conflict(format!(
                "earning already recorded for referrer={} referral={} level={} event={}",
                earning.referrer_id, earning.referral_id, earning.level, earning.source_event_id
            )));
        }
        self.earnings.write().await.insert(earning.id, earning);
        Ok(())
    }

    async fn get_earning(&self, id: ReferralEarningId) -> Result<Option<ReferralEarning>, CoreError> {
        Ok(self.earnings.read().await.get(&id).cloned())
    }

    async fn update_earning(&self, earning: ReferralEarning) -> Result<(), CoreError> {
        self.earnings.write().await.insert(earning.id, earning);
        Ok(())
    }

    async fn list_unpaid(&self, referrer_id: UserId) -> Result<Vec<ReferralEarning>, CoreError> {
        Ok(self
            .earnings
            .read()
            .await
            .values()
            .filter(|e| e.referrer_id == referrer_id && !e.paid)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl TransactionRepository for InMemoryStore {
    async fn put(&self, transaction: Transaction) -> Result<(), CoreError> {
        self.transactions.write().await.push(transaction);
        Ok(())
    }

    async fn list_by_user(&self, user_id: UserId) -> Result<Vec<Transaction>, CoreError> {
        Ok(self
            .transactions
            .read()
            .await
            .iter()
            .filter(|t| t.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn get_total_withdrawn(&self, user_id: UserId) -> Result<Amount, CoreError> {
        Ok(self
            .transactions
            .read()
            .await
            .iter()
            .filter(|t| t.user_id == user_id && t.transaction_type == TransactionType::Withdrawal)
            .fold(Amount::ZERO, |acc, t| acc + t.amount))
    }

    async fn get_platform_withdrawn_today(&self, now: DateTime<Utc>) -> Result<Amount, CoreError> {
        let midnight = now.date_naive().and_hms_opt(0, 0, 0).unwrap().and_utc();
        Ok(self
            .transactions
            .read()
            .await
            .iter()
            .filter(|t| {
                t.transaction_type == TransactionType::Withdrawal && t.created_at >= midnight && t.created_at <= now
            })
            .fold(Amount::ZERO, |acc, t| acc + t.amount))
    }
}

#[async_trait]
impl SettingsRepository for InMemoryStore {
    async fn get_settings(&self) -> Result<GlobalSettingsSnapshot, CoreError> {
        self.settings
            .read()
            .await
            .clone()
            .ok_or_else(|| CoreError::Internal("global settings not initialized".into()))
    }

    async fn put_settings(&self, settings: GlobalSettings) -> Result<(), CoreError> {
        *self.settings.write().await = Some(Arc::new(settings));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_types::ReferralSourceType;

    fn user(id: i64, wallet_byte: u8) -> User {
        User {
            id: UserId(id),
            external_id: id,
            username: None,
            wallet_address: EvmAddress::from_bytes([wallet_byte; 20]),
            fin_password_hash: String::new(),
            finpass_attempts: 0,
            finpass_locked_until: None,
            balance: Amount::ZERO,
            total_earned: Amount::ZERO,
            pending_earnings: Amount::ZERO,
            bonus_balance: Amount::ZERO,
            bonus_roi_earned: Amount::ZERO,
            is_banned: false,
            withdrawal_blocked: false,
            earnings_blocked: false,
            suspicious: false,
            referrer_id: None,
            referral_code: format!("code{id}"),
            total_deposited_usdt: Amount::ZERO,
            total_withdrawn: Amount::ZERO,
            deposit_tx_count: 0,
            deposits_consolidated: 0,
            last_plex_check_at: None,
        }
    }

    #[tokio::test]
    async fn user_lookup_by_external_id_and_wallet() {
        let store = InMemoryStore::new();
        store.put(user(1, 0xaa)).await.unwrap();

        assert!(UserRepository::get_by_external_id(&store, 1).await.unwrap().is_some());
        let addr = EvmAddress::from_bytes([0xaa; 20]);
        assert!(UserRepository::get_by_wallet(&store, &addr).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn earning_dedup_rejects_replay() {
        let store = InMemoryStore::new();
        let earning = ReferralEarning {
            id: ReferralEarningId(1),
            referrer_id: UserId(1),
            referral_id: UserId(2),
            level: 1,
            amount: Amount::try_from_str("1").unwrap(),
            source_type: ReferralSourceType::Deposit,
            source_user_id: UserId(2),
            source_event_id: "deposit:42".into(),
            paid: false,
            tx_hash: None,
            created_at: Utc::now(),
        };
        store.put_earning_if_absent(earning.clone()).await.unwrap();
        let err = store.put_earning_if_absent(earning).await.unwrap_err();
        assert!(matches!(err, CoreError::Conflict(_)));
    }
}
