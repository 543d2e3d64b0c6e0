use async_trait::async_trait;
use chrono::{DateTime, Utc};
use core_types::{
    CoreError, Deposit, DepositId, DepositLevelVersion, EvmAddress, GlobalSettings,
    GlobalSettingsSnapshot, PlexPaymentRequirement, Referral, ReferralEarning, ReferralEarningId,
    Transaction, TxHash, User, UserId,
};

/// §3 `User`. Fetch policies are explicit per call site (Design Note
/// "ORM selectinload / cascade semantics") — no lazy-loaded relations.
#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn get(&self, id: UserId) -> Result<Option<User>, CoreError>;
    async fn get_by_external_id(&self, external_id: i64) -> Result<Option<User>, CoreError>;
    async fn get_by_wallet(&self, wallet: &EvmAddress) -> Result<Option<User>, CoreError>;
    async fn put(&self, user: User) -> Result<(), CoreError>;
}

/// §3 `Deposit` + `DepositLevelVersion`.
#[async_trait]
pub trait DepositRepository: Send + Sync {
    async fn next_id(&self) -> Result<DepositId, CoreError>;
    async fn get(&self, id: DepositId) -> Result<Option<Deposit>, CoreError>;
    async fn get_by_tx_hash(&self, tx_hash: &TxHash) -> Result<Option<Deposit>, CoreError>;
    async fn put(&self, deposit: Deposit) -> Result<(), CoreError>;
    async fn list_by_user(&self, user_id: UserId) -> Result<Vec<Deposit>, CoreError>;

    /// `status = confirmed ∧ ¬is_roi_completed`, used by consolidation and ROI reporting.
    async fn list_active(&self, user_id: UserId) -> Result<Vec<Deposit>, CoreError>;

    /// `status = confirmed ∧ ¬is_roi_completed ∧ next_accrual_at ≤ now` (§4.5.3 sweep).
    async fn list_pending_accrual(&self, now: DateTime<Utc>) -> Result<Vec<Deposit>, CoreError>;

    /// `status = pending_network_recovery` (§4.9 step 2).
    async fn list_pending_network_recovery(&self) -> Result<Vec<Deposit>, CoreError>;

    /// `status = pending ∧ tx_hash IS NULL ∧ created_at < cutoff` (§4.9 step 3).
    async fn list_pending_without_tx_older_than(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<Deposit>, CoreError>;

    /// `status = pending ∧ tx_hash IS NOT NULL` (§4.9 step 4).
    async fn list_pending_with_tx(&self) -> Result<Vec<Deposit>, CoreError>;

    async fn get_level_version(&self, level: u8) -> Result<Option<DepositLevelVersion>, CoreError>;

    /// Sum of `amount` across all of a user's deposits regardless of status,
    /// used by the withdrawal validator's x5-rule (§4.8 auto-approval).
    async fn get_total_deposited(&self, user_id: UserId) -> Result<core_types::Amount, CoreError>;
}

/// §3 `PlexPaymentRequirement`, 1:1 with `Deposit`.
#[async_trait]
pub trait PlexRepository: Send + Sync {
    async fn get(&self, deposit_id: DepositId) -> Result<Option<PlexPaymentRequirement>, CoreError>;
    async fn put(&self, requirement: PlexPaymentRequirement) -> Result<(), CoreError>;
    async fn list_by_user(&self, user_id: UserId) -> Result<Vec<PlexPaymentRequirement>, CoreError>;

    /// Every requirement not yet `is_work_active` (§4.6.3 step 2).
    async fn list_not_activated(&self) -> Result<Vec<PlexPaymentRequirement>, CoreError>;

    /// `warning_due ≤ now ∧ status = active ∧ warning_sent_at IS NULL` (§4.6.3 step 3).
    async fn list_warning_due(&self, now: DateTime<Utc>) -> Result<Vec<PlexPaymentRequirement>, CoreError>;

    /// `block_due ≤ now ∧ status ∈ {active, warning}` (§4.6.3 step 4).
    async fn list_block_due(&self, now: DateTime<Utc>) -> Result<Vec<PlexPaymentRequirement>, CoreError>;

    /// `status ∈ {active, warning}`, used by the verification loop (§4.6.3 step 5).
    async fn list_active_for_verification(&self) -> Result<Vec<PlexPaymentRequirement>, CoreError>;
}

/// §3 `Referral` edges + `ReferralEarning` rows.
#[async_trait]
pub trait ReferralRepository: Send + Sync {
    async fn get_edge(&self, referrer_id: UserId, referral_id: UserId) -> Result<Option<Referral>, CoreError>;
    async fn put_edge(&self, edge: Referral) -> Result<(), CoreError>;

    /// The unique level-1 ancestor of `user_id`, if any (forest invariant, §8 property 6).
    async fn level1_parent_of(&self, user_id: UserId) -> Result<Option<UserId>, CoreError>;

    async fn add_earned(&self, referrer_id: UserId, referral_id: UserId, amount: core_types::Amount) -> Result<(), CoreError>;

    async fn next_earning_id(&self) -> Result<ReferralEarningId, CoreError>;

    /// Inserts an earning keyed by `(referrer_id, referral_id, level, source_event_id)`.
    /// Returns `CoreError::Conflict` (not a validation failure) if that key already
    /// exists — the caller treats this as the idempotency signal named in §7.
    async fn put_earning_if_absent(&self, earning: ReferralEarning) -> Result<(), CoreError>;

    async fn get_earning(&self, id: ReferralEarningId) -> Result<Option<ReferralEarning>, CoreError>;
    async fn update_earning(&self, earning: ReferralEarning) -> Result<(), CoreError>;
    async fn list_unpaid(&self, referrer_id: UserId) -> Result<Vec<ReferralEarning>, CoreError>;
}

/// §3 `Transaction` ledger rows.
#[async_trait]
pub trait TransactionRepository: Send + Sync {
    async fn put(&self, transaction: Transaction) -> Result<(), CoreError>;
    async fn list_by_user(&self, user_id: UserId) -> Result<Vec<Transaction>, CoreError>;

    async fn get_total_withdrawn(&self, user_id: UserId) -> Result<core_types::Amount, CoreError>;

    /// Sum of all `Withdrawal` transactions across every user created since
    /// midnight UTC of `now`'s day — feeds §4.8 check 9 (platform-wide daily limit).
    async fn get_platform_withdrawn_today(&self, now: DateTime<Utc>) -> Result<core_types::Amount, CoreError>;
}

/// §3 `GlobalSettings`, reloaded as a [`GlobalSettingsSnapshot`] per Design
/// Note "Global mutable settings": callers read a consistent snapshot per
/// operation rather than fields of a shared mutable object.
#[async_trait]
pub trait SettingsRepository: Send + Sync {
    async fn get_settings(&self) -> Result<GlobalSettingsSnapshot, CoreError>;
    async fn put_settings(&self, settings: GlobalSettings) -> Result<(), CoreError>;
}
