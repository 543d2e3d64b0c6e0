//! Data model shared by every engine crate (§3).
//!
//! These are plain value types: no I/O, no transition enforcement beyond
//! what the field types make unrepresentable. State-machine guards for
//! `DepositStatus` and `PlexPaymentStatus` live in `core-deposit` and
//! `core-plex` respectively, next to the engines that own the transitions.

use crate::amount::Amount;
use crate::ids::{DepositId, EvmAddress, ReferralEarningId, TxHash, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

// ── User ─────────────────────────────────────────────────────────────────────

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub external_id: i64,
    pub username: Option<String>,
    pub wallet_address: EvmAddress,

    pub fin_password_hash: String,
    pub finpass_attempts: u32,
    pub finpass_locked_until: Option<DateTime<Utc>>,

    pub balance: Amount,
    pub total_earned: Amount,
    pub pending_earnings: Amount,
    pub bonus_balance: Amount,
    pub bonus_roi_earned: Amount,

    pub is_banned: bool,
    pub withdrawal_blocked: bool,
    pub earnings_blocked: bool,
    pub suspicious: bool,

    pub referrer_id: Option<UserId>,
    pub referral_code: String,

    pub total_deposited_usdt: Amount,
    pub total_withdrawn: Amount,
    pub deposit_tx_count: u32,
    pub deposits_consolidated: u32,
    pub last_plex_check_at: Option<DateTime<Utc>>,
}

impl User {
    /// Whether a finpass-recovery process is currently blocking withdrawals
    /// (§4.8 check 4). See DESIGN.md for why this is derived rather than a
    /// dedicated state machine.
    pub fn finpass_recovery_active(&self, now: DateTime<Utc>) -> bool {
        self.finpass_locked_until.map(|until| until > now).unwrap_or(false)
    }
}

// ── Deposit ──────────────────────────────────────────────────────────────────

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DepositType {
    Test,
    Level1,
    Level2,
    Level3,
    Level4,
    Level5,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DepositStatus {
    Pending,
    PendingNetworkRecovery,
    Confirmed,
    Failed,
    Consolidated,
    BlockedPlex,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Deposit {
    pub id: DepositId,
    pub user_id: UserId,
    pub level: u8,
    pub amount: Amount,
    pub deposit_type: DepositType,
    pub status: DepositStatus,

    pub tx_hash: Option<TxHash>,
    pub block_number: Option<u64>,
    pub wallet_address: Option<EvmAddress>,

    pub deposit_version_id: u32,
    pub roi_cap_amount: Amount,
    pub roi_paid_amount: Amount,
    pub is_roi_completed: bool,
    pub completed_at: Option<DateTime<Utc>>,
    pub next_accrual_at: Option<DateTime<Utc>>,

    pub is_consolidated: bool,
    pub consolidated_at: Option<DateTime<Utc>>,
    pub consolidated_tx_hashes: Vec<TxHash>,

    pub plex_daily_required: Amount,
    pub plex_cycle_start: Option<DateTime<Utc>>,

    pub created_at: DateTime<Utc>,
    pub confirmed_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

// ── PlexPaymentRequirement ───────────────────────────────────────────────────

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlexPaymentStatus {
    Active,
    Warning,
    Blocked,
    Paid,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PlexPaymentRequirement {
    pub deposit_id: DepositId,
    pub user_id: UserId,
    pub daily_plex_required: Amount,

    pub next_payment_due: DateTime<Utc>,
    pub warning_due: DateTime<Utc>,
    pub block_due: DateTime<Utc>,

    pub status: PlexPaymentStatus,

    pub last_payment_at: Option<DateTime<Utc>>,
    pub last_payment_tx_hash: Option<TxHash>,
    pub total_paid_plex: Amount,
    pub days_paid: u32,
    pub warning_sent_at: Option<DateTime<Utc>>,
    pub warning_count: u32,

    pub is_work_active: bool,
    pub first_payment_at: Option<DateTime<Utc>>,
}

// ── Referral ─────────────────────────────────────────────────────────────────

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Referral {
    pub referrer_id: UserId,
    pub referral_id: UserId,
    pub level: u8,
    pub total_earned: Amount,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReferralSourceType {
    Deposit,
    Roi,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ReferralEarning {
    pub id: ReferralEarningId,
    pub referrer_id: UserId,
    pub referral_id: UserId,
    pub level: u8,
    pub amount: Amount,
    pub source_type: ReferralSourceType,
    pub source_user_id: UserId,
    /// De-dup key for idempotent fan-out (§4.7.3).
    pub source_event_id: String,
    pub paid: bool,
    pub tx_hash: Option<TxHash>,
    pub created_at: DateTime<Utc>,
}

// ── Transaction ──────────────────────────────────────────────────────────────

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionType {
    Deposit,
    Withdrawal,
    Roi,
    Referral,
    Bonus,
    PlexPayment,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionStatus {
    Pending,
    Confirmed,
    Failed,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Transaction {
    pub user_id: UserId,
    pub transaction_type: TransactionType,
    pub amount: Amount,
    pub status: TransactionStatus,
    pub tx_hash: Option<TxHash>,
    pub created_at: DateTime<Utc>,
}

// ── GlobalSettings ───────────────────────────────────────────────────────────

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GlobalSettings {
    pub max_open_deposit_level: u8,
    pub min_withdrawal_amount: Amount,
    pub auto_withdrawal_enabled: bool,
    pub is_daily_limit_enabled: bool,
    pub daily_withdrawal_limit: Option<Amount>,
    pub emergency_stop_withdrawals: bool,
    pub emergency_stop_deposits: bool,
    pub active_rpc_provider: String,
    pub is_auto_switch_enabled: bool,
    pub project_start_at: DateTime<Utc>,
    pub blockchain_maintenance_mode: bool,
    /// Keyed map including `REWARD_ACCRUAL_PERIOD_HOURS` and per-level ROI bounds.
    pub roi_settings: HashMap<String, String>,
}

impl GlobalSettings {
    pub fn reward_accrual_period_hours(&self) -> i64 {
        self.roi_settings
            .get("REWARD_ACCRUAL_PERIOD_HOURS")
            .and_then(|v| v.parse().ok())
            .unwrap_or(crate::constants::DEFAULT_REWARD_ACCRUAL_PERIOD_HOURS)
    }
}

/// A reloadable snapshot of [`GlobalSettings`], per Design Note "Global
/// mutable settings": components read a consistent snapshot per operation
/// rather than fields of a shared mutable object. Produced by whichever
/// repository backs `GlobalSettings` and swapped in by the scheduler on a
/// timer.
pub type GlobalSettingsSnapshot = std::sync::Arc<GlobalSettings>;

// ── DepositLevelVersion ──────────────────────────────────────────────────────

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DepositLevelVersion {
    pub level: u8,
    pub amount: Amount,
    pub roi_cap_percent: Amount,
    pub is_active: bool,
    pub version_number: u32,
}

impl DepositLevelVersion {
    pub fn roi_cap_for(&self, deposit_amount: Amount) -> Amount {
        Amount::from_decimal(
            deposit_amount.as_decimal() * self.roi_cap_percent.as_decimal()
                / rust_decimal::Decimal::from(100),
        )
    }
}
