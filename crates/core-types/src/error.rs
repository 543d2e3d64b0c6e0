use crate::ids::TxHash;
use thiserror::Error;

/// Sub-codes for [`CoreError::Validation`]. These are the stable codes the
/// outer chat-bot layer switches on to pick localized text; this crate
/// never formats user-facing strings itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationKind {
    // ── Withdrawal Validator (§4.8) ──────────────────────────────────────────
    MinAmount,
    UserBanned,
    FinpassRecovery,
    FraudDetection,
    InsufficientBalance,
    PlexPaymentRequired,
    InsufficientPlexBalance,
    DailyLimit,

    // ── Deposit Engine (§4.5.1) ──────────────────────────────────────────────
    InvalidLevel,
    InvalidAmount,
    BelowMinimum,
    LevelUnavailable,
    AmountTooLow,

    // ── Referral Engine (§4.7.2, §4.7.3) ─────────────────────────────────────
    SelfReferral,
    ReferralCycle,
    AlreadyPaid,
}

impl ValidationKind {
    /// The stable wire code named in §4.8's table (and extended to the
    /// other engines' validation errors in the same style).
    pub fn code(&self) -> &'static str {
        match self {
            ValidationKind::MinAmount => "MIN_AMOUNT",
            ValidationKind::UserBanned => "USER_BANNED",
            ValidationKind::FinpassRecovery => "FINPASS_RECOVERY",
            ValidationKind::FraudDetection => "FRAUD_DETECTION",
            ValidationKind::InsufficientBalance => "INSUFFICIENT_BALANCE",
            ValidationKind::PlexPaymentRequired => "PLEX_PAYMENT_REQUIRED",
            ValidationKind::InsufficientPlexBalance => "INSUFFICIENT_PLEX_BALANCE",
            ValidationKind::DailyLimit => "DAILY_LIMIT",
            ValidationKind::InvalidLevel => "INVALID_LEVEL",
            ValidationKind::InvalidAmount => "INVALID_AMOUNT",
            ValidationKind::BelowMinimum => "BELOW_MINIMUM",
            ValidationKind::LevelUnavailable => "LEVEL_UNAVAILABLE",
            ValidationKind::AmountTooLow => "AMOUNT_TOO_LOW",
            ValidationKind::SelfReferral => "SELF_REFERRAL",
            ValidationKind::ReferralCycle => "REFERRAL_CYCLE",
            ValidationKind::AlreadyPaid => "ALREADY_PAID",
        }
    }
}

#[derive(Debug, Error)]
pub enum CoreError {
    // ── Validation ───────────────────────────────────────────────────────────
    #[error("validation failed: {0:?}")]
    Validation(ValidationKind),

    // ── Administrative ───────────────────────────────────────────────────────
    #[error("emergency stop is active")]
    EmergencyStop,

    // ── Chain / RPC ──────────────────────────────────────────────────────────
    #[error("all RPC providers failed: {0}")]
    RpcTransient(String),

    #[error("RPC provider did not respond within budget")]
    RpcTimeout,

    #[error("transaction {tx_hash} submitted but not yet included")]
    ChainPending { tx_hash: TxHash },

    #[error("transaction {tx_hash} reverted on-chain")]
    ChainReverted { tx_hash: TxHash },

    // ── Coordination ─────────────────────────────────────────────────────────
    #[error("could not acquire lock {key} within the blocking timeout")]
    LockUnavailable { key: String },

    #[error("conflict: {0}")]
    Conflict(String),

    // ── Programming errors ───────────────────────────────────────────────────
    #[error("internal error: {0}")]
    Internal(String),
}

impl CoreError {
    pub fn validation(kind: ValidationKind) -> Self {
        CoreError::Validation(kind)
    }
}
