//! Withdrawal validator: nine ordered gates, each mapping to a
//! [`core_types::ValidationKind`] sub-code rather than a human-facing
//! message — rendering that code into text is an outer-layer concern.
//!
//! The validator performs no I/O itself. Callers assemble
//! [`WithdrawalContext`] from whatever repository/chain calls they need
//! first, then call [`validate`] against a consistent snapshot.

use chrono::{DateTime, Utc};
use core_types::{
    constants, Amount, CoreError, GlobalSettings, PlexPaymentRequirement, PlexPaymentStatus, User, ValidationKind,
};

/// Whether a user owes any unpaid daily PLEX across their active deposits,
/// and if so how much. Assembled by the caller from
/// [`PlexPaymentRequirement`] rows — see [`plex_debt_from_requirements`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PlexDebtStatus {
    Clear,
    Owing { required: Amount },
}

/// Derives [`PlexDebtStatus`] from a user's requirement rows: a requirement
/// with no activated work (never yet paid) carries no obligation; one that
/// has gone active but has passed `next_payment_due` without a fresh
/// payment this cycle is in debt. A `Blocked` requirement is always in debt
/// (its deadline is definitionally past).
pub fn plex_debt_from_requirements(requirements: &[PlexPaymentRequirement], now: DateTime<Utc>) -> PlexDebtStatus {
    let mut required = Amount::ZERO;
    let mut owing = false;

    for requirement in requirements {
        if !requirement.is_work_active {
            continue;
        }
        let overdue = matches!(requirement.status, PlexPaymentStatus::Blocked) || now >= requirement.next_payment_due;
        if overdue {
            owing = true;
            required = required + requirement.daily_plex_required;
        }
    }

    if owing {
        PlexDebtStatus::Owing { required }
    } else {
        PlexDebtStatus::Clear
    }
}

/// Everything the nine checks read. The caller is responsible for reading
/// `user`, `global_settings`, `plex_debt`, `plex_wallet_balance` (`None`
/// when the chain call failed — see check 8's fail-open note) and
/// `today_total` before calling [`validate`].
pub struct WithdrawalContext {
    pub user: User,
    pub amount: Amount,
    pub available_balance: Amount,
    pub global_settings: GlobalSettings,
    pub plex_debt: PlexDebtStatus,
    /// `None` when the on-chain balance lookup failed — fail-open, a failed
    /// lookup never blocks a withdrawal on its own.
    pub plex_wallet_balance: Option<Amount>,
    pub today_total: Amount,
}

/// Runs the nine checks in order, short-circuiting on the first failure.
pub fn validate(ctx: &WithdrawalContext) -> Result<(), CoreError> {
    // 1. Emergency stop.
    if ctx.global_settings.emergency_stop_withdrawals {
        return Err(CoreError::EmergencyStop);
    }

    // 2. Minimum amount.
    if ctx.amount < ctx.global_settings.min_withdrawal_amount {
        return Err(CoreError::validation(ValidationKind::MinAmount));
    }

    // 3. User banned / withdrawal blocked.
    if ctx.user.is_banned || ctx.user.withdrawal_blocked {
        return Err(CoreError::validation(ValidationKind::UserBanned));
    }

    // 4. Finpass recovery: a lockout window derived from user state.
    if ctx.user.finpass_recovery_active(Utc::now()) {
        return Err(CoreError::validation(ValidationKind::FinpassRecovery));
    }

    // 5. Fraud detection. `suspicious` is the one fraud-adjacent flag on
    // the user record; a richer scoring model is an outer-layer concern.
    if ctx.user.suspicious {
        return Err(CoreError::validation(ValidationKind::FraudDetection));
    }

    // 6. Balance.
    if ctx.available_balance < ctx.amount {
        return Err(CoreError::validation(ValidationKind::InsufficientBalance));
    }

    // 7. PLEX daily payment debt.
    if matches!(ctx.plex_debt, PlexDebtStatus::Owing { .. }) {
        return Err(CoreError::validation(ValidationKind::PlexPaymentRequired));
    }

    // 8. PLEX wallet minimum balance. Fail-open: a missing balance (chain
    // lookup failed) never blocks withdrawal.
    if let Some(balance) = ctx.plex_wallet_balance {
        if balance < core_plex_minimum_plex_balance() {
            return Err(CoreError::validation(ValidationKind::InsufficientPlexBalance));
        }
    }

    // 9. Daily platform limit, gated by `is_daily_limit_enabled` so it can be
    // switched off entirely rather than hardcoding a bypass.
    if ctx.global_settings.is_daily_limit_enabled {
        if let Some(limit) = ctx.global_settings.daily_withdrawal_limit {
            if ctx.today_total + ctx.amount > limit {
                return Err(CoreError::validation(ValidationKind::DailyLimit));
            }
        }
    }

    Ok(())
}

/// `core-withdrawal` has no dependency on `core-plex`; duplicating the
/// constant here (rather than pulling in the whole crate for one value)
/// keeps the validator's "no I/O, no cross-engine coupling" property.
fn core_plex_minimum_plex_balance() -> Amount {
    Amount::try_from_str(constants::MINIMUM_PLEX_BALANCE).expect("valid constant")
}
