//! ROI accrual (§4.5.3), split into "decide how much" (the
//! [`RoiAccrualPolicy`] trait, §9 Open Question #1) vs. "apply it"
//! ([`accrue_roi`], a pure function testable in isolation), generalizing
//! the original's `accrual_processor.py` + `calculator.py` split.

use chrono::{DateTime, Duration, Utc};
use core_chain::ChainGateway;
use core_referral::ReferralEngine;
use core_store::{DepositRepository, PlexRepository, SettingsRepository};
use core_types::{Amount, CoreError, Deposit, DepositLevelVersion, ReferralSourceType};
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AccrualOutcome {
    /// `new_paid - roi_paid_amount` — the delta to forward to the referral
    /// engine as a `Roi`-type source event. Zero when the deposit was
    /// already at its cap.
    pub delta: Amount,
    pub completed: bool,
}

/// Applies one accrual to `deposit`'s ROI fields, clipping to
/// `roi_cap_amount` (the cap invariant: `0 <= roi_paid_amount <=
/// roi_cap_amount` holds before and after every call). Reschedules
/// `next_accrual_at` unless the cap was just reached.
pub fn accrue_roi(deposit: &mut Deposit, accrual: Amount, now: DateTime<Utc>, period: Duration) -> AccrualOutcome {
    let new_paid = (deposit.roi_paid_amount + accrual).min(deposit.roi_cap_amount);
    let delta = new_paid.saturating_sub(deposit.roi_paid_amount);
    deposit.roi_paid_amount = new_paid;

    let completed = new_paid == deposit.roi_cap_amount;
    if completed {
        deposit.is_roi_completed = true;
        deposit.completed_at = Some(now);
        deposit.next_accrual_at = None;
    } else {
        deposit.next_accrual_at = Some(now + period);
    }

    AccrualOutcome { delta, completed }
}

/// Decides how much a deposit accrues per sweep tick. The default
/// implementation reads a flat per-level daily rate off
/// `GlobalSettings.roi_settings`.
pub trait RoiAccrualPolicy: Send + Sync {
    fn accrual_for(&self, deposit: &Deposit, level_version: &DepositLevelVersion) -> Amount;
}

/// Flat daily rate per level, expressed as a percentage of `deposit.amount`
/// (e.g. `"1"` level -> `"0.8"` means 0.8%/day). Missing levels fall back
/// to `default_daily_percent`.
pub struct FlatDailyRatePolicy {
    pub rates_by_level: HashMap<u8, rust_decimal::Decimal>,
    pub default_daily_percent: rust_decimal::Decimal,
}

impl RoiAccrualPolicy for FlatDailyRatePolicy {
    fn accrual_for(&self, deposit: &Deposit, _level_version: &DepositLevelVersion) -> Amount {
        let rate = self.rates_by_level.get(&deposit.level).copied().unwrap_or(self.default_daily_percent);
        Amount::from_decimal(deposit.amount.as_decimal() * rate / rust_decimal::Decimal::from(100))
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct AccrualSweepReport {
    pub accrued: u32,
    pub completed: u32,
    pub skipped_gate: u32,
}

/// Runs `accrue_roi` over every due deposit. The pay-then-work gate is
/// checked first: a deposit whose PLEX requirement isn't active yet, or
/// whose on-chain PLEX balance is below the reserve minimum, or whose
/// requirement is `Blocked`, accrues nothing this tick.
pub struct RoiAccrualSweep {
    deposits: Arc<dyn DepositRepository>,
    plex: Arc<dyn PlexRepository>,
    settings: Arc<dyn SettingsRepository>,
    chain: Arc<ChainGateway>,
    referral: Arc<ReferralEngine>,
    policy: Arc<dyn RoiAccrualPolicy>,
}

impl RoiAccrualSweep {
    pub fn new(
        deposits: Arc<dyn DepositRepository>,
        plex: Arc<dyn PlexRepository>,
        settings: Arc<dyn SettingsRepository>,
        chain: Arc<ChainGateway>,
        referral: Arc<ReferralEngine>,
        policy: Arc<dyn RoiAccrualPolicy>,
    ) -> Self {
        Self { deposits, plex, settings, chain, referral, policy }
    }

    pub async fn run_accrual_sweep(&self, now: DateTime<Utc>) -> Result<AccrualSweepReport, CoreError> {
        let mut report = AccrualSweepReport::default();
        let settings = self.settings.get_settings().await?;
        let period = Duration::hours(settings.reward_accrual_period_hours());

        for mut deposit in self.deposits.list_pending_accrual(now).await? {
            if !self.gate_allows_accrual(&deposit, now).await? {
                report.skipped_gate += 1;
                continue;
            }

            let Some(level_version) = self.deposits.get_level_version(deposit.level).await? else {
                report.skipped_gate += 1;
                continue;
            };

            let accrual = self.policy.accrual_for(&deposit, &level_version);
            let tick_event_id = format!("roi-{}-{}", deposit.id, deposit.next_accrual_at.unwrap_or(now).timestamp());
            let outcome = accrue_roi(&mut deposit, accrual, now, period);
            self.deposits.put(deposit.clone()).await?;

            if !outcome.delta.is_zero() {
                if let Err(err) = self
                    .referral
                    .distribute_reward(deposit.user_id, outcome.delta, ReferralSourceType::Roi, &tick_event_id, now)
                    .await
                {
                    tracing::warn!(error = %err, deposit_id = %deposit.id, "referral reward distribution failed for ROI accrual");
                }
            }

            report.accrued += 1;
            if outcome.completed {
                report.completed += 1;
            }
        }

        Ok(report)
    }

    /// §4.6.5 pay-then-work gate: activation, no overdue PLEX debt, and a
    /// sufficient on-chain PLEX balance. "No overdue debt" uses the same
    /// definition `core-withdrawal`'s `plex_debt_from_requirements` uses —
    /// `now >= next_payment_due` — rather than `status == Blocked`, since
    /// `status` only flips to `Blocked` 25h after `next_payment_due`
    /// (`PLEX_BLOCK_OFFSET_HOURS`) and the two engines must agree on when a
    /// deposit is in debt.
    async fn gate_allows_accrual(&self, deposit: &Deposit, now: DateTime<Utc>) -> Result<bool, CoreError> {
        let Some(requirement) = self.plex.get(deposit.id).await? else {
            return Ok(false);
        };
        if !requirement.is_work_active {
            return Ok(false);
        }
        if now >= requirement.next_payment_due {
            return Ok(false);
        }

        let Some(wallet) = deposit.wallet_address else {
            return Ok(false);
        };
        let Some(balance) = self.chain.get_plex_balance(wallet).await else {
            return Ok(false);
        };
        Ok(balance >= core_plex::minimum_plex_balance())
    }
}
