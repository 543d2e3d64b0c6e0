//! Auto-approval eligibility query: a separate query from [`crate::validate`]
//! — a withdrawal that fails this check is never rejected, only routed to
//! manual review.

use core_types::{constants, Amount, GlobalSettings};
use rust_decimal::Decimal;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AutoApprovalDecision {
    AutoApprove,
    ManualReview,
}

/// Everything [`auto_approval_eligible`] reads: the caller already ran
/// [`crate::validate`] and is now deciding whether a *valid* withdrawal can
/// skip manual review.
pub struct AutoApprovalContext {
    pub amount: Amount,
    pub global_settings: GlobalSettings,
    pub total_deposited: Amount,
    pub total_withdrawn: Amount,
    pub today_total: Amount,
}

/// Decides auto-approval per the x5 lifetime rule plus the optional daily
/// limit. Never returns an error — an ineligible withdrawal just falls back
/// to manual review.
pub fn auto_approval_eligible(ctx: &AutoApprovalContext) -> AutoApprovalDecision {
    if !ctx.global_settings.auto_withdrawal_enabled {
        return AutoApprovalDecision::ManualReview;
    }

    if ctx.total_deposited.is_zero() {
        return AutoApprovalDecision::ManualReview;
    }

    let max_payout = Amount::from_decimal(
        ctx.total_deposited.as_decimal() * Decimal::from(constants::AUTO_WITHDRAWAL_LIFETIME_MULTIPLE),
    );
    if ctx.total_withdrawn + ctx.amount > max_payout {
        return AutoApprovalDecision::ManualReview;
    }

    if ctx.global_settings.is_daily_limit_enabled {
        if let Some(limit) = ctx.global_settings.daily_withdrawal_limit {
            if ctx.today_total + ctx.amount > limit {
                return AutoApprovalDecision::ManualReview;
            }
        }
    }

    AutoApprovalDecision::AutoApprove
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
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

    fn ctx() -> AutoApprovalContext {
        AutoApprovalContext {
            amount: Amount::try_from_str("100").unwrap(),
            global_settings: settings(),
            total_deposited: Amount::try_from_str("1000").unwrap(),
            total_withdrawn: Amount::try_from_str("200").unwrap(),
            today_total: Amount::ZERO,
        }
    }

    #[test]
    fn within_x5_limit_auto_approves() {
        assert_eq!(auto_approval_eligible(&ctx()), AutoApprovalDecision::AutoApprove);
    }

    #[test]
    fn disabled_globally_falls_back_to_manual_review() {
        let mut c = ctx();
        c.global_settings.auto_withdrawal_enabled = false;
        assert_eq!(auto_approval_eligible(&c), AutoApprovalDecision::ManualReview);
    }

    #[test]
    fn no_deposits_falls_back_to_manual_review() {
        let mut c = ctx();
        c.total_deposited = Amount::ZERO;
        assert_eq!(auto_approval_eligible(&c), AutoApprovalDecision::ManualReview);
    }

    #[test]
    fn exceeding_x5_lifetime_cap_falls_back_to_manual_review() {
        let mut c = ctx();
        c.total_withdrawn = Amount::try_from_str("4950").unwrap();
        assert_eq!(auto_approval_eligible(&c), AutoApprovalDecision::ManualReview);
    }

    #[test]
    fn exact_x5_boundary_auto_approves() {
        let mut c = ctx();
        c.total_deposited = Amount::try_from_str("1000").unwrap();
        c.total_withdrawn = Amount::try_from_str("4900").unwrap();
        c.amount = Amount::try_from_str("100").unwrap();
        assert_eq!(auto_approval_eligible(&c), AutoApprovalDecision::AutoApprove);
    }

    #[test]
    fn daily_limit_enforced_only_when_enabled() {
        let mut c = ctx();
        c.global_settings.is_daily_limit_enabled = true;
        c.global_settings.daily_withdrawal_limit = Some(Amount::try_from_str("50").unwrap());
        c.today_total = Amount::try_from_str("10").unwrap();
        assert_eq!(auto_approval_eligible(&c), AutoApprovalDecision::ManualReview);

        c.global_settings.is_daily_limit_enabled = false;
        assert_eq!(auto_approval_eligible(&c), AutoApprovalDecision::AutoApprove);
    }
}
