//! `PlexPaymentRequirement` lifecycle: deadline anchoring and the
//! active/warning/blocked/paid transition logic.

use chrono::{DateTime, Duration, Utc};
use core_types::{Amount, PlexPaymentRequirement, PlexPaymentStatus, TxHash};

/// Hours after `t` that the three PLEX deadlines anchor to, where
/// `t = deposit.created_at` at creation (or `project_start_at` on
/// re-anchor).
const NEXT_DUE_HOURS: i64 = 24;
const WARNING_DUE_HOURS: i64 = 25;
const BLOCK_DUE_HOURS: i64 = 49;

pub trait PlexPaymentRequirementExt {
    fn new_for_deposit(
        deposit_id: core_types::DepositId,
        user_id: core_types::UserId,
        daily_plex_required: Amount,
        anchor: DateTime<Utc>,
    ) -> PlexPaymentRequirement;

    fn realign_to_project_start(&mut self, project_start_at: DateTime<Utc>, now: DateTime<Utc>);
    fn mark_paid(&mut self, tx_hash: TxHash, amount: Amount, now: DateTime<Utc>);
    fn mark_warning_sent(&mut self, now: DateTime<Utc>);
    fn mark_blocked(&mut self);
    fn reset_from_blocked(&mut self, now: DateTime<Utc>);
    fn is_warning_due(&self, now: DateTime<Utc>) -> bool;
    fn is_block_due(&self, now: DateTime<Utc>) -> bool;
}

impl PlexPaymentRequirementExt for PlexPaymentRequirement {
    fn new_for_deposit(
        deposit_id: core_types::DepositId,
        user_id: core_types::UserId,
        daily_plex_required: Amount,
        anchor: DateTime<Utc>,
    ) -> PlexPaymentRequirement {
        PlexPaymentRequirement {
            deposit_id,
            user_id,
            daily_plex_required,
            next_payment_due: anchor + Duration::hours(NEXT_DUE_HOURS),
            warning_due: anchor + Duration::hours(WARNING_DUE_HOURS),
            block_due: anchor + Duration::hours(BLOCK_DUE_HOURS),
            status: PlexPaymentStatus::Active,
            last_payment_at: None,
            last_payment_tx_hash: None,
            total_paid_plex: Amount::ZERO,
            days_paid: 0,
            warning_sent_at: None,
            warning_count: 0,
            is_work_active: false,
            first_payment_at: None,
        }
    }

    /// Re-anchors the three deadlines to `project_start_at` when the
    /// stored `next_payment_due` predates it, so a requirement created
    /// before the project's official launch doesn't immediately fall into
    /// `warning`/`blocked`. Resets historical warnings exactly once; a
    /// manually-`Blocked` requirement is never auto-unblocked by this,
    /// only its timers move.
    fn realign_to_project_start(&mut self, project_start_at: DateTime<Utc>, now: DateTime<Utc>) {
        if self.next_payment_due >= project_start_at {
            return;
        }
        self.next_payment_due = project_start_at + Duration::hours(NEXT_DUE_HOURS);
        self.warning_due = project_start_at + Duration::hours(WARNING_DUE_HOURS);
        self.block_due = project_start_at + Duration::hours(BLOCK_DUE_HOURS);
        self.warning_sent_at = None;
        self.warning_count = 0;

        if matches!(self.status, PlexPaymentStatus::Warning) {
            self.status = PlexPaymentStatus::Active;
        }
        let _ = now;
    }

    /// `active|warning -> paid`. Advances the cycle by 24h, accumulates
    /// payment totals, and on the very first payment flips on
    /// `is_work_active` (the pay-then-work gate the deposit engine's ROI
    /// sweep checks, §4.6.5).
    fn mark_paid(&mut self, tx_hash: TxHash, amount: Amount, now: DateTime<Utc>) {
        self.status = PlexPaymentStatus::Paid;
        self.last_payment_at = Some(now);
        self.last_payment_tx_hash = Some(tx_hash);
        self.total_paid_plex = self.total_paid_plex + amount;
        self.days_paid += 1;
        self.next_payment_due = now + Duration::hours(NEXT_DUE_HOURS);
        self.warning_due = now + Duration::hours(WARNING_DUE_HOURS);
        self.block_due = now + Duration::hours(BLOCK_DUE_HOURS);
        self.warning_sent_at = None;
        self.warning_count = 0;

        if !self.is_work_active {
            self.is_work_active = true;
            self.first_payment_at = Some(now);
        }
    }

    /// `active -> warning`, only once per cycle (guarded by the caller's
    /// `warning_sent_at IS NULL` query, §4.6.3 step 3).
    fn mark_warning_sent(&mut self, now: DateTime<Utc>) {
        self.status = PlexPaymentStatus::Warning;
        self.warning_sent_at = Some(now);
        self.warning_count += 1;
    }

    /// `active|warning -> blocked`.
    fn mark_blocked(&mut self) {
        self.status = PlexPaymentStatus::Blocked;
    }

    /// `blocked -> active`, an admin-only action (§4.5.4); never invoked
    /// by the monitoring sweep itself.
    fn reset_from_blocked(&mut self, now: DateTime<Utc>) {
        self.status = PlexPaymentStatus::Active;
        self.next_payment_due = now + Duration::hours(NEXT_DUE_HOURS);
        self.warning_due = now + Duration::hours(WARNING_DUE_HOURS);
        self.block_due = now + Duration::hours(BLOCK_DUE_HOURS);
        self.warning_sent_at = None;
        self.warning_count = 0;
    }

    fn is_warning_due(&self, now: DateTime<Utc>) -> bool {
        now >= self.warning_due && matches!(self.status, PlexPaymentStatus::Active) && self.warning_sent_at.is_none()
    }

    fn is_block_due(&self, now: DateTime<Utc>) -> bool {
        now >= self.block_due && matches!(self.status, PlexPaymentStatus::Active | PlexPaymentStatus::Warning)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_types::{DepositId, UserId};

    fn req(anchor: DateTime<Utc>) -> PlexPaymentRequirement {
        PlexPaymentRequirement::new_for_deposit(DepositId(1), UserId(1), Amount::try_from_str("100").unwrap(), anchor)
    }

    #[test]
    fn deadlines_anchor_at_24_25_49_hours() {
        let anchor = Utc::now();
        let r = req(anchor);
        assert_eq!(r.next_payment_due, anchor + Duration::hours(24));
        assert_eq!(r.warning_due, anchor + Duration::hours(25));
        assert_eq!(r.block_due, anchor + Duration::hours(49));
    }

    #[test]
    fn first_payment_activates_work() {
        let anchor = Utc::now();
        let mut r = req(anchor);
        assert!(!r.is_work_active);
        r.mark_paid(TxHash::from_bytes([1u8; 32]), Amount::try_from_str("100").unwrap(), anchor + Duration::hours(25));
        assert!(r.is_work_active);
        assert!(r.first_payment_at.is_some());
    }

    #[test]
    fn realign_resets_warning_state_once() {
        let old_anchor = Utc::now() - Duration::days(30);
        let mut r = req(old_anchor);
        r.mark_warning_sent(old_anchor + Duration::hours(26));

        let project_start = Utc::now();
        r.realign_to_project_start(project_start, Utc::now());

        assert_eq!(r.next_payment_due, project_start + Duration::hours(24));
        assert!(r.warning_sent_at.is_none());
        assert!(matches!(r.status, PlexPaymentStatus::Active));
    }

    #[test]
    fn realign_does_not_revive_a_blocked_requirement() {
        let old_anchor = Utc::now() - Duration::days(30);
        let mut r = req(old_anchor);
        r.mark_blocked();

        r.realign_to_project_start(Utc::now(), Utc::now());
        assert!(matches!(r.status, PlexPaymentStatus::Blocked));
    }
}
