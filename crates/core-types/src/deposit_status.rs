//! `DepositStatus` transition guard: a match-based transition table where
//! any edge not explicitly listed is a programming error, not a
//! validation failure, since every caller is expected to only request
//! transitions the state machine actually offers. Lives in `core-types`
//! (rather than `core-deposit`) because `core-plex`'s monitoring sweep
//! also needs to drive the `Confirmed -> BlockedPlex` edge without
//! depending on `core-deposit`.

use crate::entities::DepositStatus;
use crate::error::CoreError;

pub trait DepositStatusExt {
    fn transition(&mut self, to: DepositStatus) -> Result<(), CoreError>;
}

impl DepositStatusExt for DepositStatus {
    fn transition(&mut self, to: DepositStatus) -> Result<(), CoreError> {
        use DepositStatus::*;

        let allowed = matches!(
            (*self, to),
            (Pending, Confirmed)
                | (Pending, Failed)
                | (Pending, PendingNetworkRecovery)
                | (PendingNetworkRecovery, Pending)
                | (PendingNetworkRecovery, Confirmed)
                | (Confirmed, BlockedPlex)
                | (Confirmed, Consolidated)
                | (BlockedPlex, Confirmed)
        );

        if !allowed {
            return Err(CoreError::Internal(format!("illegal deposit transition {self:?} -> {to:?}")));
        }
        *self = to;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pending_to_confirmed_is_allowed() {
        let mut status = DepositStatus::Pending;
        status.transition(DepositStatus::Confirmed).unwrap();
        assert_eq!(status, DepositStatus::Confirmed);
    }

    #[test]
    fn terminal_states_reject_every_transition() {
        let mut status = DepositStatus::Failed;
        assert!(status.transition(DepositStatus::Pending).is_err());

        let mut status = DepositStatus::Consolidated;
        assert!(status.transition(DepositStatus::Confirmed).is_err());
    }

    #[test]
    fn blocked_plex_only_returns_to_confirmed_via_admin_action() {
        let mut status = DepositStatus::Confirmed;
        status.transition(DepositStatus::BlockedPlex).unwrap();
        status.transition(DepositStatus::Confirmed).unwrap();
        assert_eq!(status, DepositStatus::Confirmed);
    }
}
