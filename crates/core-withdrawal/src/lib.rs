//! Withdrawal Validator (C8, §4.8).

mod auto_approval;
mod validator;

pub use auto_approval::{auto_approval_eligible, AutoApprovalContext, AutoApprovalDecision};
pub use validator::{plex_debt_from_requirements, validate, PlexDebtStatus, WithdrawalContext};
