//! Deposit Engine (C5, §4.5).

mod consolidation;
mod engine;
mod roi;

pub use consolidation::{consolidate_deposits, ConsolidationReport};
pub use engine::DepositEngine;
pub use roi::{accrue_roi, AccrualOutcome, AccrualSweepReport, FlatDailyRatePolicy, RoiAccrualPolicy, RoiAccrualSweep};
pub use core_types::DepositStatusExt;
