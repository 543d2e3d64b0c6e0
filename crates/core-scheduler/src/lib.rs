//! Scheduler / Workers (C9, §4.9).

mod deposit_monitor;
mod scheduler;

pub use deposit_monitor::{DepositMonitor, DepositMonitorReport};
pub use scheduler::Scheduler;
