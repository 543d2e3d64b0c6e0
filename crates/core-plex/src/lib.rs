//! PLEX Payment Engine (C6, §4.6).

mod balance;
mod monitor;
mod requirement;

pub use balance::{available_plex, minimum_plex_balance};
pub use monitor::{PlexMonitor, PlexSweepReport};
pub use requirement::PlexPaymentRequirementExt;
