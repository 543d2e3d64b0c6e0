//! Persistence interfaces: explicit fetch policies, no lazy loading.
//!
//! Every aggregate gets one repository trait with `get_*`/`put_*`/`iter_*`
//! methods — one trait per aggregate, since the concrete storage engine
//! is a separate concern from the domain logic above it. `InMemoryStore`
//! is the one reference implementation, used by every other crate's test
//! suite; a `sqlx::PgPool`-backed implementation is the intended
//! production backend.

mod memory;
mod traits;

pub use memory::InMemoryStore;
pub use traits::{
    DepositRepository, PlexRepository, ReferralRepository, SettingsRepository,
    TransactionRepository, UserRepository,
};
