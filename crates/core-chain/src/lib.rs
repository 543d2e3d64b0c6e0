//! Chain Gateway: the only crate in the workspace that talks to an EVM
//! node. Everything above this crate deals
//! in [`core_types::Amount`] and [`core_types::EvmAddress`]; everything in
//! this crate additionally knows about wei, gas, blocks and confirmations.

mod balances;
mod erc20;
mod gateway;
mod pool;
mod rate_limiter;
mod scanner;
mod signer;
mod payment_sender;

pub use gateway::ChainGateway;
pub use payment_sender::PaymentResult;
pub use pool::{ProviderHealth, ProviderPool};
pub use rate_limiter::{RateLimitPermit, RateLimiter, RateLimiterStats};
pub use scanner::DepositMatch;
pub use signer::PayoutSigner;
