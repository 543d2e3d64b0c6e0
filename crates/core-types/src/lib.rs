pub mod amount;
pub mod constants;
pub mod deposit_status;
pub mod entities;
pub mod error;
pub mod finpass;
pub mod ids;

pub use amount::{Amount, WeiAmount};
pub use deposit_status::DepositStatusExt;
pub use entities::*;
pub use error::{CoreError, ValidationKind};
pub use ids::{DepositId, EvmAddress, ReferralEarningId, TxHash, UserId};
