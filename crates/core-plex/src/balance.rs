//! Wallet minimum: a non-spendable PLEX reserve below which a user's
//! on-chain balance no longer counts toward available payment capacity.

use core_types::{constants, Amount};

pub fn minimum_plex_balance() -> Amount {
    Amount::try_from_str(constants::MINIMUM_PLEX_BALANCE).expect("valid constant")
}

/// The PLEX balance actually available for spending, after reserving the
/// non-spendable minimum.
pub fn available_plex(total: Amount) -> Amount {
    total.saturating_sub(minimum_plex_balance())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn available_plex_floors_at_zero() {
        let total = Amount::try_from_str("1000").unwrap();
        assert_eq!(available_plex(total), Amount::ZERO);
    }

    #[test]
    fn available_plex_above_minimum() {
        let total = Amount::try_from_str("6000").unwrap();
        assert_eq!(available_plex(total), Amount::try_from_str("1000").unwrap());
    }
}
