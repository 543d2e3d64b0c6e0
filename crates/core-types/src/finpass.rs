//! Financial-password hashing and attempt-counter bookkeeping for [`User`].
//!
//! The hash itself is opaque to every other crate — withdrawal validation
//! only ever reads [`User::finpass_recovery_active`], never the password.
//! This module owns the one place a plaintext finpass is handled.

use crate::constants;
use crate::entities::User;
use crate::error::CoreError;
use chrono::{DateTime, Utc};

/// Hashes a plaintext finpass for storage in `User.fin_password_hash`.
pub fn hash_finpass(plaintext: &str) -> Result<String, CoreError> {
    bcrypt::hash(plaintext, constants::FINPASS_BCRYPT_COST)
        .map_err(|e| CoreError::Internal(format!("finpass hash failed: {e}")))
}

/// Checks a plaintext finpass against a stored hash. Never itself mutates
/// attempt counters — see [`record_attempt`] for that.
pub fn verify_finpass(plaintext: &str, hash: &str) -> Result<bool, CoreError> {
    bcrypt::verify(plaintext, hash).map_err(|e| CoreError::Internal(format!("finpass verify failed: {e}")))
}

/// Applies the outcome of a finpass check to `user`'s attempt counters.
/// A success resets the counter and clears any lockout; a failure
/// increments it and, on crossing [`constants::MAX_FINPASS_ATTEMPTS`], sets
/// `finpass_locked_until` to `now + FINPASS_LOCKOUT_MINUTES`.
pub fn record_attempt(user: &mut User, success: bool, now: DateTime<Utc>) {
    if success {
        user.finpass_attempts = 0;
        user.finpass_locked_until = None;
        return;
    }

    user.finpass_attempts += 1;
    if user.finpass_attempts >= constants::MAX_FINPASS_ATTEMPTS {
        user.finpass_locked_until = Some(now + chrono::Duration::minutes(constants::FINPASS_LOCKOUT_MINUTES));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Amount, EvmAddress, UserId};

    fn user() -> User {
        User {
            id: UserId(1),
            external_id: 1,
            username: None,
            wallet_address: EvmAddress::from_bytes([1u8; 20]),
            fin_password_hash: hash_finpass("correct-horse").unwrap(),
            finpass_attempts: 0,
            finpass_locked_until: None,
            balance: Amount::ZERO,
            total_earned: Amount::ZERO,
            pending_earnings: Amount::ZERO,
            bonus_balance: Amount::ZERO,
            bonus_roi_earned: Amount::ZERO,
            is_banned: false,
            withdrawal_blocked: false,
            earnings_blocked: false,
            suspicious: false,
            referrer_id: None,
            referral_code: "ABC123".to_string(),
            total_deposited_usdt: Amount::ZERO,
            total_withdrawn: Amount::ZERO,
            deposit_tx_count: 0,
            deposits_consolidated: 0,
            last_plex_check_at: None,
        }
    }

    #[test]
    fn hash_round_trips_through_verify() {
        let hash = hash_finpass("correct-horse").unwrap();
        assert!(verify_finpass("correct-horse", &hash).unwrap());
        assert!(!verify_finpass("wrong-password", &hash).unwrap());
    }

    #[test]
    fn failed_attempts_accumulate_until_lockout() {
        let mut u = user();
        let now = Utc::now();
        for _ in 0..constants::MAX_FINPASS_ATTEMPTS - 1 {
            record_attempt(&mut u, false, now);
            assert!(u.finpass_locked_until.is_none());
        }
        record_attempt(&mut u, false, now);
        assert!(u.finpass_locked_until.is_some());
        assert!(u.finpass_recovery_active(now));
    }

    #[test]
    fn success_resets_counter_and_clears_lockout() {
        let mut u = user();
        let now = Utc::now();
        for _ in 0..constants::MAX_FINPASS_ATTEMPTS {
            record_attempt(&mut u, false, now);
        }
        assert!(u.finpass_locked_until.is_some());

        record_attempt(&mut u, true, now);
        assert_eq!(u.finpass_attempts, 0);
        assert!(u.finpass_locked_until.is_none());
    }
}
