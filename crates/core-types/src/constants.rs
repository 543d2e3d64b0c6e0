//! ─── Financial core constants ───────────────────────────────────────────────
//!
//! Most of these are also exposed as env-overridable config keys in
//! `engine-node`; the values here are the fallbacks used when an operator
//! hasn't set an override.

// ── Token decimals (§6) ───────────────────────────────────────────────────────

pub const USDT_DECIMALS: u8 = 18;
pub const PLEX_DECIMALS: u8 = 9;
pub const NATIVE_DECIMALS: u8 = 18;

// ── Deposit Engine (§4.5.1, §9) ───────────────────────────────────────────────

/// Dust-protection floor below which `create_deposit` rejects with `BelowMinimum`.
pub const MIN_DEPOSIT: &str = "10";

/// Default `REWARD_ACCRUAL_PERIOD_HOURS` read from `GlobalSettings.roi_settings`.
pub const DEFAULT_REWARD_ACCRUAL_PERIOD_HOURS: i64 = 6;

// ── PLEX Payment Engine (§4.6) ────────────────────────────────────────────────

/// PLEX required per dollar of deposit principal (`daily_plex_required = amount × PLEX_PER_DOLLAR`).
pub const PLEX_PER_DOLLAR: u64 = 10;

/// Grace window after `next_payment_due` before a `warning` transition.
pub const PLEX_WARNING_OFFSET_HOURS: i64 = 1;

/// Total window after `next_payment_due` before a `blocked` transition.
pub const PLEX_BLOCK_OFFSET_HOURS: i64 = 25;

/// Non-spendable PLEX wallet reserve enforced by the withdrawal validator
/// and by deposit access (§4.6.4).
pub const MINIMUM_PLEX_BALANCE: &str = "5000";

// ── Referral Engine (§4.7) ────────────────────────────────────────────────────

/// Fixed chain-walk depth; ancestors beyond level 3 never earn.
pub const REFERRAL_DEPTH: u8 = 3;

/// Flat reward rate applied at every level unless overridden by settings.
pub const DEFAULT_REFERRAL_RATE: &str = "0.05";

/// ROI-earning notifications below this amount are suppressed (§4.7.3).
pub const REFERRAL_NOTIFY_FLOOR: &str = "0.01";

// ── Withdrawal Validator (§4.8) ───────────────────────────────────────────────

/// x5 lifetime payout cap used by the auto-approval eligibility query.
pub const AUTO_WITHDRAWAL_LIFETIME_MULTIPLE: u32 = 5;

// ── Finpass (§3 User) ─────────────────────────────────────────────────────────

/// Failed finpass attempts before the account enters recovery lockout.
pub const MAX_FINPASS_ATTEMPTS: u32 = 5;

/// Lockout duration once `MAX_FINPASS_ATTEMPTS` is reached.
pub const FINPASS_LOCKOUT_MINUTES: i64 = 30;

/// bcrypt work factor for `fin_password_hash`.
pub const FINPASS_BCRYPT_COST: u32 = 12;

// ── Chain Gateway (§4.4, §5) ──────────────────────────────────────────────────

pub const DEFAULT_USDT_TRANSFER_GAS: u64 = 100_000;
pub const DEFAULT_NATIVE_TRANSFER_GAS: u64 = 21_000;
pub const GAS_ESTIMATE_SAFETY_FACTOR: &str = "1.2";

pub const DEFAULT_CONFIRMATION_BLOCKS: u64 = 12;
pub const MAX_SCAN_WINDOW_BLOCKS: u64 = 100_000;

pub const DEFAULT_MAX_RETRIES: u32 = 5;
pub const RETRY_BACKOFF_BASE_SECS: u64 = 2;

/// Gas price clamp bounds (§4.4.1 step 4), BSC-specific.
pub const MIN_GAS_PRICE_GWEI: u64 = 3;
pub const MAX_GAS_PRICE_GWEI: u64 = 10;

// ── Timeouts (§5, all configurable; defaults indicative) ─────────────────────

pub const RPC_CALL_TIMEOUT_SECS: u64 = 30;
pub const RPC_LOGS_TIMEOUT_SECS: u64 = 60;
pub const RECEIPT_WAIT_TIMEOUT_SECS: u64 = 120;
pub const PREVIOUS_TX_WAIT_TIMEOUT_SECS: u64 = 60;
pub const NOTIFICATION_DELIVERY_TIMEOUT_SECS: u64 = 10;
pub const LOCK_LEASE_SECS: u64 = 300;

// ── RPC Provider Pool (§4.1) ──────────────────────────────────────────────────

pub const SETTINGS_REFRESH_INTERVAL_SECS: u64 = 30;

// ── Scheduler (§4.9) ──────────────────────────────────────────────────────────

pub const DEPOSIT_MONITOR_TICK_SECS: u64 = 60;
pub const PLEX_MONITOR_TICK_SECS: u64 = 60;
pub const DEPOSIT_PENDING_TIMEOUT_HOURS: i64 = 24;
