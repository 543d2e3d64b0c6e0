//! Startup configuration: parses everything up front in `main` via
//! `std::env::var` reads rather than `clap` flags, since most of it is
//! environment-driven secrets and addresses rather than CLI ergonomics.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use core_types::{constants, Amount, EvmAddress};
use std::collections::HashMap;

pub struct Config {
    pub rpc_http_url: String,
    pub rpc_ws_url: Option<String>,
    pub backup_rpc_http_url: Option<String>,
    pub chain_id: u64,
    pub usdt_contract_address: EvmAddress,
    pub plex_contract_address: EvmAddress,
    pub system_wallet_address: EvmAddress,
    pub payout_wallet_private_key: [u8; 32],
    pub confirmation_blocks: u64,
    pub poll_interval_s: u64,
    pub redis_url: Option<String>,
    pub database_url: Option<String>,

    // Seeds the reloadable `GlobalSettings` row on first boot; subsequent
    // changes are expected to go through whatever admin surface owns
    // `SettingsRepository`, not through redeploying this binary.
    pub emergency_stop_deposits: bool,
    pub emergency_stop_withdrawals: bool,
    pub blockchain_maintenance_mode: bool,
    pub min_withdrawal_amount: Amount,
    pub auto_withdrawal_enabled: bool,
    pub is_daily_limit_enabled: bool,
    pub daily_withdrawal_limit: Option<Amount>,
    pub project_start_at: DateTime<Utc>,
    pub reward_accrual_period_hours: i64,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            rpc_http_url: require_env("RPC_HTTP_URL")?,
            rpc_ws_url: optional_env("RPC_WS_URL"),
            backup_rpc_http_url: optional_env("BACKUP_RPC_HTTP_URL"),
            chain_id: env_parse_or("CHAIN_ID", 56)?,
            usdt_contract_address: env_address("USDT_CONTRACT_ADDRESS")?,
            plex_contract_address: env_address("PLEX_CONTRACT_ADDRESS")?,
            system_wallet_address: env_address("SYSTEM_WALLET_ADDRESS")?,
            payout_wallet_private_key: env_private_key("PAYOUT_WALLET_PRIVATE_KEY")?,
            confirmation_blocks: env_parse_or("CONFIRMATION_BLOCKS", constants::DEFAULT_CONFIRMATION_BLOCKS)?,
            poll_interval_s: env_parse_or("POLL_INTERVAL_S", constants::DEPOSIT_MONITOR_TICK_SECS)?,
            redis_url: optional_env("REDIS_URL"),
            database_url: optional_env("DATABASE_URL"),

            emergency_stop_deposits: env_parse_or("EMERGENCY_STOP_DEPOSITS", false)?,
            emergency_stop_withdrawals: env_parse_or("EMERGENCY_STOP_WITHDRAWALS", false)?,
            blockchain_maintenance_mode: env_parse_or("BLOCKCHAIN_MAINTENANCE_MODE", false)?,
            min_withdrawal_amount: env_amount_or("MIN_WITHDRAWAL_AMOUNT", "10")?,
            auto_withdrawal_enabled: env_parse_or("AUTO_WITHDRAWAL_ENABLED", true)?,
            is_daily_limit_enabled: env_parse_or("IS_DAILY_LIMIT_ENABLED", false)?,
            daily_withdrawal_limit: optional_env("DAILY_WITHDRAWAL_LIMIT")
                .map(|s| Amount::try_from_str(&s))
                .transpose()
                .context("parsing DAILY_WITHDRAWAL_LIMIT")?,
            project_start_at: optional_env("PROJECT_START_AT")
                .map(|s| DateTime::parse_from_rfc3339(&s).map(|dt| dt.with_timezone(&Utc)))
                .transpose()
                .context("parsing PROJECT_START_AT as RFC3339")?
                .unwrap_or_else(Utc::now),
            reward_accrual_period_hours: env_parse_or(
                "REWARD_ACCRUAL_PERIOD_HOURS",
                constants::DEFAULT_REWARD_ACCRUAL_PERIOD_HOURS,
            )?,
        })
    }

    /// The initial `GlobalSettings` row, seeded once at first boot.
    pub fn initial_global_settings(&self) -> core_types::GlobalSettings {
        let mut roi_settings = HashMap::new();
        roi_settings.insert("REWARD_ACCRUAL_PERIOD_HOURS".to_string(), self.reward_accrual_period_hours.to_string());
        core_types::GlobalSettings {
            max_open_deposit_level: 5,
            min_withdrawal_amount: self.min_withdrawal_amount,
            auto_withdrawal_enabled: self.auto_withdrawal_enabled,
            is_daily_limit_enabled: self.is_daily_limit_enabled,
            daily_withdrawal_limit: self.daily_withdrawal_limit,
            emergency_stop_withdrawals: self.emergency_stop_withdrawals,
            emergency_stop_deposits: self.emergency_stop_deposits,
            active_rpc_provider: "primary".to_string(),
            is_auto_switch_enabled: self.backup_rpc_http_url.is_some(),
            project_start_at: self.project_start_at,
            blockchain_maintenance_mode: self.blockchain_maintenance_mode,
            roi_settings,
        }
    }
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("missing required environment variable {key}"))
}

fn optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}

fn env_parse_or<T: std::str::FromStr>(key: &str, default: T) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    match optional_env(key) {
        Some(v) => v.parse::<T>().map_err(|e| anyhow::anyhow!("parsing {key}: {e}")),
        None => Ok(default),
    }
}

fn env_amount_or(key: &str, default: &str) -> Result<Amount> {
    let raw = optional_env(key).unwrap_or_else(|| default.to_string());
    Amount::try_from_str(&raw).with_context(|| format!("parsing {key} as a decimal amount"))
}

fn env_address(key: &str) -> Result<EvmAddress> {
    let raw = require_env(key)?;
    EvmAddress::from_hex(&raw).with_context(|| format!("parsing {key} as a 20-byte hex address"))
}

fn env_private_key(key: &str) -> Result<[u8; 32]> {
    let raw = require_env(key)?;
    let stripped = raw.strip_prefix("0x").unwrap_or(&raw);
    let bytes = hex::decode(stripped).with_context(|| format!("parsing {key} as hex"))?;
    bytes.try_into().map_err(|_| anyhow::anyhow!("{key} must decode to exactly 32 bytes"))
}
