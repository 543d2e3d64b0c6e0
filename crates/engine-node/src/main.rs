//! engine-node — the financial core host binary.
//!
//! Startup sequence:
//!   1. Parse configuration from the environment
//!   2. Build the chain gateway (provider pool, rate limiter, payout signer)
//!   3. Open the store and lock backends, seed global settings on first boot
//!   4. Wire the deposit, PLEX and referral engines on top of them
//!   5. Spawn the scheduler's two periodic loops
//!   6. Wait for Ctrl-C, then cancel and join both loops

mod config;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use ethers::providers::{Http, Provider};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use config::Config;
use core_chain::{ChainGateway, PayoutSigner, ProviderPool, RateLimiter};
use core_lock::{DistributedLock, InMemoryLockBackend, RedisLockBackend};
use core_notify::ChannelNotificationSink;
use core_referral::ReferralEngine;
use core_scheduler::{DepositMonitor, Scheduler};
use core_store::{InMemoryStore, SettingsRepository};

const RATE_LIMIT_MAX_CONCURRENCY: usize = 8;
const RATE_LIMIT_RPS: u32 = 20;
const NOTIFICATION_CHANNEL_CAPACITY: usize = 1024;

#[derive(Parser, Debug)]
#[command(
    name = "engine-node",
    version,
    about = "Financial core — deposit/ROI/referral/withdrawal engine for an EVM investment platform"
)]
struct Args {
    /// Override the poll interval used by both scheduler loops, in seconds.
    #[arg(long)]
    tick_seconds: Option<u64>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,engine_node=debug".parse().unwrap()),
        )
        .init();

    let args = Args::parse();
    let config = Config::from_env().context("loading configuration")?;
    info!(chain_id = config.chain_id, "engine-node starting");

    // ── Chain gateway ──────────────────────────────────────────────────────
    let primary = Provider::<Http>::try_from(config.rpc_http_url.as_str()).context("connecting primary RPC provider")?;
    let mut providers = HashMap::new();
    providers.insert("primary".to_string(), primary);
    if let Some(backup_url) = &config.backup_rpc_http_url {
        let backup = Provider::<Http>::try_from(backup_url.as_str()).context("connecting backup RPC provider")?;
        providers.insert("backup".to_string(), backup);
    }
    let auto_switch = config.backup_rpc_http_url.is_some();
    let pool = ProviderPool::new(providers, "primary".to_string(), config.chain_id, auto_switch).context("building RPC provider pool")?;
    let limiter = RateLimiter::new(RATE_LIMIT_MAX_CONCURRENCY, RATE_LIMIT_RPS);
    let payout = PayoutSigner::from_private_key(config.payout_wallet_private_key, config.chain_id).context("loading payout wallet")?;
    info!(payout_address = %payout.address(), "payout signer ready");

    // ── Distributed lock ─────────────────────────────────────────────────
    // Built before the chain gateway: the gateway's payment sender holds
    // `nonce_lock:{payout_address}` on this same backend for every send.
    let lock_backend: Arc<dyn core_lock::LockBackend> = if let Some(redis_url) = &config.redis_url {
        Arc::new(RedisLockBackend::connect(redis_url).await.context("connecting to redis lock backend")?)
    } else {
        warn!("REDIS_URL not set, using an in-process lock backend (locks do not cross process boundaries)");
        Arc::new(InMemoryLockBackend::new())
    };

    let chain = Arc::new(ChainGateway::new(
        pool,
        limiter,
        config.usdt_contract_address,
        config.plex_contract_address,
        config.system_wallet_address,
        payout,
        config.confirmation_blocks,
        DistributedLock::new(lock_backend.clone()),
    ));

    // ── Store ──────────────────────────────────────────────────────────────
    // `InMemoryStore` stands in for the Postgres/sqlx-backed implementation
    // of the repository traits — this binary only needs the trait seam, not
    // a persistence engine (§14 Non-goals), but a concrete store is required
    // to run at all. Swap this for a `sqlx`-backed implementation behind
    // the same `core_store` traits to persist across restarts.
    if config.database_url.is_some() {
        warn!("DATABASE_URL is set but engine-node only ships the in-memory store reference implementation");
    }
    let store = Arc::new(InMemoryStore::new());
    store.put_settings(config.initial_global_settings()).await.context("seeding initial global settings")?;

    // ── Notifications ────────────────────────────────────────────────────
    let (notify, mut notify_rx) = ChannelNotificationSink::new(NOTIFICATION_CHANNEL_CAPACITY);
    let notify = Arc::new(notify);
    tokio::spawn(async move {
        while let Some(event) = notify_rx.recv().await {
            info!(?event, "notification");
        }
    });

    // ── Engines ───────────────────────────────────────────────────────────
    let referral = Arc::new(ReferralEngine::new(store.clone(), notify.clone()));
    let deposit_engine = Arc::new(core_deposit::DepositEngine::new(
        store.clone(),
        store.clone(),
        store.clone(),
        DistributedLock::new(lock_backend.clone()),
        chain.clone(),
        referral,
        notify.clone(),
    ));
    let plex_monitor = Arc::new(core_plex::PlexMonitor::new(
        store.clone(),
        store.clone(),
        chain.clone(),
        DistributedLock::new(lock_backend.clone()),
        notify.clone(),
    ));
    let deposit_monitor = Arc::new(DepositMonitor::new(
        store.clone(),
        store.clone(),
        deposit_engine,
        chain.clone(),
        notify,
        DistributedLock::new(lock_backend),
    ));

    let tick = Duration::from_secs(args.tick_seconds.unwrap_or(config.poll_interval_s));
    let scheduler = Arc::new(Scheduler::new(deposit_monitor, plex_monitor, tick, tick));

    let cancel = CancellationToken::new();
    let (deposit_handle, plex_handle) = scheduler.spawn(cancel.clone());
    info!("engine-node ready");

    tokio::signal::ctrl_c().await.context("waiting for shutdown signal")?;
    info!("shutdown requested, waiting for in-flight ticks to finish");
    cancel.cancel();
    deposit_handle.await.context("joining deposit monitor loop")?;
    plex_handle.await.context("joining plex monitor loop")?;
    info!("engine-node stopped");

    Ok(())
}
