//! Chain Gateway (C4, §4.4, §6): the façade every engine crate depends on
//! instead of talking to `ethers` directly.

use crate::pool::ProviderPool;
use crate::rate_limiter::RateLimiter;
use crate::signer::PayoutSigner;
use core_lock::DistributedLock;
use core_types::{EvmAddress, TxHash};
use ethers::providers::Middleware;
use tokio::sync::Mutex;

pub struct ChainGateway {
    pub(crate) pool: ProviderPool,
    pub(crate) limiter: RateLimiter,
    pub(crate) usdt: EvmAddress,
    pub(crate) plex: EvmAddress,
    pub(crate) system_wallet: EvmAddress,
    pub(crate) payout: PayoutSigner,
    pub(crate) confirmation_blocks: u64,
    /// In-process mutex scoped to the payout address (§4.3 "nested inside
    /// the distributed lock"): serializes nonce selection across concurrent
    /// sends from this one process, on top of the cross-process
    /// `nonce_lock:{address}` acquired around the same section via `lock`.
    pub(crate) nonce_mutex: Mutex<()>,
    /// Cross-process lock backing `nonce_lock:{payout_address}` (§4.3,
    /// spec.md:127): every payment send serializes on this, not just the
    /// in-process mutex, so two processes sharing one payout wallet cannot
    /// race the same nonce.
    pub(crate) lock: DistributedLock,
}

impl ChainGateway {
    pub fn new(
        pool: ProviderPool,
        limiter: RateLimiter,
        usdt: EvmAddress,
        plex: EvmAddress,
        system_wallet: EvmAddress,
        payout: PayoutSigner,
        confirmation_blocks: u64,
        lock: DistributedLock,
    ) -> Self {
        Self {
            pool,
            limiter,
            usdt,
            plex,
            system_wallet,
            payout,
            confirmation_blocks,
            nonce_mutex: Mutex::new(()),
            lock,
        }
    }

    pub fn payout_address(&self) -> EvmAddress {
        self.payout.address()
    }

    pub async fn health(&self) -> Vec<crate::pool::ProviderHealth> {
        self.pool.health().await
    }

    pub fn confirmation_blocks(&self) -> u64 {
        self.confirmation_blocks
    }

    /// Confirmation depth and mined block number of a transaction, or
    /// `None` if it's not yet mined or the RPC call failed (§4.9 step 4
    /// reads this fail-open: an unknown depth just means "not confirmed
    /// yet", not "failed"). A reverted transaction reports zero
    /// confirmations so the caller can distinguish it from "still pending".
    pub async fn transaction_confirmations(&self, tx_hash: TxHash) -> Option<(u64, u64)> {
        let provider = self.pool.get_active().await;
        let h256 = ethers::types::H256::from(*tx_hash.as_bytes());
        let receipt = provider.get_transaction_receipt(h256).await.ok()??;
        let tx_block = receipt.block_number?.as_u64();
        if receipt.status != Some(1u64.into()) {
            return Some((0, tx_block));
        }
        let latest = provider.get_block_number().await.ok()?.as_u64();
        Some((latest.saturating_sub(tx_block) + 1, tx_block))
    }
}
