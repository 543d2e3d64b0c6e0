//! Deposit scan / verifier: reverse-chunk log scanning, skipping (not
//! failing) a chunk whose `eth_getLogs` call errors, sorting the
//! aggregate result ascending by block at the end.

use crate::erc20::{Erc20, TransferFilter};
use crate::gateway::ChainGateway;
use core_types::{constants, Amount, EvmAddress, TxHash};
use ethers::providers::Middleware;
use ethers::types::Address;
use std::sync::Arc;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DepositMatch {
    pub tx_hash: TxHash,
    pub amount: Amount,
    pub block_number: u64,
}

fn to_ethers_address(addr: EvmAddress) -> Address {
    Address::from(addr.as_bytes().to_owned())
}

impl ChainGateway {
    /// Looks for one Transfer log from `from` to the system wallet whose
    /// value matches `expected_amount` within `tolerance`, across
    /// `[from_block, to_block]`.
    pub async fn search_for_deposit(
        &self,
        from: EvmAddress,
        expected_amount: Amount,
        from_block: u64,
        to_block: u64,
        tolerance: Amount,
    ) -> Option<DepositMatch> {
        let matches = self.scan_deposits_in_range(from, from_block, to_block).await;
        matches.into_iter().find(|m| {
            let diff = if m.amount >= expected_amount {
                m.amount.saturating_sub(expected_amount)
            } else {
                expected_amount.saturating_sub(m.amount)
            };
            diff <= tolerance
        })
    }

    /// Scans up to `max_blocks` back from the chain tip in `chunk_size`
    /// windows, newest chunk first; per-chunk `eth_getLogs` failures are
    /// logged and skipped rather than aborting the whole scan. The
    /// returned vector is sorted ascending by block, matching the
    /// original's final `transactions.sort(key=lambda x: x["block"])`.
    pub async fn scan_deposits(&self, user_wallet: EvmAddress, max_blocks: u64, chunk_size: u64) -> Vec<DepositMatch> {
        let max_blocks = max_blocks.min(constants::MAX_SCAN_WINDOW_BLOCKS);
        let provider = self.pool.get_active().await;
        let latest = match provider.get_block_number().await {
            Ok(n) => n.as_u64(),
            Err(e) => {
                tracing::warn!(error = %e, "scan_deposits: could not read chain tip");
                return Vec::new();
            }
        };
        let from_block = latest.saturating_sub(max_blocks);
        self.scan_chunked(user_wallet, from_block, latest, chunk_size).await
    }

    /// Newest-first scan over the system's received PLEX transfers,
    /// returning on the first match (§9 Open Question: first match by
    /// event order wins, see DESIGN.md).
    pub async fn verify_plex_payment(&self, sender: EvmAddress, amount_plex: Amount, lookback_blocks: u64) -> Option<DepositMatch> {
        let provider = self.pool.get_active().await;
        let latest = provider.get_block_number().await.ok()?.as_u64();
        let from_block = latest.saturating_sub(lookback_blocks.min(constants::MAX_SCAN_WINDOW_BLOCKS));

        let contract = Erc20::new(to_ethers_address(self.plex), Arc::new(provider));
        let filter: ethers::contract::Event<_, _, TransferFilter> = contract
            .event::<TransferFilter>()
            .from_block(from_block)
            .to_block(latest)
            .topic1(to_ethers_address(sender));

        let mut logs = filter.query_with_meta().await.ok()?;
        logs.sort_by(|a, b| b.1.block_number.cmp(&a.1.block_number));

        for (event, meta) in logs {
            let raw: u128 = event.value.try_into().unwrap_or(0);
            let amount = core_types::WeiAmount::from_raw(raw).to_amount(constants::PLEX_DECIMALS);
            if amount == amount_plex {
                return Some(DepositMatch {
                    tx_hash: TxHash::from_bytes(meta.transaction_hash.0),
                    amount,
                    block_number: meta.block_number.as_u64(),
                });
            }
        }
        None
    }

    async fn scan_deposits_in_range(&self, from: EvmAddress, from_block: u64, to_block: u64) -> Vec<DepositMatch> {
        self.scan_chunked(from, from_block, to_block, 5_000).await
    }

    async fn scan_chunked(&self, user_wallet: EvmAddress, from_block: u64, to_block: u64, chunk_size: u64) -> Vec<DepositMatch> {
        let provider = Arc::new(self.pool.get_active().await);
        let contract = Erc20::new(to_ethers_address(self.usdt), provider);

        let mut out = Vec::new();
        let mut current_end = to_block;
        while current_end > from_block {
            let current_start = from_block.max(current_end.saturating_sub(chunk_size));

            let filter: ethers::contract::Event<_, _, TransferFilter> = contract
                .event::<TransferFilter>()
                .from_block(current_start)
                .to_block(current_end)
                .topic1(to_ethers_address(user_wallet))
                .topic2(to_ethers_address(self.system_wallet));

            match filter.query_with_meta().await {
                Ok(logs) => {
                    for (event, meta) in logs {
                        let raw: u128 = event.value.try_into().unwrap_or(0);
                        out.push(DepositMatch {
                            tx_hash: TxHash::from_bytes(meta.transaction_hash.0),
                            amount: core_types::WeiAmount::from_raw(raw).to_amount(constants::USDT_DECIMALS),
                            block_number: meta.block_number.as_u64(),
                        });
                    }
                }
                Err(e) => {
                    tracing::warn!(from = current_start, to = current_end, error = %e, "deposit scan chunk failed, skipping");
                }
            }
            current_end = current_start;
        }

        out.sort_by_key(|m| m.block_number);
        out
    }
}
