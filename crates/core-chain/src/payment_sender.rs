//! Payment sender: nonce-locked, previous-tx-resuming ERC-20 transfer
//! submission with a bounded retry loop.

use crate::erc20::Erc20;
use crate::gateway::ChainGateway;
use core_types::{constants, Amount, CoreError, EvmAddress, TxHash};
use ethers::providers::Middleware;
use ethers::types::{Address, U256};
use std::sync::Arc;
use std::time::Duration;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PaymentResult {
    Success { tx_hash: TxHash, block_number: u64 },
    /// Submitted but not yet confirmed after the receipt wait; the caller
    /// must re-check later, never treat this as a failure (§6.1).
    Pending { tx_hash: TxHash },
    Failed { tx_hash: Option<TxHash>, error: String },
}

const RECEIPT_WAIT: Duration = Duration::from_secs(120);
const PREVIOUS_TX_WAIT: Duration = Duration::from_secs(60);
const RPC_CALL_TIMEOUT: Duration = Duration::from_secs(30);
/// Lease for `nonce_lock:{payout_address}` (§4.3): long enough to cover
/// gas estimation, signing, submission, and the full receipt wait, since
/// the lock must stay held until the nonce this call claimed is either
/// landed or handed back via a `Pending` result.
const NONCE_LOCK_TTL: Duration = Duration::from_secs(150);
/// How long a second payment sender from another process waits for the
/// nonce lock before giving up, rather than queuing indefinitely.
const NONCE_LOCK_WAIT: Duration = Duration::from_secs(30);
/// §4.4.1 step 2: `pending > latest + 5` is logged as a stuck-tx warning,
/// not treated as an error — the send still proceeds using `pending`.
const STUCK_TX_NONCE_GAP: u64 = 5;

fn to_ethers_address(addr: EvmAddress) -> Address {
    Address::from(addr.as_bytes().to_owned())
}

impl ChainGateway {
    /// Sends a USDT payment, implementing the original's previous-tx
    /// check -> build -> sign -> submit -> wait-for-receipt sequence with
    /// an outer bounded retry loop.
    pub async fn send_payment(
        &self,
        to: EvmAddress,
        amount: Amount,
        previous_tx_hash: Option<TxHash>,
    ) -> PaymentResult {
        if let Some(prev) = previous_tx_hash {
            if let Some(result) = self.check_previous_tx(prev).await {
                return result;
            }
        }

        let amount_wei = amount.to_wei(constants::USDT_DECIMALS);
        let mut last_tx_hash = previous_tx_hash;

        for attempt in 0..constants::DEFAULT_MAX_RETRIES {
            if attempt > 0 {
                if let Some(prev) = last_tx_hash {
                    if let Some(result @ PaymentResult::Success { .. }) = self.check_previous_tx(prev).await {
                        return result;
                    }
                }
            }

            match self.send_transaction_once(to, amount_wei.raw()).await {
                PaymentResult::Pending { tx_hash } => return PaymentResult::Pending { tx_hash },
                PaymentResult::Success { tx_hash, block_number } => {
                    return PaymentResult::Success { tx_hash, block_number }
                }
                PaymentResult::Failed { tx_hash, error } => {
                    last_tx_hash = tx_hash.or(last_tx_hash);
                    tracing::warn!(attempt = attempt + 1, %error, "payment attempt failed");
                    if attempt + 1 < constants::DEFAULT_MAX_RETRIES {
                        let delay = constants::RETRY_BACKOFF_BASE_SECS.pow(attempt + 1);
                        tokio::time::sleep(Duration::from_secs(delay)).await;
                    }
                }
            }
        }

        PaymentResult::Failed {
            tx_hash: last_tx_hash,
            error: format!("failed after {} attempts", constants::DEFAULT_MAX_RETRIES),
        }
    }

    async fn check_previous_tx(&self, previous: TxHash) -> Option<PaymentResult> {
        let provider = self.pool.get_active().await;
        let h256 = ethers::types::H256::from(*previous.as_bytes());

        match provider.get_transaction_receipt(h256).await {
            Ok(Some(receipt)) => {
                if receipt.status == Some(1u64.into()) {
                    return Some(PaymentResult::Success {
                        tx_hash: previous,
                        block_number: receipt.block_number.map(|n| n.as_u64()).unwrap_or_default(),
                    });
                }
                return Some(PaymentResult::Failed {
                    tx_hash: Some(previous),
                    error: "previous transaction reverted".to_string(),
                });
            }
            Ok(None) => {
                // Still pending: wait up to 60s for it to land before giving up.
                let wait = tokio::time::timeout(PREVIOUS_TX_WAIT, async {
                    loop {
                        if let Ok(Some(r)) = provider.get_transaction_receipt(h256).await {
                            return r;
                        }
                        tokio::time::sleep(Duration::from_secs(2)).await;
                    }
                })
                .await;
                match wait {
                    Ok(receipt) if receipt.status == Some(1u64.into()) => Some(PaymentResult::Success {
                        tx_hash: previous,
                        block_number: receipt.block_number.map(|n| n.as_u64()).unwrap_or_default(),
                    }),
                    _ => None,
                }
            }
            Err(_) => None,
        }
    }

    /// Acquires `nonce_lock:{payout_address}` (§4.3, spec.md:127) around the
    /// nonce-fetch-through-submit sequence, so two processes sharing one
    /// payout wallet serialize on the same cross-process lock rather than
    /// racing on the in-process mutex alone.
    async fn send_transaction_once(&self, to: EvmAddress, amount_wei: u128) -> PaymentResult {
        let key = format!("nonce_lock:{}", self.payout_address());
        match self
            .lock
            .with_lock(&key, NONCE_LOCK_TTL, true, NONCE_LOCK_WAIT, || {
                self.send_transaction_once_locked(to, amount_wei)
            })
            .await
        {
            Ok(result) => result,
            Err(e) => PaymentResult::Failed { tx_hash: None, error: format!("nonce lock unavailable: {e}") },
        }
    }

    async fn send_transaction_once_locked(&self, to: EvmAddress, amount_wei: u128) -> PaymentResult {
        let _nonce_guard = self.nonce_mutex.lock().await;
        let _permit = self.limiter.acquire().await;

        let provider = Arc::new(self.pool.get_active().await);
        let from = to_ethers_address(self.payout_address());
        let to_addr = to_ethers_address(to);

        let pending_count = match tokio::time::timeout(
            RPC_CALL_TIMEOUT,
            provider.get_transaction_count(from, Some(ethers::types::BlockNumber::Pending.into())),
        )
        .await
        {
            Ok(Ok(n)) => n,
            _ => return PaymentResult::Failed { tx_hash: None, error: "timeout getting nonce".into() },
        };
        let latest_count = match tokio::time::timeout(
            RPC_CALL_TIMEOUT,
            provider.get_transaction_count(from, Some(ethers::types::BlockNumber::Latest.into())),
        )
        .await
        {
            Ok(Ok(n)) => n,
            _ => return PaymentResult::Failed { tx_hash: None, error: "timeout getting nonce".into() },
        };
        if pending_count.as_u64().saturating_sub(latest_count.as_u64()) > STUCK_TX_NONCE_GAP {
            tracing::warn!(
                payout_address = %self.payout_address(),
                pending = pending_count.as_u64(),
                latest = latest_count.as_u64(),
                "payout wallet has a stuck transaction: pending nonce far ahead of latest"
            );
        }
        let nonce = pending_count;

        let contract = Erc20::new(to_ethers_address(self.usdt), provider.clone());
        let amount_u256 = U256::from(amount_wei);
        let call = contract.transfer(to_addr, amount_u256);

        let gas_limit = match tokio::time::timeout(RPC_CALL_TIMEOUT, call.estimate_gas()).await {
            Ok(Ok(estimate)) => {
                let buffered = estimate.as_u128() as f64 * 1.2;
                U256::from(buffered as u128)
            }
            _ => U256::from(constants::DEFAULT_USDT_TRANSFER_GAS),
        };

        let gas_price = match tokio::time::timeout(RPC_CALL_TIMEOUT, provider.get_gas_price()).await {
            Ok(Ok(price)) => price,
            _ => return PaymentResult::Failed { tx_hash: None, error: "timeout getting gas price".into() },
        };
        let min_gas_price = ethers::utils::parse_units(constants::MIN_GAS_PRICE_GWEI, "gwei").unwrap().into();
        let max_gas_price: U256 = ethers::utils::parse_units(constants::MAX_GAS_PRICE_GWEI, "gwei").unwrap().into();
        let gas_price = gas_price.clamp(min_gas_price, max_gas_price);

        let mut tx = call.tx.clone();
        tx.set_from(from);
        tx.set_nonce(nonce);
        tx.set_gas(gas_limit);
        tx.set_gas_price(gas_price);

        let signature = match self.payout.sign(&tx).await {
            Ok(sig) => sig,
            Err(e) => return PaymentResult::Failed { tx_hash: None, error: e.to_string() },
        };
        let raw = tx.rlp_signed(&signature);

        let pending = match tokio::time::timeout(RPC_CALL_TIMEOUT, provider.send_raw_transaction(raw)).await {
            Ok(Ok(pending)) => pending,
            Ok(Err(e)) => return PaymentResult::Failed { tx_hash: None, error: e.to_string() },
            Err(_) => return PaymentResult::Failed { tx_hash: None, error: "timeout sending transaction".into() },
        };

        let tx_hash = TxHash::from_bytes(pending.tx_hash().0);
        tracing::info!(tx_hash = %tx_hash, "payment transaction submitted");

        match tokio::time::timeout(RECEIPT_WAIT, pending).await {
            Ok(Ok(Some(receipt))) if receipt.status == Some(1u64.into()) => PaymentResult::Success {
                tx_hash,
                block_number: receipt.block_number.map(|n| n.as_u64()).unwrap_or_default(),
            },
            Ok(Ok(Some(_))) => PaymentResult::Failed { tx_hash: Some(tx_hash), error: "transaction reverted".into() },
            Ok(Ok(None)) | Ok(Err(_)) => PaymentResult::Pending { tx_hash },
            // Timeout does not mean failure: the transaction may still land.
            Err(_) => PaymentResult::Pending { tx_hash },
        }
    }
}
