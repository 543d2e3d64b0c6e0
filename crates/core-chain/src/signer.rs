//! Payout signer: a single process-wide cell for the payout private key.
//!
//! The private key lives behind a `zeroize`-on-drop wrapper and is only
//! ever materialized into an `ethers::signers::LocalWallet` inside
//! [`PayoutSigner::sign`], minimizing the lifetime of the decoded key.

use core_types::{CoreError, EvmAddress};
use ethers::signers::{LocalWallet, Signer};
use ethers::types::transaction::eip2718::TypedTransaction;
use ethers::types::Signature;
use zeroize::{Zeroize, ZeroizeOnDrop};

#[derive(Zeroize, ZeroizeOnDrop)]
struct KeyBytes([u8; 32]);

pub struct PayoutSigner {
    key: KeyBytes,
    address: EvmAddress,
    chain_id: u64,
}

impl PayoutSigner {
    pub fn from_private_key(bytes: [u8; 32], chain_id: u64) -> Result<Self, CoreError> {
        let wallet = LocalWallet::from_bytes(&bytes)
            .map_err(|e| CoreError::Internal(format!("invalid payout private key: {e}")))?
            .with_chain_id(chain_id);
        let address = EvmAddress::from_bytes(wallet.address().0);
        Ok(Self { key: KeyBytes(bytes), address, chain_id })
    }

    pub fn address(&self) -> EvmAddress {
        self.address
    }

    /// Materializes a `LocalWallet` only for the duration of this call.
    pub async fn sign(&self, tx: &TypedTransaction) -> Result<Signature, CoreError> {
        let wallet = LocalWallet::from_bytes(&self.key.0)
            .map_err(|e| CoreError::Internal(format!("invalid payout private key: {e}")))?
            .with_chain_id(self.chain_id);
        wallet
            .sign_transaction(tx)
            .await
            .map_err(|e| CoreError::Internal(format!("signing payout transaction: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn address_is_derived_at_construction() {
        let bytes = [0x11u8; 32];
        let signer = PayoutSigner::from_private_key(bytes, 56).unwrap();
        assert_ne!(signer.address().as_bytes(), &[0u8; 20]);
    }
}
