//! Balance queries: a defensive, fail-to-`None` style. Any chain failure
//! here resolves to `None`, never propagates as an error, since a stale
//! or missing balance reading must never abort a caller that only wants
//! a best-effort display value.

use crate::erc20::Erc20;
use crate::gateway::ChainGateway;
use core_types::{constants, Amount, EvmAddress};
use ethers::providers::Middleware;
use ethers::types::Address;
use std::sync::Arc;

fn to_ethers_address(addr: EvmAddress) -> Address {
    Address::from(addr.as_bytes().to_owned())
}

impl ChainGateway {
    pub async fn get_usdt_balance(&self, holder: EvmAddress) -> Option<Amount> {
        self.erc20_balance(self.usdt, holder, constants::USDT_DECIMALS).await
    }

    pub async fn get_plex_balance(&self, holder: EvmAddress) -> Option<Amount> {
        self.erc20_balance(self.plex, holder, constants::PLEX_DECIMALS).await
    }

    pub async fn get_native_balance(&self, holder: EvmAddress) -> Option<Amount> {
        let _permit = self.limiter.acquire().await;
        let provider = self.pool.get_active().await;
        let wei = provider.get_balance(to_ethers_address(holder), None).await.ok()?;
        let raw: u128 = wei.try_into().ok()?;
        Some(core_types::WeiAmount::from_raw(raw).to_amount(constants::NATIVE_DECIMALS))
    }

    async fn erc20_balance(&self, token: EvmAddress, holder: EvmAddress, decimals: u8) -> Option<Amount> {
        let _permit = self.limiter.acquire().await;
        let provider = Arc::new(self.pool.get_active().await);
        let contract = Erc20::new(to_ethers_address(token), provider);
        let raw: ethers::types::U256 = contract.balance_of(to_ethers_address(holder)).call().await.ok()?;
        let raw: u128 = raw.try_into().ok()?;
        Some(core_types::WeiAmount::from_raw(raw).to_amount(decimals))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn address_conversion_round_trips() {
        let addr = EvmAddress::from_bytes([7u8; 20]);
        let ethers_addr = to_ethers_address(addr);
        assert_eq!(ethers_addr.0, [7u8; 20]);
    }
}
