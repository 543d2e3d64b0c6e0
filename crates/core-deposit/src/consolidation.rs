//! One-shot consolidation: an operator-invoked batch procedure, not a
//! scheduler sweep.

use crate::engine::deposit_type_for_level;
use chrono::Utc;
use core_store::DepositRepository;
use core_types::{constants, Amount, CoreError, Deposit, DepositId, DepositStatus, DepositStatusExt, TxHash, UserId};
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ConsolidationReport {
    pub groups_consolidated: u32,
    pub deposits_merged: u32,
    pub consolidated_deposit_ids: Vec<DepositId>,
}

/// Merges a user's `Confirmed`, ROI-completed, not-yet-consolidated
/// deposits into one record per level. A level with fewer than two
/// eligible deposits is left untouched — there's nothing to merge.
pub async fn consolidate_deposits(store: &Arc<dyn DepositRepository>, user_id: UserId) -> Result<ConsolidationReport, CoreError> {
    let deposits = store.list_by_user(user_id).await?;

    let mut by_level: HashMap<u8, Vec<Deposit>> = HashMap::new();
    for deposit in deposits {
        if deposit.status == DepositStatus::Confirmed && deposit.is_roi_completed && !deposit.is_consolidated {
            by_level.entry(deposit.level).or_default().push(deposit);
        }
    }

    let mut report = ConsolidationReport::default();
    let now = Utc::now();

    for (level, group) in by_level {
        let group_len = group.len();
        if group_len < 2 {
            continue;
        }

        let total_amount = group.iter().fold(Amount::ZERO, |acc, d| acc + d.amount);
        let total_roi_cap = group.iter().fold(Amount::ZERO, |acc, d| acc + d.roi_cap_amount);
        let total_roi_paid = group.iter().fold(Amount::ZERO, |acc, d| acc + d.roi_paid_amount);
        let tx_hashes: Vec<TxHash> = group.iter().filter_map(|d| d.tx_hash).collect();
        let wallet_address = group.iter().find_map(|d| d.wallet_address);

        let id = store.next_id().await?;
        let consolidated = Deposit {
            id,
            user_id,
            level,
            amount: total_amount,
            deposit_type: deposit_type_for_level(level),
            status: DepositStatus::Confirmed,
            tx_hash: None,
            block_number: None,
            wallet_address,
            // no single level version backs a merged deposit.
            deposit_version_id: 0,
            roi_cap_amount: total_roi_cap,
            roi_paid_amount: total_roi_paid,
            is_roi_completed: total_roi_paid >= total_roi_cap,
            completed_at: Some(now),
            next_accrual_at: None,
            is_consolidated: true,
            consolidated_at: Some(now),
            consolidated_tx_hashes: tx_hashes,
            plex_daily_required: Amount::from_decimal(total_amount.as_decimal() * Decimal::from(constants::PLEX_PER_DOLLAR)),
            plex_cycle_start: Some(now),
            created_at: now,
            confirmed_at: Some(now),
            updated_at: now,
        };
        store.put(consolidated).await?;

        for mut source in group {
            source.status.transition(DepositStatus::Consolidated)?;
            source.updated_at = now;
            store.put(source).await?;
        }

        report.groups_consolidated += 1;
        report.deposits_merged += group_len as u32;
        report.consolidated_deposit_ids.push(id);
    }

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_types::{DepositType, EvmAddress};

    fn confirmed_completed(id: i64, level: u8, amount: &str) -> Deposit {
        let now = Utc::now();
        Deposit {
            id: DepositId(id),
            user_id: UserId(1),
            level,
            amount: Amount::try_from_str(amount).unwrap(),
            deposit_type: DepositType::Level1,
            status: DepositStatus::Confirmed,
            tx_hash: Some(TxHash::from_bytes([id as u8; 32])),
            block_number: Some(1),
            wallet_address: Some(EvmAddress::from_bytes([9u8; 20])),
            deposit_version_id: 1,
            roi_cap_amount: Amount::try_from_str("200").unwrap(),
            roi_paid_amount: Amount::try_from_str("200").unwrap(),
            is_roi_completed: true,
            completed_at: Some(now),
            next_accrual_at: None,
            is_consolidated: false,
            consolidated_at: None,
            consolidated_tx_hashes: Vec::new(),
            plex_daily_required: Amount::try_from_str("1000").unwrap(),
            plex_cycle_start: None,
            created_at: now,
            confirmed_at: Some(now),
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn merges_two_same_level_completed_deposits() {
        let store: Arc<dyn DepositRepository> = Arc::new(core_store::InMemoryStore::new());
        store.put(confirmed_completed(1, 1, "100")).await.unwrap();
        store.put(confirmed_completed(2, 1, "150")).await.unwrap();

        let report = consolidate_deposits(&store, UserId(1)).await.unwrap();
        assert_eq!(report.groups_consolidated, 1);
        assert_eq!(report.deposits_merged, 2);

        let merged_id = report.consolidated_deposit_ids[0];
        let merged = store.get(merged_id).await.unwrap().unwrap();
        assert_eq!(merged.amount, Amount::try_from_str("250").unwrap());
        assert_eq!(merged.consolidated_tx_hashes.len(), 2);
        assert!(merged.is_consolidated);

        let original = store.get(DepositId(1)).await.unwrap().unwrap();
        assert_eq!(original.status, DepositStatus::Consolidated);
    }

    #[tokio::test]
    async fn single_eligible_deposit_is_left_alone() {
        let store: Arc<dyn DepositRepository> = Arc::new(core_store::InMemoryStore::new());
        store.put(confirmed_completed(1, 1, "100")).await.unwrap();

        let report = consolidate_deposits(&store, UserId(1)).await.unwrap();
        assert_eq!(report.groups_consolidated, 0);
        assert!(report.consolidated_deposit_ids.is_empty());
    }
}
