// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@oxidity.com>

use crate::common::error::AppError;
use crate::domain::constants::{FEE_HISTORY_BLOCKS, WEI_PER_GWEI};
use crate::infrastructure::network::provider::HttpProvider;
use alloy::eips::BlockNumberOrTag;
use alloy::providers::Provider;
use alloy::rpc::types::FeeHistory;

/// Tip used when the node returns no reward samples.
const DEFAULT_TIP_WEI: u128 = 2 * WEI_PER_GWEI;
/// Base fee assumed when the latest block carries none (pre-London or a stub node).
const DEFAULT_BASE_FEE_WEI: u128 = 1_500_000_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SuggestedFees {
    pub max_fee_per_gas: u128,
    pub max_priority_fee_per_gas: u128,
    pub next_base_fee_per_gas: u128,
}

/// Derives a fee pair from `eth_feeHistory`: next base fee plus the median tip.
pub fn fees_from_history(history: &FeeHistory) -> Result<SuggestedFees, AppError> {
    let latest_base_fee = history
        .latest_block_base_fee()
        .or_else(|| history.base_fee_per_gas.iter().rev().nth(1).copied())
        .ok_or_else(|| AppError::Initialization("No base fee history".into()))?;

    let raw_next_base = history.next_block_base_fee().unwrap_or(latest_base_fee);
    // Some nodes report zero for the pending block; assume a full block instead.
    let next_base_fee = if raw_next_base == 0 {
        next_base_fee_upper_bound(latest_base_fee)
    } else {
        raw_next_base
    };

    let samples: Vec<u128> = history
        .reward
        .as_ref()
        .map(|rewards| {
            rewards
                .iter()
                .filter_map(|block| block.first().copied())
                .collect()
        })
        .unwrap_or_default();
    let tip = if samples.is_empty() {
        DEFAULT_TIP_WEI
    } else {
        samples.iter().sum::<u128>() / samples.len() as u128
    };

    Ok(SuggestedFees {
        max_fee_per_gas: next_base_fee.saturating_add(tip),
        max_priority_fee_per_gas: tip,
        next_base_fee_per_gas: next_base_fee,
    })
}

/// Worst case base fee one block ahead (+12.5%).
pub fn next_base_fee_upper_bound(base_fee: u128) -> u128 {
    base_fee.saturating_mul(1125) / 1000
}

pub async fn suggest_fees(provider: &HttpProvider) -> Result<SuggestedFees, AppError> {
    match provider
        .get_fee_history(FEE_HISTORY_BLOCKS, BlockNumberOrTag::Latest, &[50.0f64])
        .await
    {
        Ok(history) => match fees_from_history(&history) {
            Ok(fees) => return Ok(fees),
            Err(e) => {
                tracing::debug!(target: "gas", error = %e, "Unusable fee history, falling back")
            }
        },
        Err(e) => {
            tracing::debug!(target: "gas", error = %e, "eth_feeHistory failed, falling back")
        }
    }
    fallback_estimate(provider).await
}

// Path for nodes that disable feeHistory (common on devnets and some public RPCs).
async fn fallback_estimate(provider: &HttpProvider) -> Result<SuggestedFees, AppError> {
    let block = provider
        .get_block_by_number(BlockNumberOrTag::Latest)
        .await
        .map_err(|e| AppError::Connection(format!("Latest block fetch failed: {}", e)))?;

    let base: u128 = block
        .as_ref()
        .and_then(|b| b.header.base_fee_per_gas)
        .map(|v| v as u128)
        .unwrap_or(DEFAULT_BASE_FEE_WEI);

    let tip = provider
        .get_max_priority_fee_per_gas()
        .await
        .map_err(|e| AppError::Connection(format!("eth_maxPriorityFeePerGas failed: {}", e)))?;

    let next_base = next_base_fee_upper_bound(base);
    Ok(SuggestedFees {
        max_fee_per_gas: next_base.saturating_add(tip),
        max_priority_fee_per_gas: tip,
        next_base_fee_per_gas: next_base,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn history(base_fees: Vec<u128>, rewards: Option<Vec<Vec<u128>>>) -> FeeHistory {
        FeeHistory {
            base_fee_per_gas: base_fees,
            gas_used_ratio: vec![0.5; 2],
            reward: rewards,
            oldest_block: 100,
            ..Default::default()
        }
    }

    #[test]
    fn uses_next_base_fee_and_median_tip_average() {
        let h = history(
            vec![10 * WEI_PER_GWEI, 11 * WEI_PER_GWEI, 12 * WEI_PER_GWEI],
            Some(vec![vec![WEI_PER_GWEI], vec![3 * WEI_PER_GWEI]]),
        );
        let fees = fees_from_history(&h).unwrap();
        assert_eq!(fees.next_base_fee_per_gas, 12 * WEI_PER_GWEI);
        assert_eq!(fees.max_priority_fee_per_gas, 2 * WEI_PER_GWEI);
        assert_eq!(fees.max_fee_per_gas, 14 * WEI_PER_GWEI);
    }

    #[test]
    fn zero_next_base_fee_is_bumped_from_latest() {
        let h = history(vec![8 * WEI_PER_GWEI, 0], None);
        let fees = fees_from_history(&h).unwrap();
        assert_eq!(fees.next_base_fee_per_gas, 9 * WEI_PER_GWEI);
        assert_eq!(fees.max_priority_fee_per_gas, DEFAULT_TIP_WEI);
    }

    #[test]
    fn empty_history_is_an_error() {
        let h = history(Vec::new(), None);
        assert!(fees_from_history(&h).is_err());
    }
}
