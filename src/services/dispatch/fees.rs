// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@oxidity.com>

use crate::common::error::AppError;
use crate::domain::constants::{MIN_FEE_WEI, WEI_PER_GWEI};
use crate::infrastructure::network::endpoint::ChainEndpoint;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeeQuote {
    pub fee_cap: u128,
    pub tip_cap: u128,
}

impl FeeQuote {
    /// Raises both caps to the protocol floor.
    pub fn clamped(self) -> Self {
        Self {
            fee_cap: self.fee_cap.max(MIN_FEE_WEI),
            tip_cap: self.tip_cap.max(MIN_FEE_WEI),
        }
    }

    /// Nodes reject a dynamic-fee tx whose tip is above its fee cap.
    pub fn tip_exceeds_cap(&self) -> bool {
        self.tip_cap > self.fee_cap
    }
}

/// Turns configured gwei overrides and live endpoint suggestions into a fee pair.
///
/// Explicit overrides win only when both are set: some targets suggest
/// nonsense fees and must be driven by hand, others suggest well and are left
/// to do so.
#[derive(Debug, Clone, Copy, Default)]
pub struct FeeEstimator {
    base_fee_gwei: u64,
    tip_fee_gwei: u64,
}

impl FeeEstimator {
    pub fn new(base_fee_gwei: u64, tip_fee_gwei: u64) -> Self {
        Self {
            base_fee_gwei,
            tip_fee_gwei,
        }
    }

    pub fn configured(&self) -> Option<FeeQuote> {
        if self.base_fee_gwei > 0 && self.tip_fee_gwei > 0 {
            Some(FeeQuote {
                fee_cap: u128::from(self.base_fee_gwei) * WEI_PER_GWEI,
                tip_cap: u128::from(self.tip_fee_gwei) * WEI_PER_GWEI,
            })
        } else {
            None
        }
    }

    pub async fn quote(&self, endpoint: &dyn ChainEndpoint) -> Result<FeeQuote, AppError> {
        let quote = match self.configured() {
            Some(quote) => quote,
            None => {
                let (fee_cap, tip_cap) = endpoint.suggest_fees().await?;
                FeeQuote { fee_cap, tip_cap }
            }
        };
        let quote = quote.clamped();
        if quote.tip_exceeds_cap() {
            tracing::warn!(
                target: "fees",
                fee_cap = quote.fee_cap,
                tip_cap = quote.tip_cap,
                rpc = %endpoint.name(),
                "Tip cap above fee cap; nodes will reject these transactions"
            );
        }
        Ok(quote)
    }
}
