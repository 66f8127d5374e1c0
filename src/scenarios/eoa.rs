// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@oxidity.com>

use crate::app::config::LoadSettings;
use crate::common::error::AppError;
use crate::common::parsing::parse_ether_amount;
use crate::scenarios::Scenario;
use crate::services::dispatch::assembler::TxPayload;
use crate::services::wallet::account::Account;
use alloy::primitives::{Address, U256};
use rand::Rng;
use std::str::FromStr;

/// Plain value transfers between externally owned accounts.
#[derive(Debug, Clone)]
pub struct EoaTransfer {
    target: Option<Address>,
    value: U256,
    random_value: bool,
}

impl EoaTransfer {
    pub const NAME: &'static str = "eoatx";

    /// `target = None` sends each transfer back to its sender.
    pub fn new(target: Option<Address>, value: U256, random_value: bool) -> Self {
        Self {
            target,
            value,
            random_value,
        }
    }

    pub fn from_settings(settings: &LoadSettings) -> Result<Self, AppError> {
        let target = settings
            .transfer_target
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .map(|raw| {
                Address::from_str(raw.trim())
                    .map_err(|e| AppError::Config(format!("Invalid transfer target {raw}: {e}")))
            })
            .transpose()?;
        let value = parse_ether_amount(&settings.transfer_value).ok_or_else(|| {
            AppError::Config(format!("Invalid transfer value: {}", settings.transfer_value))
        })?;
        Ok(Self::new(target, value, settings.random_value))
    }

    fn value_for(&self) -> U256 {
        if !self.random_value || self.value.is_zero() {
            return self.value;
        }
        let cap = u128::try_from(self.value).unwrap_or(u128::MAX);
        U256::from(rand::rng().random_range(0..=cap))
    }
}

impl Scenario for EoaTransfer {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn build_payload(&self, _index: u64, account: &Account) -> Result<TxPayload, AppError> {
        let to = self.target.unwrap_or_else(|| account.address());
        Ok(TxPayload::transfer(to, self.value_for()))
    }
}
