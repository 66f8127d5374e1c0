// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@oxidity.com>

use crate::app::config::LoadSettings;
use crate::common::error::AppError;
use crate::domain::constants::GAS_BURNER_OVERHEAD;
use crate::scenarios::Scenario;
use crate::services::dispatch::assembler::TxPayload;
use crate::services::wallet::account::Account;
use alloy::primitives::{Address, U256};
use alloy::sol;
use alloy_sol_types::SolCall;
use std::str::FromStr;

sol! {
    interface IGasBurner {
        function burnGasUnits(uint256 units) external;
    }
}

/// Calls a deployed gas burner so every transaction costs a fixed amount of gas.
#[derive(Debug, Clone)]
pub struct GasBurner {
    contract: Address,
    units: u64,
}

impl GasBurner {
    pub const NAME: &'static str = "gasburnertx";

    pub fn new(contract: Address, units: u64) -> Result<Self, AppError> {
        if units == 0 {
            return Err(AppError::Config("gas_units_to_burn must be > 0".into()));
        }
        Ok(Self { contract, units })
    }

    pub fn from_settings(settings: &LoadSettings) -> Result<Self, AppError> {
        let raw = settings
            .gas_burner_address
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| {
                AppError::Config("gasburnertx requires gas_burner_address".into())
            })?;
        let contract = Address::from_str(raw)
            .map_err(|e| AppError::Config(format!("Invalid gas burner address {raw}: {e}")))?;
        Self::new(contract, settings.gas_units_to_burn)
    }

    pub fn gas_limit(&self) -> u64 {
        self.units.saturating_add(GAS_BURNER_OVERHEAD)
    }
}

impl Scenario for GasBurner {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn build_payload(&self, index: u64, _account: &Account) -> Result<TxPayload, AppError> {
        tracing::debug!(target: "dispatch", tx = index + 1, units = self.units, "Gas units to burn");
        let input = IGasBurner::burnGasUnitsCall {
            units: U256::from(self.units),
        }
        .abi_encode();
        Ok(TxPayload::call(
            self.contract,
            U256::ZERO,
            self.gas_limit(),
            input.into(),
        ))
    }
}
