// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@oxidity.com>

pub mod eoa;
pub mod gasburner;

pub use eoa::EoaTransfer;
pub use gasburner::GasBurner;

use crate::app::config::LoadSettings;
use crate::common::error::AppError;
use crate::services::dispatch::assembler::TxPayload;
use crate::services::wallet::account::Account;
use crate::services::wallet::funding::FundingPlan;
use std::sync::Arc;

/// What differs between workloads. The dispatch loop is shared; a scenario
/// only decides what each transaction carries and how workers are funded.
pub trait Scenario: Send + Sync {
    fn name(&self) -> &'static str;

    /// Payload for dispatch `index`, sent from `account`.
    fn build_payload(&self, index: u64, account: &Account) -> Result<TxPayload, AppError>;

    /// Scenarios that fund their own accounts opt out of prefund and resupply.
    fn needs_funding(&self) -> bool {
        true
    }

    fn funding_plan(&self, configured: &FundingPlan) -> FundingPlan {
        configured.clone()
    }
}

pub const SCENARIO_NAMES: &[&str] = &[EoaTransfer::NAME, GasBurner::NAME];

pub fn build(name: &str, settings: &LoadSettings) -> Result<Arc<dyn Scenario>, AppError> {
    match name.trim().to_ascii_lowercase().as_str() {
        EoaTransfer::NAME => Ok(Arc::new(EoaTransfer::from_settings(settings)?)),
        GasBurner::NAME => Ok(Arc::new(GasBurner::from_settings(settings)?)),
        other => Err(AppError::Config(format!(
            "Unknown scenario '{other}', expected one of: {}",
            SCENARIO_NAMES.join(", ")
        ))),
    }
}
