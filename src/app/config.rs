// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@mitander.dev>

use crate::common::parsing::{normalize_rpc_url, parse_ether_amount};
use crate::domain::constants;
use crate::domain::error::AppError;
use crate::infrastructure::network::pool::SelectionMode;
use crate::services::dispatch::engine::DispatchOptions;
use crate::services::wallet::funding::FundingPlan;
use alloy::primitives::U256;
use alloy::signers::local::PrivateKeySigner;
use config::{Config, Environment, File};
use serde::{Deserialize, Deserializer};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

pub const ENV_PREFIX: &str = "LOADGEN";

#[derive(Debug, Deserialize, Clone)]
pub struct LoadSettings {
    // General
    #[serde(default = "default_false")]
    pub debug: bool,
    #[serde(default = "default_false")]
    pub json_logs: bool,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default = "default_metrics_port")]
    pub metrics_port: u16,

    // Endpoints
    #[serde(default, deserialize_with = "deserialize_host_list")]
    pub rpc_hosts: Vec<String>,
    #[serde(default = "default_receipt_poll_ms")]
    pub receipt_poll_ms: u64,
    #[serde(default)]
    pub endpoint_selection: SelectionMode,

    // Wallets
    #[serde(default)]
    pub wallet_key: String,
    #[serde(default)]
    pub wallet_seed: String,
    #[serde(default)]
    pub wallet_selection: SelectionMode,
    #[serde(default)]
    pub max_wallets: u64,
    #[serde(default = "default_wallet_prefund")]
    pub wallet_prefund: String,
    #[serde(default = "default_wallet_minfund")]
    pub wallet_minfund: String,

    // Dispatch
    #[serde(default = "default_scenario")]
    pub scenario: String,
    #[serde(default)]
    pub count: u64,
    #[serde(default)]
    pub throughput: u64,
    #[serde(default = "default_slot_duration_secs")]
    pub slot_duration_secs: u64,
    #[serde(default)]
    pub max_pending: u64,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_base_fee_gwei")]
    pub base_fee_gwei: u64,
    #[serde(default = "default_tip_fee_gwei")]
    pub tip_fee_gwei: u64,
    #[serde(default = "default_max_consecutive_failures")]
    pub max_consecutive_failures: u64,

    // Relay
    #[serde(default = "default_false")]
    pub send_via_relay: bool,
    #[serde(default = "default_relay_address")]
    pub relay_address: String,
    #[serde(default)]
    pub rollup_id: String,

    // Scenario parameters
    #[serde(default = "default_gas_units_to_burn")]
    pub gas_units_to_burn: u64,
    #[serde(default)]
    pub gas_burner_address: Option<String>,
    #[serde(default)]
    pub transfer_target: Option<String>,
    #[serde(default = "default_transfer_value")]
    pub transfer_value: String,
    #[serde(default = "default_false")]
    pub random_value: bool,
}

fn default_false() -> bool {
    false
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_metrics_port() -> u16 {
    0
}
fn default_receipt_poll_ms() -> u64 {
    constants::RECEIPT_POLL_MS
}
fn default_wallet_prefund() -> String {
    "5".to_string()
}
fn default_wallet_minfund() -> String {
    "2".to_string()
}
fn default_scenario() -> String {
    "eoatx".to_string()
}
fn default_slot_duration_secs() -> u64 {
    constants::SECONDS_PER_SLOT
}
fn default_timeout_secs() -> u64 {
    constants::DEFAULT_TX_TIMEOUT_SECS
}
fn default_base_fee_gwei() -> u64 {
    20
}
fn default_tip_fee_gwei() -> u64 {
    2
}
fn default_max_consecutive_failures() -> u64 {
    constants::MAX_CONSECUTIVE_DISPATCH_FAILURES
}
fn default_relay_address() -> String {
    "localhost:50051".to_string()
}
fn default_gas_units_to_burn() -> u64 {
    constants::DEFAULT_GAS_BURN_UNITS
}
fn default_transfer_value() -> String {
    "20 gwei".to_string()
}

impl Default for LoadSettings {
    fn default() -> Self {
        Self {
            debug: default_false(),
            json_logs: default_false(),
            log_level: default_log_level(),
            metrics_port: default_metrics_port(),
            rpc_hosts: Vec::new(),
            receipt_poll_ms: default_receipt_poll_ms(),
            endpoint_selection: SelectionMode::default(),
            wallet_key: String::new(),
            wallet_seed: String::new(),
            wallet_selection: SelectionMode::default(),
            max_wallets: 0,
            wallet_prefund: default_wallet_prefund(),
            wallet_minfund: default_wallet_minfund(),
            scenario: default_scenario(),
            count: 0,
            throughput: 0,
            slot_duration_secs: default_slot_duration_secs(),
            max_pending: 0,
            timeout_secs: default_timeout_secs(),
            base_fee_gwei: default_base_fee_gwei(),
            tip_fee_gwei: default_tip_fee_gwei(),
            max_consecutive_failures: default_max_consecutive_failures(),
            send_via_relay: default_false(),
            relay_address: default_relay_address(),
            rollup_id: String::new(),
            gas_units_to_burn: default_gas_units_to_burn(),
            gas_burner_address: None,
            transfer_target: None,
            transfer_value: default_transfer_value(),
            random_value: default_false(),
        }
    }
}

/// Accepts a TOML array or a comma/space separated string (the env form).
fn deserialize_host_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::{SeqAccess, Visitor};
    use std::fmt;

    struct HostVisitor;

    impl<'de> Visitor<'de> for HostVisitor {
        type Value = Vec<String>;

        fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
            formatter.write_str("a sequence of RPC hosts or a string with comma-separated hosts")
        }

        fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
        where
            E: serde::de::Error,
        {
            Ok(parse_host_list(v))
        }

        fn visit_seq<A>(self, mut seq: A) -> Result<Self::Value, A::Error>
        where
            A: SeqAccess<'de>,
        {
            let mut out = Vec::new();
            while let Some(elem) = seq.next_element::<String>()? {
                out.extend(parse_host_list(&elem));
            }
            Ok(out)
        }
    }

    deserializer.deserialize_any(HostVisitor)
}

pub fn parse_host_list(raw: &str) -> Vec<String> {
    raw.split([',', ' ', '\n', '\t'])
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(normalize_rpc_url)
        .collect()
}

impl LoadSettings {
    pub fn load_with_path(path: Option<&str>) -> Result<Self, AppError> {
        dotenvy::dotenv().ok();

        let mut builder = Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(File::from(Path::new(path)).required(true));
        } else {
            builder = builder.add_source(File::with_name("config").required(false));
        }
        // CLI (in main) > env/.env > file.
        builder = builder.add_source(Environment::with_prefix(ENV_PREFIX).prefix_separator("_"));

        let settings: LoadSettings = builder.build()?.try_deserialize()?;
        Ok(settings)
    }

    pub fn load() -> Result<Self, AppError> {
        Self::load_with_path(None)
    }

    /// Checks everything that must hold before any dispatch begins.
    pub fn validate(&self) -> Result<(), AppError> {
        if self.rpc_hosts.is_empty() {
            return Err(AppError::Config("No RPC hosts configured".into()));
        }
        if self.wallet_key.trim().is_empty() {
            return Err(AppError::Config("WALLET_KEY is missing".into()));
        }
        if self.send_via_relay && self.rollup_id.trim().is_empty() {
            return Err(AppError::Config(
                "send_via_relay requires a rollup_id".into(),
            ));
        }
        self.prefund_wei()?;
        self.min_fund_wei()?;
        self.dispatch_options().validate()
    }

    pub fn funding_signer(&self) -> Result<PrivateKeySigner, AppError> {
        PrivateKeySigner::from_str(self.wallet_key.trim())
            .map_err(|e| AppError::Config(format!("Invalid wallet key: {e}")))
    }

    /// `max_wallets` when set; otherwise scaled to the run size and capped.
    pub fn wallet_count(&self) -> u64 {
        if self.max_wallets > 0 {
            self.max_wallets
        } else if self.count > 0 {
            self.count.min(constants::MAX_DERIVED_WALLETS)
        } else {
            self.throughput
                .saturating_mul(constants::WALLETS_PER_THROUGHPUT)
                .min(constants::MAX_DERIVED_WALLETS)
        }
    }

    pub fn prefund_wei(&self) -> Result<U256, AppError> {
        parse_ether_amount(&self.wallet_prefund).ok_or_else(|| {
            AppError::Config(format!("Invalid wallet_prefund: {}", self.wallet_prefund))
        })
    }

    pub fn min_fund_wei(&self) -> Result<U256, AppError> {
        parse_ether_amount(&self.wallet_minfund).ok_or_else(|| {
            AppError::Config(format!("Invalid wallet_minfund: {}", self.wallet_minfund))
        })
    }

    pub fn funding_plan(&self) -> Result<FundingPlan, AppError> {
        Ok(FundingPlan::new(self.prefund_wei()?, self.min_fund_wei()?))
    }

    pub fn relay_url(&self) -> String {
        normalize_rpc_url(&self.relay_address)
    }

    pub fn receipt_poll(&self) -> Duration {
        Duration::from_millis(self.receipt_poll_ms)
    }

    pub fn dispatch_options(&self) -> DispatchOptions {
        DispatchOptions {
            total_count: self.count,
            throughput: self.throughput,
            slot_duration: Duration::from_secs(self.slot_duration_secs),
            max_pending: self.max_pending,
            timeout: (self.timeout_secs > 0).then(|| Duration::from_secs(self.timeout_secs)),
            endpoint_selection: self.endpoint_selection,
            wallet_selection: self.wallet_selection,
            max_consecutive_failures: self.max_consecutive_failures,
        }
    }
}
