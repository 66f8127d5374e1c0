// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@mitander.dev>

use alloy::primitives::utils::format_ether;
use chain_loadgen::app::config::{LoadSettings, parse_host_list};
use chain_loadgen::app::logging::{effective_level, setup_logging};
use chain_loadgen::domain::error::AppError;
use chain_loadgen::infrastructure::network::endpoint::SharedEndpoint;
use chain_loadgen::infrastructure::network::pool::{EndpointPool, SelectionMode};
use chain_loadgen::infrastructure::network::provider::RpcEndpoint;
use chain_loadgen::infrastructure::network::relay::RelayClient;
use chain_loadgen::scenarios;
use chain_loadgen::services::dispatch::{DispatchLoop, FeeEstimator, SubmissionPath};
use chain_loadgen::services::maintenance::{Schedule, spawn_health_loop, spawn_resupply_loop};
use chain_loadgen::services::metrics::spawn_metrics_server;
use chain_loadgen::services::wallet::{AccountRegistry, prepare_funding};
use clap::Parser;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

#[derive(Parser, Debug)]
#[command(author, version, about = "synthetic transaction load generator")]
struct Cli {
    /// Path to config file (default: ./config.{toml,yaml,...})
    #[arg(long)]
    config: Option<String>,

    /// Scenario to run (eoatx, gasburnertx)
    #[arg(long)]
    scenario: Option<String>,

    /// RPC hosts; repeat or comma-separate
    #[arg(long = "rpchost", value_delimiter = ',')]
    rpc_hosts: Vec<String>,

    /// Total number of transactions to send
    #[arg(long, short = 'c')]
    count: Option<u64>,

    /// Number of transactions to send per slot
    #[arg(long, short = 't')]
    throughput: Option<u64>,

    /// Maximum number of pending transactions
    #[arg(long)]
    max_pending: Option<u64>,

    /// Maximum number of child wallets to use
    #[arg(long)]
    max_wallets: Option<u64>,

    /// Seconds to wait for a confirmation before aborting the run (0 = forever)
    #[arg(long)]
    timeout: Option<u64>,

    /// Max fee per gas in gwei
    #[arg(long)]
    basefee: Option<u64>,

    /// Max tip per gas in gwei
    #[arg(long)]
    tipfee: Option<u64>,

    /// Seed for child wallet derivation
    #[arg(long)]
    seed: Option<String>,

    /// Send transactions via the relay instead of the RPC hosts
    #[arg(long, default_value_t = false)]
    send_via_relay: bool,

    #[arg(long)]
    relay_address: Option<String>,

    #[arg(long)]
    rollup_id: Option<String>,

    /// Metrics port (overrides config/env, 0 disables)
    #[arg(long)]
    metrics_port: Option<u16>,

    #[arg(long, short = 'v', default_value_t = false)]
    debug: bool,

    #[arg(long, default_value_t = false)]
    json_logs: bool,
}

impl Cli {
    fn apply(self, settings: &mut LoadSettings) {
        if !self.rpc_hosts.is_empty() {
            settings.rpc_hosts = self
                .rpc_hosts
                .iter()
                .flat_map(|h| parse_host_list(h))
                .collect();
        }
        if let Some(v) = self.scenario {
            settings.scenario = v;
        }
        if let Some(v) = self.count {
            settings.count = v;
        }
        if let Some(v) = self.throughput {
            settings.throughput = v;
        }
        if let Some(v) = self.max_pending {
            settings.max_pending = v;
        }
        if let Some(v) = self.max_wallets {
            settings.max_wallets = v;
        }
        if let Some(v) = self.timeout {
            settings.timeout_secs = v;
        }
        if let Some(v) = self.basefee {
            settings.base_fee_gwei = v;
        }
        if let Some(v) = self.tipfee {
            settings.tip_fee_gwei = v;
        }
        if let Some(v) = self.seed {
            settings.wallet_seed = v;
        }
        if let Some(v) = self.relay_address {
            settings.relay_address = v;
        }
        if let Some(v) = self.rollup_id {
            settings.rollup_id = v;
        }
        if let Some(v) = self.metrics_port {
            settings.metrics_port = v;
        }
        settings.send_via_relay |= self.send_via_relay;
        settings.debug |= self.debug;
        settings.json_logs |= self.json_logs;
    }
}

#[tokio::main]
async fn main() -> Result<(), AppError> {
    let cli = Cli::parse();

    let mut settings = LoadSettings::load_with_path(cli.config.as_deref())?;
    cli.apply(&mut settings);
    setup_logging(
        effective_level(&settings.log_level, settings.debug),
        settings.json_logs,
    )?;
    settings.validate()?;

    let endpoints: Vec<SharedEndpoint> =
        RpcEndpoint::from_urls(&settings.rpc_hosts, settings.receipt_poll())?
            .into_iter()
            .map(|e| Arc::new(e) as SharedEndpoint)
            .collect();
    let pool = Arc::new(EndpointPool::new(endpoints)?);
    let health = pool.refresh_health().await?;
    tracing::info!(target: "pool", good = ?health.good, bad = ?health.bad, "Initial endpoint health");

    let chain_id = pool.select(SelectionMode::ByIndex, 0)?.chain_id().await?;
    let scenario = scenarios::build(&settings.scenario, &settings)?;
    let registry = Arc::new(AccountRegistry::derive(
        settings.funding_signer()?,
        chain_id,
        &settings.wallet_seed,
        settings.wallet_count(),
    )?);
    registry
        .sync_from_chain(pool.select(SelectionMode::ByIndex, 0)?.as_ref())
        .await?;
    tracing::info!(
        target: "config",
        chain_id,
        scenario = scenario.name(),
        wallets = registry.worker_count(),
        root = %registry.funding_account().address(),
        root_balance = %format_ether(registry.funding_account().balance()),
        "Setup complete"
    );

    let fees = FeeEstimator::new(settings.base_fee_gwei, settings.tip_fee_gwei);
    let shutdown = CancellationToken::new();
    let mut background = vec![spawn_health_loop(
        pool.clone(),
        Schedule::health(),
        shutdown.clone(),
    )];

    let configured_plan = settings.funding_plan()?;
    if let Some(funder) = prepare_funding(
        scenario.as_ref(),
        registry.clone(),
        pool.clone(),
        fees,
        &configured_plan,
    )
    .await?
    {
        background.push(spawn_resupply_loop(
            funder,
            Schedule::resupply(),
            shutdown.clone(),
        ));
    }

    let submission = if settings.send_via_relay {
        SubmissionPath::Relay(Arc::new(RelayClient::new(
            &settings.relay_url(),
            settings.rollup_id.clone(),
        )?))
    } else {
        SubmissionPath::Direct
    };

    let dispatch = DispatchLoop::new(
        pool.clone(),
        registry.clone(),
        scenario,
        fees,
        submission,
        settings.dispatch_options(),
    );
    let ctx = dispatch.context();
    if settings.metrics_port > 0 {
        spawn_metrics_server(settings.metrics_port, ctx.clone(), pool.clone()).await;
    }

    let result = dispatch.run_with(ctx).await;
    shutdown.cancel();
    // A top-up may be waiting on a receipt; do not hold the exit for it.
    for handle in &background {
        handle.abort();
    }

    match result {
        Ok(summary) => {
            tracing::info!(
                target: "dispatch",
                dispatched = summary.dispatched,
                submitted = summary.submitted,
                failed = summary.failed_dispatches,
                confirmed = summary.confirmed,
                reverted = summary.reverted,
                watch_errors = summary.watch_errors,
                fees_eth = %format_ether(summary.fees_paid),
                elapsed_secs = summary.elapsed.as_secs(),
                "Run summary"
            );
            Ok(())
        }
        Err(e) => {
            tracing::error!(target: "dispatch", error = %e, fatal = e.is_fatal(), "Run aborted");
            Err(e)
        }
    }
}
