// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@oxidity.com>

use crate::common::error::AppError;
use crate::domain::constants::{
    DEFAULT_TX_TIMEOUT_SECS, MAX_CONSECUTIVE_DISPATCH_FAILURES, PACING_POLL_INTERVAL, SECONDS_PER_SLOT,
};
use crate::infrastructure::network::endpoint::{SharedEndpoint, SignedTransaction};
use crate::infrastructure::network::pool::{EndpointPool, SelectionMode};
use crate::scenarios::Scenario;
use crate::services::dispatch::assembler::TransactionAssembler;
use crate::services::dispatch::context::{AdmissionSlot, RunContext};
use crate::services::dispatch::fees::FeeEstimator;
use crate::services::dispatch::submit::SubmissionPath;
use crate::services::dispatch::tracker::{ConfirmationTracker, PendingDispatch};
use crate::services::wallet::account::Account;
use crate::services::wallet::registry::AccountRegistry;
use alloy::primitives::U256;
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::task::TaskTracker;

#[derive(Debug, Clone)]
pub struct DispatchOptions {
    /// Stop once this many dispatches are submitted or in flight. 0 = no limit.
    pub total_count: u64,
    /// Admissions per slot. 0 = unpaced.
    pub throughput: u64,
    pub slot_duration: Duration,
    /// Submitted-but-unconfirmed cap. 0 = unbounded.
    pub max_pending: u64,
    pub timeout: Option<Duration>,
    pub endpoint_selection: SelectionMode,
    pub wallet_selection: SelectionMode,
    /// Failed sends in a row that abort the run. 0 = retry forever.
    pub max_consecutive_failures: u64,
}

impl Default for DispatchOptions {
    fn default() -> Self {
        Self {
            total_count: 0,
            throughput: 0,
            slot_duration: Duration::from_secs(SECONDS_PER_SLOT),
            max_pending: 0,
            timeout: Some(Duration::from_secs(DEFAULT_TX_TIMEOUT_SECS)),
            endpoint_selection: SelectionMode::ByIndex,
            wallet_selection: SelectionMode::ByIndex,
            max_consecutive_failures: MAX_CONSECUTIVE_DISPATCH_FAILURES,
        }
    }
}

impl DispatchOptions {
    pub fn validate(&self) -> Result<(), AppError> {
        if self.total_count == 0 && self.throughput == 0 {
            return Err(AppError::Config(
                "neither total count nor throughput limit set, must define at least one of them"
                    .into(),
            ));
        }
        if self.throughput > 0 && self.slot_duration.is_zero() {
            return Err(AppError::Config("slot duration must be non-zero when pacing".into()));
        }
        Ok(())
    }
}

/// True while admissions are ahead of `throughput` per elapsed slot.
/// The current slot counts as elapsed, so a fresh run may admit one full slot.
pub fn pacing_exceeded(accounted: u64, elapsed: Duration, slot: Duration, throughput: u64) -> bool {
    if throughput == 0 {
        return false;
    }
    let slot_ms = slot.as_millis().max(1);
    let elapsed_slots = u64::try_from(elapsed.as_millis() / slot_ms)
        .unwrap_or(u64::MAX)
        .saturating_add(1);
    accounted / elapsed_slots >= throughput
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub dispatched: u64,
    pub submitted: u64,
    pub failed_dispatches: u64,
    pub confirmed: u64,
    pub reverted: u64,
    pub watch_errors: u64,
    pub timeouts: u64,
    pub fees_paid: U256,
    pub elapsed: Duration,
}

impl RunSummary {
    pub fn from_context(ctx: &RunContext) -> Self {
        let counters = ctx.snapshot();
        let stats = ctx.stats();
        Self {
            dispatched: counters.next_index,
            submitted: counters.submitted,
            failed_dispatches: stats.failed_dispatches.load(Ordering::Relaxed),
            confirmed: stats.confirmed.load(Ordering::Relaxed),
            reverted: stats.reverted.load(Ordering::Relaxed),
            watch_errors: stats.watch_errors.load(Ordering::Relaxed),
            timeouts: stats.timeouts.load(Ordering::Relaxed),
            fees_paid: stats.fees_paid(),
            elapsed: ctx.elapsed(),
        }
    }
}

/// Admission-controlled, rate-paced driver shared by every scenario.
#[derive(Clone)]
pub struct DispatchLoop {
    pool: Arc<EndpointPool>,
    registry: Arc<AccountRegistry>,
    scenario: Arc<dyn Scenario>,
    fees: FeeEstimator,
    assembler: TransactionAssembler,
    submission: SubmissionPath,
    tracker: ConfirmationTracker,
    options: DispatchOptions,
}

impl DispatchLoop {
    pub fn new(
        pool: Arc<EndpointPool>,
        registry: Arc<AccountRegistry>,
        scenario: Arc<dyn Scenario>,
        fees: FeeEstimator,
        submission: SubmissionPath,
        options: DispatchOptions,
    ) -> Self {
        Self {
            pool,
            registry,
            scenario,
            fees,
            assembler: TransactionAssembler::new(),
            submission,
            tracker: ConfirmationTracker::new(options.timeout),
            options,
        }
    }

    pub fn options(&self) -> &DispatchOptions {
        &self.options
    }

    /// A context sized for this loop; pass it to `run_with` to observe the run.
    pub fn context(&self) -> Arc<RunContext> {
        Arc::new(RunContext::new(self.options.max_pending))
    }

    pub async fn run(&self) -> Result<RunSummary, AppError> {
        self.run_with(self.context()).await
    }

    /// Dispatches until the stop condition holds, then waits for every send
    /// and every confirmation. A fatal signal ends the run early with its error.
    pub async fn run_with(&self, ctx: Arc<RunContext>) -> Result<RunSummary, AppError> {
        self.options.validate()?;
        ctx.mark_started();
        let dispatches = TaskTracker::new();
        let confirmations = TaskTracker::new();

        tracing::info!(
            target: "dispatch",
            scenario = self.scenario.name(),
            path = self.submission.label(),
            count = self.options.total_count,
            throughput = self.options.throughput,
            max_pending = self.options.max_pending,
            endpoints = self.pool.len(),
            wallets = self.registry.worker_count(),
            "Starting scenario"
        );

        'admit: loop {
            let slot = tokio::select! {
                biased;
                _ = ctx.fatal().cancelled() => break 'admit,
                slot = ctx.gate().acquire() => slot?,
            };
            let index = ctx.begin_dispatch();
            dispatches.spawn(self.clone().dispatch(
                index,
                slot,
                ctx.clone(),
                confirmations.clone(),
            ));

            let total = self.options.total_count;
            if total > 0 && ctx.accounted() >= total {
                break;
            }
            while pacing_exceeded(
                ctx.accounted(),
                ctx.elapsed(),
                self.options.slot_duration,
                self.options.throughput,
            ) {
                tokio::select! {
                    biased;
                    _ = ctx.fatal().cancelled() => break 'admit,
                    _ = tokio::time::sleep(PACING_POLL_INTERVAL) => {}
                }
            }
        }

        dispatches.close();
        tokio::select! {
            biased;
            _ = ctx.fatal().cancelled() => {}
            _ = dispatches.wait() => {
                tracing::info!(
                    target: "dispatch",
                    submitted = ctx.snapshot().submitted,
                    "Finished sending transactions, awaiting block inclusion"
                );
            }
        }

        confirmations.close();
        tokio::select! {
            biased;
            _ = ctx.fatal().cancelled() => {}
            _ = confirmations.wait() => {}
        }

        if let Some(err) = ctx.fatal().take() {
            return Err(err);
        }
        let summary = RunSummary::from_context(&ctx);
        tracing::info!(
            target: "dispatch",
            scenario = self.scenario.name(),
            submitted = summary.submitted,
            confirmed = summary.confirmed,
            elapsed_ms = summary.elapsed.as_millis() as u64,
            "Scenario finished"
        );
        Ok(summary)
    }

    async fn dispatch(
        self,
        index: u64,
        slot: AdmissionSlot,
        ctx: Arc<RunContext>,
        confirmations: TaskTracker,
    ) {
        let endpoint = match self.pool.select(self.options.endpoint_selection, index) {
            Ok(endpoint) => endpoint,
            Err(e) => {
                self.abandon(index, None, &ctx, e);
                return;
            }
        };
        let account = self.registry.worker(self.options.wallet_selection, index);

        match self.send(index, &endpoint, &account).await {
            Ok(tx) => {
                ctx.stats().record_submission();
                ctx.finish_dispatch(true);
                tracing::info!(
                    target: "dispatch",
                    rpc = %endpoint.name(),
                    tx = index + 1,
                    hash = %format!("{:#x}", tx.hash),
                    from = %account.address(),
                    nonce = tx.nonce(),
                    "Sent tx"
                );
                let pending = PendingDispatch {
                    index,
                    account,
                    endpoint,
                    tx,
                    submitted_at: Instant::now(),
                };
                let tracker = self.tracker;
                confirmations.spawn(async move {
                    tracker.track(pending, slot, &ctx).await;
                });
            }
            Err(e) => self.abandon(index, Some(endpoint.name()), &ctx, e),
        }
    }

    async fn send(
        &self,
        index: u64,
        endpoint: &SharedEndpoint,
        account: &Account,
    ) -> Result<SignedTransaction, AppError> {
        let quote = self.fees.quote(endpoint.as_ref()).await?;
        let payload = self.scenario.build_payload(index, account)?;
        let tx = self.assembler.assemble(account, payload, quote)?;
        self.submission.submit(&tx, endpoint.as_ref()).await?;
        Ok(tx)
    }

    /// Counts the dispatch as over before its slot is dropped by the caller,
    /// so the next admission never sees a stale in-flight count. A long enough
    /// run of failures with no submission in between aborts the run.
    fn abandon(&self, index: u64, rpc: Option<&str>, ctx: &RunContext, err: AppError) {
        let streak = ctx.stats().record_failure();
        tracing::warn!(
            target: "dispatch",
            rpc = rpc.unwrap_or("-"),
            tx = index + 1,
            streak,
            error = %err,
            "Could not send transaction"
        );
        let limit = self.options.max_consecutive_failures;
        if limit > 0 && streak >= limit {
            ctx.fatal().raise(AppError::DispatchStalled {
                failures: streak,
                last_error: err.to_string(),
            });
        }
        ctx.finish_dispatch(false);
    }
}
