// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@oxidity.com>

use crate::common::error::AppError;
use crate::common::parsing::format_gwei;
use crate::infrastructure::network::endpoint::{SharedEndpoint, SignedTransaction, TxConfirmation};
use crate::services::dispatch::context::{AdmissionSlot, RunContext};
use crate::services::wallet::account::Account;
use alloy::primitives::U256;
use alloy::primitives::utils::format_units;
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;
use tokio::time::Instant;

/// A submitted transaction waiting for inclusion.
#[derive(Debug, Clone)]
pub struct PendingDispatch {
    pub index: u64,
    pub account: Arc<Account>,
    pub endpoint: SharedEndpoint,
    pub tx: SignedTransaction,
    pub submitted_at: Instant,
}

impl PendingDispatch {
    pub fn deadline(&self, timeout: Option<Duration>) -> Option<Instant> {
        timeout.map(|t| self.submitted_at + t)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrackOutcome {
    Confirmed(TxConfirmation),
    TimedOut,
    WatchError,
}

/// Watches one transaction to a terminal state and releases its admission
/// slot on the way out, whatever that state is.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConfirmationTracker {
    timeout: Option<Duration>,
}

impl ConfirmationTracker {
    /// `None` or a zero duration waits forever.
    pub fn new(timeout: Option<Duration>) -> Self {
        Self {
            timeout: timeout.filter(|t| !t.is_zero()),
        }
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    pub async fn track(
        &self,
        pending: PendingDispatch,
        slot: AdmissionSlot,
        ctx: &RunContext,
    ) -> TrackOutcome {
        let _slot = slot;
        let hash = format!("{:#x}", pending.tx.hash);
        let watch = pending.endpoint.await_transaction(&pending.tx);

        let result = match self.deadline_for(&pending) {
            Some(deadline) => match tokio::time::timeout_at(deadline, watch).await {
                Ok(result) => result,
                Err(_) => {
                    let timeout_secs = self.timeout.map(|t| t.as_secs()).unwrap_or_default();
                    ctx.stats().timeouts.fetch_add(1, Ordering::Relaxed);
                    ctx.fatal().raise(AppError::ConfirmationTimeout {
                        index: pending.index + 1,
                        hash,
                        timeout_secs,
                    });
                    return TrackOutcome::TimedOut;
                }
            },
            None => watch.await,
        };

        match result {
            Ok(confirmation) => {
                self.settle(&pending, &confirmation, ctx);
                TrackOutcome::Confirmed(confirmation)
            }
            Err(e) => {
                ctx.stats().watch_errors.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(
                    target: "tracker",
                    rpc = %pending.endpoint.name(),
                    tx = pending.index + 1,
                    hash = %hash,
                    error = %e,
                    "Error while awaiting tx receipt"
                );
                TrackOutcome::WatchError
            }
        }
    }

    fn deadline_for(&self, pending: &PendingDispatch) -> Option<Instant> {
        pending.deadline(self.timeout)
    }

    fn settle(&self, pending: &PendingDispatch, confirmation: &TxConfirmation, ctx: &RunContext) {
        let fee = confirmation.total_fee();
        let spent = pending.tx.value().saturating_add(fee);
        let balance = pending.account.debit(spent);
        ctx.stats().add_fee(fee);
        if confirmation.success {
            ctx.stats().confirmed.fetch_add(1, Ordering::Relaxed);
        } else {
            ctx.stats().reverted.fetch_add(1, Ordering::Relaxed);
        }

        tracing::info!(
            target: "tracker",
            rpc = %pending.endpoint.name(),
            tx = pending.index + 1,
            hash = %format!("{:#x}", pending.tx.hash),
            block = confirmation.block_number,
            status = if confirmation.success { "success" } else { "reverted" },
            gas_used = confirmation.gas_used,
            gas_price_gwei = %format_gwei(confirmation.effective_gas_price.unwrap_or_default()),
            exec_fee_gwei = %gwei(confirmation.execution_fee()),
            blob_fee_gwei = %gwei(confirmation.blob_fee()),
            total_fee_gwei = %gwei(fee),
            elapsed_ms = pending.submitted_at.elapsed().as_millis() as u64,
            balance = %balance,
            "Tx confirmed"
        );
    }
}

fn gwei(wei: U256) -> String {
    format_units(wei, "gwei").unwrap_or_else(|_| wei.to_string())
}
