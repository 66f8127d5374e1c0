// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@on1.no>

use crate::common::error::AppError;
use crate::domain::constants::{FUNDING_CONCURRENCY, FUNDING_CONFIRM_TIMEOUT};
use crate::infrastructure::network::endpoint::TxConfirmation;
use crate::infrastructure::network::pool::{EndpointPool, SelectionMode};
use crate::scenarios::Scenario;
use crate::services::dispatch::assembler::{TransactionAssembler, TxPayload};
use crate::services::dispatch::fees::FeeEstimator;
use crate::services::wallet::account::Account;
use crate::services::wallet::registry::AccountRegistry;
use alloy::primitives::U256;
use futures::StreamExt;
use futures::stream;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Mutex as AsyncMutex;

/// How much each worker receives and when it needs more.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FundingPlan {
    pub prefund: U256,
    pub min_balance: U256,
}

impl FundingPlan {
    pub fn new(prefund: U256, min_balance: U256) -> Self {
        Self {
            prefund,
            min_balance,
        }
    }

    pub fn is_disabled(&self) -> bool {
        self.prefund.is_zero()
    }

    pub fn needs_topup(&self, balance: U256) -> bool {
        !self.is_disabled() && balance < self.min_balance
    }
}

/// Moves value from the funding account to workers that fell below the plan's minimum.
///
/// Sends from the funding account are serialized so a failed send can resync
/// the nonce without rewinding past transfers that are already out. Transfers
/// that are sent but not yet confirmed keep their worst-case cost committed
/// against the cached balance.
pub struct Funder {
    registry: Arc<AccountRegistry>,
    pool: Arc<EndpointPool>,
    fees: FeeEstimator,
    assembler: TransactionAssembler,
    plan: FundingPlan,
    confirm_timeout: Duration,
    send_lock: AsyncMutex<()>,
    committed: Mutex<U256>,
}

/// Releases a committed amount when the transfer reaches any terminal state.
struct Commitment<'a> {
    committed: &'a Mutex<U256>,
    amount: U256,
}

impl Drop for Commitment<'_> {
    fn drop(&mut self) {
        let mut committed = self.committed.lock().unwrap_or_else(|e| e.into_inner());
        *committed = committed.saturating_sub(self.amount);
    }
}

impl Funder {
    pub fn new(
        registry: Arc<AccountRegistry>,
        pool: Arc<EndpointPool>,
        fees: FeeEstimator,
        plan: FundingPlan,
    ) -> Self {
        Self {
            registry,
            pool,
            fees,
            assembler: TransactionAssembler::new(),
            plan,
            confirm_timeout: FUNDING_CONFIRM_TIMEOUT,
            send_lock: AsyncMutex::new(()),
            committed: Mutex::new(U256::ZERO),
        }
    }

    pub fn with_confirm_timeout(mut self, timeout: Duration) -> Self {
        self.confirm_timeout = timeout;
        self
    }

    pub fn plan(&self) -> &FundingPlan {
        &self.plan
    }

    /// Worst-case cost of transfers that are sent but not yet settled.
    pub fn committed(&self) -> U256 {
        *self.committed.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn commit(&self, amount: U256) -> Commitment<'_> {
        let mut committed = self.committed.lock().unwrap_or_else(|e| e.into_inner());
        *committed = committed.saturating_add(amount);
        Commitment {
            committed: &self.committed,
            amount,
        }
    }

    /// Sends one prefund transfer to `worker` and waits for it to land.
    pub async fn fund(&self, worker: &Account) -> Result<TxConfirmation, AppError> {
        let endpoint = self.pool.select(SelectionMode::ByIndex, 0)?;
        let funding = self.registry.funding_account();
        let quote = self.fees.quote(endpoint.as_ref()).await?;
        let payload = TxPayload::transfer(worker.address(), self.plan.prefund);

        let required = payload.max_cost(quote.fee_cap);

        let (tx, commitment) = {
            let _send = self.send_lock.lock().await;
            let available = funding.balance().saturating_sub(self.committed());
            if available < required {
                return Err(AppError::InsufficientFunds {
                    required: required.to_string(),
                    available: available.to_string(),
                });
            }

            let tx = self.assembler.assemble(funding, payload, quote)?;
            if let Err(e) = endpoint.send_transaction(&tx).await {
                if let Err(resync) = funding.resync_nonce(endpoint.as_ref()).await {
                    tracing::warn!(target: "funding", error = %resync, "Nonce resync failed");
                }
                return Err(e);
            }
            (tx, self.commit(required))
        };
        let hash = format!("{:#x}", tx.hash);

        let confirmation =
            tokio::time::timeout(self.confirm_timeout, endpoint.await_transaction(&tx))
                .await
                .map_err(|_| AppError::Transaction {
                    hash: hash.clone(),
                    reason: format!(
                        "funding tx not confirmed within {}s",
                        self.confirm_timeout.as_secs()
                    ),
                })??;
        drop(commitment);

        let fee = confirmation.total_fee();
        if !confirmation.success {
            funding.debit(fee);
            return Err(AppError::Transaction {
                hash,
                reason: "funding tx reverted".into(),
            });
        }
        funding.debit(self.plan.prefund.saturating_add(fee));
        let balance = worker.credit(self.plan.prefund);
        tracing::info!(
            target: "funding",
            worker = %worker.address(),
            hash = %hash,
            block = confirmation.block_number,
            balance = %balance,
            "Worker funded"
        );
        Ok(confirmation)
    }

    /// Tops up every worker below the minimum. Returns how many were funded;
    /// the first failure is returned after all attempts finish.
    pub async fn top_up_workers(&self) -> Result<usize, AppError> {
        if self.plan.is_disabled() {
            return Ok(0);
        }
        let needy: Vec<Arc<Account>> = self
            .registry
            .workers()
            .iter()
            .filter(|w| self.plan.needs_topup(w.balance()))
            .cloned()
            .collect();
        if needy.is_empty() {
            tracing::debug!(target: "funding", "All workers above minimum balance");
            return Ok(0);
        }

        tracing::info!(
            target: "funding",
            workers = needy.len(),
            amount = %self.plan.prefund,
            "Topping up workers"
        );
        let transfers: Vec<_> = needy.iter().map(|worker| self.fund(worker)).collect();
        let results: Vec<Result<TxConfirmation, AppError>> = stream::iter(transfers)
            .buffer_unordered(FUNDING_CONCURRENCY)
            .collect()
            .await;

        let funded = results.iter().filter(|r| r.is_ok()).count();
        let failed = results.len() - funded;
        match results.into_iter().find_map(Result::err) {
            Some(first) => {
                tracing::warn!(target: "funding", funded, failed, error = %first, "Top-up incomplete");
                Err(first)
            }
            None => Ok(funded),
        }
    }
}

/// Prefunds workers for `scenario` and returns the funder that keeps them
/// topped up. Scenarios that fund their own accounts get `None` and no
/// transfers are sent.
pub async fn prepare_funding(
    scenario: &dyn Scenario,
    registry: Arc<AccountRegistry>,
    pool: Arc<EndpointPool>,
    fees: FeeEstimator,
    configured: &FundingPlan,
) -> Result<Option<Arc<Funder>>, AppError> {
    if !scenario.needs_funding() {
        tracing::info!(target: "funding", scenario = scenario.name(), "Scenario funds its own accounts");
        return Ok(None);
    }
    let funder = Arc::new(Funder::new(registry, pool, fees, scenario.funding_plan(configured)));
    let funded = funder.top_up_workers().await?;
    tracing::info!(target: "funding", funded, "Initial prefund done");
    Ok(Some(funder))
}
