// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@oxidity.com>

use crate::common::error::AppError;
use crate::domain::constants::FUNDING_CONCURRENCY;
use crate::infrastructure::network::endpoint::ChainEndpoint;
use crate::infrastructure::network::pool::{SelectionMode, pick_index};
use crate::services::wallet::account::{Account, derive_worker_signer};
use alloy::signers::local::PrivateKeySigner;
use futures::StreamExt;
use futures::stream;
use std::sync::{Arc, Mutex};

/// The funding account plus the worker accounts that originate load.
pub struct AccountRegistry {
    funding: Arc<Account>,
    workers: Vec<Arc<Account>>,
    rr_cursor: Mutex<usize>,
}

impl AccountRegistry {
    pub fn new(funding: Account, workers: Vec<Account>) -> Result<Self, AppError> {
        if workers.is_empty() {
            return Err(AppError::NoAccounts);
        }
        Ok(Self {
            funding: Arc::new(funding),
            workers: workers.into_iter().map(Arc::new).collect(),
            rr_cursor: Mutex::new(0),
        })
    }

    /// Builds the registry from the funding key, deriving `count` workers.
    pub fn derive(
        root: PrivateKeySigner,
        chain_id: u64,
        seed: &str,
        count: u64,
    ) -> Result<Self, AppError> {
        let workers = (0..count)
            .map(|idx| derive_worker_signer(&root, seed, idx).map(|s| Account::new(s, chain_id)))
            .collect::<Result<Vec<_>, _>>()?;
        Self::new(Account::new(root, chain_id), workers)
    }

    pub fn funding_account(&self) -> &Arc<Account> {
        &self.funding
    }

    pub fn workers(&self) -> &[Arc<Account>] {
        &self.workers
    }

    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    pub fn worker(&self, mode: SelectionMode, key: u64) -> Arc<Account> {
        let mut cursor = self.rr_cursor.lock().unwrap_or_else(|e| e.into_inner());
        let idx = pick_index(mode, key, self.workers.len(), &mut cursor);
        self.workers[idx].clone()
    }

    /// Loads nonce and balance for every account from `endpoint`.
    pub async fn sync_from_chain(&self, endpoint: &dyn ChainEndpoint) -> Result<(), AppError> {
        self.funding.sync(endpoint).await?;
        let results: Vec<Result<(), AppError>> = stream::iter(self.workers.iter())
            .map(|worker| worker.sync(endpoint))
            .buffer_unordered(FUNDING_CONCURRENCY)
            .collect()
            .await;
        let failed = results.iter().filter(|r| r.is_err()).count();
        if let Some(Err(first)) = results.into_iter().find(|r| r.is_err()) {
            tracing::warn!(target: "wallet", failed, "Worker sync incomplete");
            return Err(first);
        }
        tracing::info!(
            target: "wallet",
            funding = %self.funding.address(),
            funding_balance = %self.funding.balance(),
            workers = self.workers.len(),
            "Accounts synced"
        );
        Ok(())
    }
}
