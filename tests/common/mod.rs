// SPDX-License-Identifier: MIT

#![allow(dead_code)]

use alloy::primitives::{Address, B256, U256};
use alloy::signers::local::PrivateKeySigner;
use async_trait::async_trait;
use chain_loadgen::domain::error::AppError;
use chain_loadgen::infrastructure::network::endpoint::{
    ChainEndpoint, SharedEndpoint, SignedTransaction, TxConfirmation,
};
use chain_loadgen::infrastructure::network::pool::EndpointPool;
use chain_loadgen::scenarios::EoaTransfer;
use chain_loadgen::services::dispatch::{
    DispatchLoop, DispatchOptions, FeeEstimator, SubmissionPath,
};
use chain_loadgen::services::wallet::AccountRegistry;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;
use tokio::time::Instant;

pub const CHAIN_ID: u64 = 1337;

/// In-memory chain endpoint that records what it was sent.
pub struct MockEndpoint {
    name: String,
    confirm_delay: Duration,
    never_confirm: bool,
    failures_left: AtomicU64,
    healthy: AtomicBool,
    outstanding: AtomicU64,
    pub max_outstanding: AtomicU64,
    pub sends: Mutex<Vec<(Address, u64, Instant)>>,
}

impl MockEndpoint {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            confirm_delay: Duration::from_millis(50),
            never_confirm: false,
            failures_left: AtomicU64::new(0),
            healthy: AtomicBool::new(true),
            outstanding: AtomicU64::new(0),
            max_outstanding: AtomicU64::new(0),
            sends: Mutex::new(Vec::new()),
        }
    }

    pub fn confirm_after(mut self, delay: Duration) -> Self {
        self.confirm_delay = delay;
        self
    }

    pub fn never_confirming(mut self) -> Self {
        self.never_confirm = true;
        self
    }

    pub fn failing_first(self, sends: u64) -> Self {
        self.failures_left.store(sends, Ordering::SeqCst);
        self
    }

    pub fn set_healthy(&self, healthy: bool) {
        self.healthy.store(healthy, Ordering::SeqCst);
    }

    pub fn send_count(&self) -> usize {
        self.sends.lock().unwrap().len()
    }

    pub fn send_times(&self) -> Vec<Instant> {
        self.sends.lock().unwrap().iter().map(|(_, _, at)| *at).collect()
    }

    /// Nonces seen per sender, in send order.
    pub fn nonces_by_sender(&self) -> HashMap<Address, Vec<u64>> {
        let mut out: HashMap<Address, Vec<u64>> = HashMap::new();
        for (from, nonce, _) in self.sends.lock().unwrap().iter() {
            out.entry(*from).or_default().push(*nonce);
        }
        out
    }
}

#[async_trait]
impl ChainEndpoint for MockEndpoint {
    fn name(&self) -> &str {
        &self.name
    }

    async fn chain_id(&self) -> Result<u64, AppError> {
        Ok(CHAIN_ID)
    }

    async fn suggest_fees(&self) -> Result<(u128, u128), AppError> {
        Ok((30_000_000_000, 1_500_000_000))
    }

    async fn nonce_of(&self, _address: Address) -> Result<u64, AppError> {
        Ok(0)
    }

    async fn balance_of(&self, _address: Address) -> Result<U256, AppError> {
        Ok(U256::from(10u64).pow(U256::from(18u64)))
    }

    async fn send_transaction(&self, tx: &SignedTransaction) -> Result<(), AppError> {
        let failing = self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(AppError::Transaction {
                hash: format!("{:#x}", tx.hash),
                reason: "rejected by mock".into(),
            });
        }
        self.sends
            .lock()
            .unwrap()
            .push((tx.from, tx.nonce(), Instant::now()));
        let now = self.outstanding.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_outstanding.fetch_max(now, Ordering::SeqCst);
        Ok(())
    }

    async fn await_transaction(&self, _tx: &SignedTransaction) -> Result<TxConfirmation, AppError> {
        if self.never_confirm {
            std::future::pending::<()>().await;
        }
        tokio::time::sleep(self.confirm_delay).await;
        self.outstanding.fetch_sub(1, Ordering::SeqCst);
        Ok(TxConfirmation {
            block_number: 1,
            success: true,
            gas_used: 21_000,
            effective_gas_price: Some(1_000_000_000),
            ..Default::default()
        })
    }

    async fn health_check(&self) -> Result<(), AppError> {
        if self.healthy.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(AppError::Connection(format!("{} unhealthy", self.name)))
        }
    }
}

pub fn registry(workers: u64) -> Arc<AccountRegistry> {
    let root = PrivateKeySigner::from_bytes(&B256::repeat_byte(0x42)).unwrap();
    Arc::new(AccountRegistry::derive(root, CHAIN_ID, "integration", workers).unwrap())
}

pub fn pool(endpoints: &[Arc<MockEndpoint>]) -> Arc<EndpointPool> {
    let shared: Vec<SharedEndpoint> = endpoints
        .iter()
        .map(|e| e.clone() as SharedEndpoint)
        .collect();
    Arc::new(EndpointPool::new(shared).unwrap())
}

pub fn transfer_loop(
    endpoints: &[Arc<MockEndpoint>],
    workers: u64,
    options: DispatchOptions,
) -> DispatchLoop {
    DispatchLoop::new(
        pool(endpoints),
        registry(workers),
        Arc::new(EoaTransfer::new(None, U256::ZERO, false)),
        FeeEstimator::new(20, 2),
        SubmissionPath::Direct,
        options,
    )
}
