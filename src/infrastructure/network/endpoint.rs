// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@oxidity.com>

use crate::common::error::AppError;
use alloy::consensus::TxEip1559;
use alloy::primitives::{Address, B256, Bytes, U256};
use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;

/// A signed EIP-1559 transaction ready for the wire.
#[derive(Clone, Debug)]
pub struct SignedTransaction {
    pub hash: B256,
    pub from: Address,
    pub raw: Bytes,
    pub tx: TxEip1559,
}

impl SignedTransaction {
    pub fn nonce(&self) -> u64 {
        self.tx.nonce
    }

    pub fn value(&self) -> U256 {
        self.tx.value
    }

    pub fn chain_id(&self) -> u64 {
        self.tx.chain_id
    }

    pub fn max_fee_per_gas(&self) -> u128 {
        self.tx.max_fee_per_gas
    }

    pub fn max_priority_fee_per_gas(&self) -> u128 {
        self.tx.max_priority_fee_per_gas
    }
}

/// What a mined receipt tells us about a transaction.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TxConfirmation {
    pub block_number: u64,
    pub success: bool,
    pub gas_used: u64,
    pub effective_gas_price: Option<u128>,
    pub blob_gas_used: Option<u64>,
    pub blob_gas_price: Option<u128>,
}

impl TxConfirmation {
    /// Execution fee in wei; missing price is treated as zero.
    pub fn execution_fee(&self) -> U256 {
        U256::from(self.effective_gas_price.unwrap_or_default())
            .saturating_mul(U256::from(self.gas_used))
    }

    /// Blob fee component in wei; missing values are treated as zero.
    pub fn blob_fee(&self) -> U256 {
        U256::from(self.blob_gas_price.unwrap_or_default())
            .saturating_mul(U256::from(self.blob_gas_used.unwrap_or_default()))
    }

    pub fn total_fee(&self) -> U256 {
        self.execution_fee().saturating_add(self.blob_fee())
    }
}

/// Chain RPC capability consumed by the dispatch engine.
#[async_trait]
pub trait ChainEndpoint: Send + Sync {
    fn name(&self) -> &str;

    async fn chain_id(&self) -> Result<u64, AppError>;

    /// Suggested `(fee_cap, tip_cap)` in wei.
    async fn suggest_fees(&self) -> Result<(u128, u128), AppError>;

    /// Pending nonce for `address`.
    async fn nonce_of(&self, address: Address) -> Result<u64, AppError>;

    async fn balance_of(&self, address: Address) -> Result<U256, AppError>;

    async fn send_transaction(&self, tx: &SignedTransaction) -> Result<(), AppError>;

    /// Blocks until the transaction is mined. Errors mean the watch was lost,
    /// not that the transaction failed.
    async fn await_transaction(&self, tx: &SignedTransaction)
    -> Result<TxConfirmation, AppError>;

    async fn health_check(&self) -> Result<(), AppError>;
}

pub type SharedEndpoint = Arc<dyn ChainEndpoint>;

impl fmt::Debug for dyn ChainEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChainEndpoint")
            .field("name", &self.name())
            .finish()
    }
}
