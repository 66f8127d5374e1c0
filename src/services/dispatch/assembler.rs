// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@mitander.dev>

use crate::common::error::AppError;
use crate::domain::constants::TRANSFER_GAS_LIMIT;
use crate::infrastructure::network::endpoint::SignedTransaction;
use crate::services::dispatch::fees::FeeQuote;
use crate::services::wallet::account::Account;
use alloy::consensus::{SignableTransaction, TxEip1559, TxEnvelope};
use alloy::eips::eip2718::Encodable2718;
use alloy::eips::eip2930::AccessList;
use alloy::network::TxSignerSync;
use alloy::primitives::{Address, Bytes, TxKind, U256};

/// What a scenario wants sent; the engine never looks inside.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxPayload {
    pub to: TxKind,
    pub value: U256,
    pub gas_limit: u64,
    pub input: Bytes,
}

impl TxPayload {
    pub fn call(to: Address, value: U256, gas_limit: u64, input: Bytes) -> Self {
        Self {
            to: TxKind::Call(to),
            value,
            gas_limit,
            input,
        }
    }

    pub fn transfer(to: Address, value: U256) -> Self {
        Self::call(to, value, TRANSFER_GAS_LIMIT, Bytes::new())
    }

    /// Upper bound on what sending this payload can cost at `fee_cap`.
    pub fn max_cost(&self, fee_cap: u128) -> U256 {
        U256::from(fee_cap)
            .saturating_mul(U256::from(self.gas_limit))
            .saturating_add(self.value)
    }
}

/// Builds and signs dynamic-fee transactions from a payload, a reserved nonce
/// and a fee quote.
#[derive(Debug, Clone, Copy, Default)]
pub struct TransactionAssembler;

impl TransactionAssembler {
    pub fn new() -> Self {
        Self
    }

    pub fn assemble(
        &self,
        account: &Account,
        payload: TxPayload,
        quote: FeeQuote,
    ) -> Result<SignedTransaction, AppError> {
        if payload.gas_limit == 0 {
            return Err(AppError::Payload("Payload gas limit is zero".into()));
        }
        let nonce = account.reserve_nonce();
        let mut tx = TxEip1559 {
            chain_id: account.chain_id(),
            nonce,
            gas_limit: payload.gas_limit,
            max_fee_per_gas: quote.fee_cap,
            max_priority_fee_per_gas: quote.tip_cap,
            to: payload.to,
            value: payload.value,
            access_list: AccessList::default(),
            input: payload.input,
        };

        let sig = TxSignerSync::sign_transaction_sync(account.signer(), &mut tx)
            .map_err(|e| AppError::Signing(format!("Sign tx failed: {}", e)))?;
        let signed: TxEnvelope = tx.clone().into_signed(sig).into();
        let raw = signed.encoded_2718();
        Ok(SignedTransaction {
            hash: *signed.tx_hash(),
            from: account.address(),
            raw: raw.into(),
            tx,
        })
    }
}
