// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@on1.no>

use crate::common::error::AppError;
use crate::common::retry::retry_async;
use crate::domain::constants::RECEIPT_MAX_CONSECUTIVE_ERRORS;
use crate::infrastructure::network::endpoint::{ChainEndpoint, SignedTransaction, TxConfirmation};
use crate::infrastructure::network::gas;
use alloy::network::Ethereum;
use alloy::primitives::{Address, U256};
use alloy::providers::{Provider, RootProvider};
use async_trait::async_trait;
use std::time::Duration;
use url::Url;

pub type HttpProvider = RootProvider<Ethereum>;

pub struct ConnectionFactory;

impl ConnectionFactory {
    pub fn http(rpc_url: &str) -> Result<HttpProvider, AppError> {
        let url =
            Url::parse(rpc_url).map_err(|e| AppError::Config(format!("Invalid RPC URL: {}", e)))?;

        let provider = RootProvider::new_http(url);
        Ok(provider)
    }
}

/// A JSON-RPC endpoint reached over HTTP.
pub struct RpcEndpoint {
    name: String,
    url: String,
    provider: HttpProvider,
    receipt_poll: Duration,
}

impl RpcEndpoint {
    pub fn connect(name: impl Into<String>, url: &str, receipt_poll: Duration) -> Result<Self, AppError> {
        let provider = ConnectionFactory::http(url)?;
        Ok(Self {
            name: name.into(),
            url: url.to_string(),
            provider,
            receipt_poll: receipt_poll.max(Duration::from_millis(100)),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Builds one endpoint per configured URL, named by host (with index on collisions).
    pub fn from_urls(urls: &[String], receipt_poll: Duration) -> Result<Vec<Self>, AppError> {
        let mut out = Vec::with_capacity(urls.len());
        for (idx, raw) in urls.iter().enumerate() {
            let parsed = Url::parse(raw)
                .map_err(|e| AppError::Config(format!("Invalid RPC URL {raw}: {e}")))?;
            let host = parsed.host_str().unwrap_or("rpc").to_string();
            let name = if urls.len() > 1 {
                format!("{}-{}", host, idx + 1)
            } else {
                host
            };
            out.push(Self::connect(name, raw, receipt_poll)?);
        }
        Ok(out)
    }
}

#[async_trait]
impl ChainEndpoint for RpcEndpoint {
    fn name(&self) -> &str {
        &self.name
    }

    async fn chain_id(&self) -> Result<u64, AppError> {
        let provider = self.provider.clone();
        retry_async(
            "eth_chainId",
            move |_| {
                let provider = provider.clone();
                async move { provider.get_chain_id().await }
            },
            3,
            Duration::from_millis(100),
        )
        .await
        .map_err(|e| AppError::Connection(format!("{}: chain_id failed: {}", self.name, e)))
    }

    async fn suggest_fees(&self) -> Result<(u128, u128), AppError> {
        let fees = gas::suggest_fees(&self.provider).await?;
        Ok((fees.max_fee_per_gas, fees.max_priority_fee_per_gas))
    }

    async fn nonce_of(&self, address: Address) -> Result<u64, AppError> {
        let provider = self.provider.clone();
        retry_async(
            "eth_getTransactionCount",
            move |_| {
                let provider = provider.clone();
                async move { provider.get_transaction_count(address).pending().await }
            },
            3,
            Duration::from_millis(100),
        )
        .await
        .map_err(|e| AppError::Connection(format!("Failed to fetch nonce for {address}: {e}")))
    }

    async fn balance_of(&self, address: Address) -> Result<U256, AppError> {
        let provider = self.provider.clone();
        retry_async(
            "eth_getBalance",
            move |_| {
                let provider = provider.clone();
                async move { provider.get_balance(address).await }
            },
            3,
            Duration::from_millis(100),
        )
        .await
        .map_err(|e| AppError::Connection(format!("Failed to fetch balance for {address}: {e}")))
    }

    async fn send_transaction(&self, tx: &SignedTransaction) -> Result<(), AppError> {
        self.provider
            .send_raw_transaction(&tx.raw)
            .await
            .map(|_| ())
            .map_err(|e| AppError::Transaction {
                hash: format!("{:#x}", tx.hash),
                reason: format!("{} rejected tx: {}", self.name, e),
            })
    }

    async fn await_transaction(
        &self,
        tx: &SignedTransaction,
    ) -> Result<TxConfirmation, AppError> {
        let mut consecutive_errors = 0u32;
        loop {
            match self.provider.get_transaction_receipt(tx.hash).await {
                Ok(Some(receipt)) => {
                    return Ok(TxConfirmation {
                        block_number: receipt.block_number.unwrap_or_default(),
                        success: receipt.status(),
                        gas_used: receipt.gas_used,
                        effective_gas_price: Some(receipt.effective_gas_price),
                        blob_gas_used: receipt.blob_gas_used,
                        blob_gas_price: receipt.blob_gas_price,
                    });
                }
                Ok(None) => consecutive_errors = 0,
                Err(e) => {
                    consecutive_errors += 1;
                    if consecutive_errors >= RECEIPT_MAX_CONSECUTIVE_ERRORS {
                        return Err(AppError::Connection(format!(
                            "{}: receipt lookup for {:#x} failed {} times: {}",
                            self.name, tx.hash, consecutive_errors, e
                        )));
                    }
                    tracing::debug!(
                        target: "rpc",
                        rpc = %self.name,
                        hash = %format!("{:#x}", tx.hash),
                        error = %e,
                        "Receipt lookup error; retrying"
                    );
                }
            }
            tokio::time::sleep(self.receipt_poll).await;
        }
    }

    async fn health_check(&self) -> Result<(), AppError> {
        self.provider
            .get_block_number()
            .await
            .map(|_| ())
            .map_err(|e| AppError::Connection(format!("{}: eth_blockNumber failed: {}", self.name, e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_url_is_a_config_error() {
        let err = ConnectionFactory::http("not a url").unwrap_err();
        assert!(matches!(err, AppError::Config(_)));
    }

    #[test]
    fn endpoints_are_named_by_host() {
        let urls = vec![
            "http://node-a.local:8545".to_string(),
            "http://node-b.local:8545".to_string(),
        ];
        let endpoints = RpcEndpoint::from_urls(&urls, Duration::from_millis(500)).unwrap();
        assert_eq!(endpoints[0].name(), "node-a.local-1");
        assert_eq!(endpoints[1].name(), "node-b.local-2");
        assert_eq!(endpoints[1].url(), "http://node-b.local:8545");

        let single =
            RpcEndpoint::from_urls(&urls[..1], Duration::from_millis(500)).unwrap();
        assert_eq!(single[0].name(), "node-a.local");
    }
}
