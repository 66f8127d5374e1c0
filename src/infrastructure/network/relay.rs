// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@oxidity.com>

use crate::common::error::AppError;
use crate::common::parsing::normalize_rpc_url;
use crate::domain::constants::RELAY_TIMEOUT_MS;
use crate::infrastructure::network::endpoint::SignedTransaction;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{Value, json};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

const SUBMIT_METHOD: &str = "composer_submitRollupTransaction";

#[derive(Debug, Deserialize)]
struct RelayResponse {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<RelayErrorBody>,
}

#[derive(Debug, Deserialize)]
struct RelayErrorBody {
    code: i64,
    message: String,
}

/// Hands signed transactions to an external composer, which forwards them to
/// the destination rollup on its own path.
pub struct RelayClient {
    url: String,
    rollup_id: String,
    client: Client,
    request_id: AtomicU64,
}

impl RelayClient {
    pub fn new(address: &str, rollup_id: impl Into<String>) -> Result<Self, AppError> {
        let url = normalize_rpc_url(address);
        url::Url::parse(&url)
            .map_err(|e| AppError::Config(format!("Invalid relay address {address}: {e}")))?;
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .timeout(Duration::from_millis(RELAY_TIMEOUT_MS))
            .build()
            .map_err(|e| AppError::Initialization(format!("Relay client build failed: {e}")))?;
        Ok(Self {
            url,
            rollup_id: rollup_id.into(),
            client,
            request_id: AtomicU64::new(1),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn rollup_id(&self) -> &str {
        &self.rollup_id
    }

    fn request_body(&self, tx: &SignedTransaction) -> Value {
        json!({
            "jsonrpc": "2.0",
            "id": self.request_id.fetch_add(1, Ordering::Relaxed),
            "method": SUBMIT_METHOD,
            "params": [{
                "rollupId": self.rollup_id,
                "data": format!("0x{}", hex::encode(&tx.raw)),
            }]
        })
    }

    /// Single attempt; the caller decides what a failure means.
    pub async fn submit(&self, tx: &SignedTransaction) -> Result<(), AppError> {
        let payload = self.request_body(tx);
        let resp = self
            .client
            .post(&self.url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| AppError::Relay(format!("POST {} failed: {}", self.url, e)))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(AppError::Relay(format!(
                "{} returned {}: {}",
                self.url, status, body
            )));
        }

        let parsed: RelayResponse = resp
            .json()
            .await
            .map_err(|e| AppError::Relay(format!("Undecodable relay response: {e}")))?;
        if let Some(err) = parsed.error {
            return Err(AppError::Relay(format!(
                "rejected {:#x}: {} ({})",
                tx.hash, err.message, err.code
            )));
        }

        tracing::debug!(
            target: "relay",
            relay = %self.url,
            rollup = %self.rollup_id,
            hash = %format!("{:#x}", tx.hash),
            result = ?parsed.result,
            "Transaction handed to relay"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::consensus::TxEip1559;
    use alloy::primitives::{Address, B256, Bytes};

    fn dummy_tx() -> SignedTransaction {
        SignedTransaction {
            hash: B256::repeat_byte(0x42),
            from: Address::repeat_byte(0x01),
            raw: Bytes::from(vec![0x02, 0xf8, 0x6b]),
            tx: TxEip1559::default(),
        }
    }

    #[test]
    fn bare_address_gets_http_scheme() {
        let relay = RelayClient::new("localhost:50051", "astria").unwrap();
        assert_eq!(relay.url(), "http://localhost:50051");
        assert_eq!(relay.rollup_id(), "astria");
    }

    #[test]
    fn request_body_carries_rollup_and_raw_tx() {
        let relay = RelayClient::new("http://composer:50051", "rollup-7").unwrap();
        let first = relay.request_body(&dummy_tx());
        let second = relay.request_body(&dummy_tx());
        assert_eq!(first["method"], SUBMIT_METHOD);
        assert_eq!(first["params"][0]["rollupId"], "rollup-7");
        assert_eq!(first["params"][0]["data"], "0x02f86b");
        assert_ne!(first["id"], second["id"]);
    }

    #[tokio::test]
    async fn unreachable_relay_is_a_relay_error() {
        let relay = RelayClient::new("http://127.0.0.1:1", "rollup").unwrap();
        let err = relay.submit(&dummy_tx()).await.unwrap_err();
        assert!(matches!(err, AppError::Relay(_)));
    }
}
