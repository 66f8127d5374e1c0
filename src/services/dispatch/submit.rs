// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@mitander.dev>

use crate::common::error::AppError;
use crate::infrastructure::network::endpoint::{ChainEndpoint, SignedTransaction};
use crate::infrastructure::network::relay::RelayClient;
use std::sync::Arc;

/// Where signed transactions go. Exactly one path per run; there is no
/// fallback from one to the other.
#[derive(Clone)]
pub enum SubmissionPath {
    Direct,
    Relay(Arc<RelayClient>),
}

impl SubmissionPath {
    pub fn label(&self) -> &'static str {
        match self {
            SubmissionPath::Direct => "direct",
            SubmissionPath::Relay(_) => "relay",
        }
    }

    pub async fn submit(
        &self,
        tx: &SignedTransaction,
        endpoint: &dyn ChainEndpoint,
    ) -> Result<(), AppError> {
        match self {
            SubmissionPath::Direct => endpoint.send_transaction(tx).await,
            SubmissionPath::Relay(relay) => relay.submit(tx).await,
        }
    }
}

impl std::fmt::Debug for SubmissionPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SubmissionPath::Direct => f.write_str("Direct"),
            SubmissionPath::Relay(relay) => f
                .debug_struct("Relay")
                .field("url", &relay.url())
                .field("rollup_id", &relay.rollup_id())
                .finish(),
        }
    }
}
