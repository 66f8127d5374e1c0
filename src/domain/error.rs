// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@oxidity.com>

use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Initialization failed: {0}")]
    Initialization(String),

    #[error("Connection failed to endpoint: {0}")]
    Connection(String),

    #[error("No worker accounts configured")]
    NoAccounts,

    #[error("No healthy endpoints available ({total} configured)")]
    NoHealthyEndpoints { total: usize },

    #[error("Payload construction failed: {0}")]
    Payload(String),

    #[error("Signing failed: {0}")]
    Signing(String),

    #[error("Relay submission failed: {0}")]
    Relay(String),

    #[error("Transaction failed: {hash:?}, reason: {reason}")]
    Transaction { hash: String, reason: String },

    #[error("Insufficient funds. Required: {required}, Available: {available}")]
    InsufficientFunds { required: String, available: String },

    #[error("Confirmation timeout for tx #{index} ({hash}) after {timeout_secs}s")]
    ConfirmationTimeout {
        index: u64,
        hash: String,
        timeout_secs: u64,
    },

    #[error("Dispatch stalled after {failures} consecutive failed sends, last: {last_error}")]
    DispatchStalled { failures: u64, last_error: String },
}

impl AppError {
    /// Errors that abort the whole run rather than a single dispatch.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            AppError::ConfirmationTimeout { .. }
                | AppError::DispatchStalled { .. }
                | AppError::Config(_)
                | AppError::NoAccounts
        )
    }
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::Config(err.to_string())
    }
}
