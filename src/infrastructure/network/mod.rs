// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@oxidity.com>

pub mod endpoint;
pub mod gas;
pub mod pool;
pub mod provider;
pub mod relay;

pub use endpoint::{ChainEndpoint, SharedEndpoint, SignedTransaction, TxConfirmation};
pub use pool::{EndpointPool, HealthReport, SelectionMode};
