// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@oxidity.com>

use std::time::Duration;

// =============================================================================
// UNITS
// =============================================================================

pub const WEI_PER_GWEI: u128 = 1_000_000_000;

/// Protocol floor applied to both fee cap and tip cap.
pub const MIN_FEE_WEI: u128 = WEI_PER_GWEI;

// =============================================================================
// GAS & TRANSACTION CONSTANTS
// =============================================================================

pub const TRANSFER_GAS_LIMIT: u64 = 21_000;
pub const DEFAULT_GAS_BURN_UNITS: u64 = 2_000_000;
/// Intrinsic cost plus call overhead on top of the burned units.
pub const GAS_BURNER_OVERHEAD: u64 = 50_000;

// =============================================================================
// DISPATCH
// =============================================================================

/// Seconds per slot on the reference chain; denominator for throughput pacing.
pub const SECONDS_PER_SLOT: u64 = 12;
pub const PACING_POLL_INTERVAL: Duration = Duration::from_millis(100);
pub const DEFAULT_TX_TIMEOUT_SECS: u64 = 120;
/// Failed sends in a row, with no submission between them, before a run is aborted.
pub const MAX_CONSECUTIVE_DISPATCH_FAILURES: u64 = 100;

/// Upper bound on derived worker wallets when `max_wallets` is not set.
pub const MAX_DERIVED_WALLETS: u64 = 1_000;
/// Wallets derived per unit of throughput when only throughput is configured.
pub const WALLETS_PER_THROUGHPUT: u64 = 10;

// =============================================================================
// MAINTENANCE LOOPS
// =============================================================================

pub const HEALTH_CHECK_INTERVAL: Duration = Duration::from_secs(2 * 60);
pub const HEALTH_CHECK_RETRY_INTERVAL: Duration = Duration::from_secs(10);
pub const RESUPPLY_INTERVAL: Duration = Duration::from_secs(10 * 60);
pub const RESUPPLY_RETRY_INTERVAL: Duration = Duration::from_secs(60);

/// Concurrent funding transfers during initial prefunding.
pub const FUNDING_CONCURRENCY: usize = 16;
pub const FUNDING_CONFIRM_TIMEOUT: Duration = Duration::from_secs(120);

// =============================================================================
// RPC
// =============================================================================

pub const RECEIPT_POLL_MS: u64 = 1_000;
/// Health checks that have not answered by then count as bad.
pub const HEALTH_CHECK_TIMEOUT: Duration = Duration::from_secs(5);
/// Consecutive receipt lookup failures tolerated before the watch is abandoned.
pub const RECEIPT_MAX_CONSECUTIVE_ERRORS: u32 = 5;
pub const FEE_HISTORY_BLOCKS: u64 = 5;
pub const RELAY_TIMEOUT_MS: u64 = 5_000;
