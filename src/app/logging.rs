// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@mitander.dev>

use crate::domain::error::AppError;
use std::str::FromStr;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

const QUIET_MODULES: &[&str] = &[
    "h2=info",
    "hyper=info",
    "hyper_util=info",
    "reqwest=info",
    "rustls=info",
    "alloy_transport_http=info",
    "alloy_rpc_client=info",
];

/// A bare level (e.g. "debug") gets transport crates pinned to info so the run
/// log stays readable; anything with ',' or '=' is taken as a full directive.
pub fn filter_spec(log_level: &str) -> String {
    let normalized = log_level.trim();
    let normalized = if normalized.is_empty() { "info" } else { normalized };
    if normalized.contains(',') || normalized.contains('=') {
        normalized.to_string()
    } else {
        std::iter::once(normalized)
            .chain(QUIET_MODULES.iter().copied())
            .collect::<Vec<_>>()
            .join(",")
    }
}

/// `--debug` wins over the configured level.
pub fn effective_level(configured: &str, debug: bool) -> &str {
    if debug { "debug" } else { configured }
}

pub fn setup_logging(log_level: &str, json_format: bool) -> Result<(), AppError> {
    let spec = filter_spec(log_level);
    let filter = EnvFilter::from_str(&spec)
        .map_err(|e| AppError::Config(format!("Invalid log filter '{spec}': {e}")))?;
    let subscriber = tracing_subscriber::registry().with(filter);

    let installed = if json_format {
        let json_layer = fmt::layer()
            .json()
            .with_target(true)
            .with_current_span(false);
        subscriber.with(json_layer).try_init()
    } else {
        let fmt_layer = fmt::layer()
            .with_target(true)
            .with_thread_ids(false)
            .compact();
        subscriber.with(fmt_layer).try_init()
    };
    installed.map_err(|e| AppError::Initialization(format!("Logger already set: {e}")))?;

    tracing::info!(
        target: "config",
        filter = %spec,
        format = if json_format { "json" } else { "compact" },
        "Logging initialized"
    );
    Ok(())
}
