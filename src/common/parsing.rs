// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@mitander.dev>

use alloy::primitives::U256;
use alloy::primitives::utils::parse_units;

/// Parses an amount such as `"1.5"`, `"1.5eth"`, `"20 gwei"` or `"1000wei"` into wei.
/// A bare number is read as ether.
pub fn parse_ether_amount(raw: &str) -> Option<U256> {
    let normalized = raw.trim().to_ascii_lowercase();
    if normalized.is_empty() {
        return None;
    }
    let (number, unit) = if let Some(n) = normalized.strip_suffix("gwei") {
        (n, "gwei")
    } else if let Some(n) = normalized.strip_suffix("wei") {
        (n, "wei")
    } else if let Some(n) = normalized.strip_suffix("ether") {
        (n, "ether")
    } else if let Some(n) = normalized.strip_suffix("eth") {
        (n, "ether")
    } else {
        (normalized.as_str(), "ether")
    };
    let number = number.trim();
    if number.is_empty() || number.starts_with('-') {
        return None;
    }
    parse_units(number, unit).ok().map(Into::into)
}

/// Accepts `host:port` as well as full URLs; bare addresses get an `http://` scheme.
pub fn normalize_rpc_url(raw: &str) -> String {
    let trimmed = raw.trim().trim_end_matches('/');
    if trimmed.contains("://") {
        trimmed.to_string()
    } else {
        format!("http://{trimmed}")
    }
}

pub fn format_gwei(wei: u128) -> String {
    let whole = wei / 1_000_000_000;
    let frac = wei % 1_000_000_000;
    if frac == 0 {
        whole.to_string()
    } else {
        let frac = format!("{frac:09}");
        format!("{whole}.{}", frac.trim_end_matches('0'))
    }
}
