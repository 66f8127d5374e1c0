// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@oxidity.com>

use crate::common::error::AppError;
use crate::domain::constants::HEALTH_CHECK_TIMEOUT;
use crate::infrastructure::network::endpoint::SharedEndpoint;
use futures::future::join_all;
use rand::Rng;
use serde::{Deserialize, Deserializer};
use std::fmt;
use std::str::FromStr;
use std::sync::Mutex;
use std::time::Duration;

/// How an endpoint or worker account is picked for a dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SelectionMode {
    /// `key mod len`; deterministic for a fixed pool.
    #[default]
    ByIndex,
    Random,
    RoundRobin,
}

impl FromStr for SelectionMode {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "index" | "by-index" | "byindex" => Ok(Self::ByIndex),
            "random" => Ok(Self::Random),
            "round-robin" | "roundrobin" | "rr" => Ok(Self::RoundRobin),
            other => Err(AppError::Config(format!("Unknown selection mode: {other}"))),
        }
    }
}

impl<'de> Deserialize<'de> for SelectionMode {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

impl fmt::Display for SelectionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::ByIndex => "index",
            Self::Random => "random",
            Self::RoundRobin => "round-robin",
        })
    }
}

/// Resolves a position in a collection of `len` items. Shared by the endpoint
/// pool and the account registry so both cycle identically.
pub(crate) fn pick_index(mode: SelectionMode, key: u64, len: usize, cursor: &mut usize) -> usize {
    match mode {
        SelectionMode::ByIndex => (key % len as u64) as usize,
        SelectionMode::Random => rand::rng().random_range(0..len),
        SelectionMode::RoundRobin => {
            if *cursor >= len {
                *cursor = 0;
            }
            let picked = *cursor;
            *cursor += 1;
            if *cursor >= len {
                *cursor = 0;
            }
            picked
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HealthReport {
    pub good: Vec<String>,
    pub bad: Vec<String>,
}

struct Selection {
    good: Vec<SharedEndpoint>,
    rr_cursor: usize,
}

/// All configured endpoints plus the subset that passed the last health check.
pub struct EndpointPool {
    all: Vec<SharedEndpoint>,
    selection: Mutex<Selection>,
    check_timeout: Duration,
}

impl EndpointPool {
    /// Every endpoint starts out good; the first `refresh_health` prunes it.
    pub fn new(endpoints: Vec<SharedEndpoint>) -> Result<Self, AppError> {
        if endpoints.is_empty() {
            return Err(AppError::Config("No RPC endpoints configured".into()));
        }
        Ok(Self {
            selection: Mutex::new(Selection {
                good: endpoints.clone(),
                rr_cursor: 0,
            }),
            all: endpoints,
            check_timeout: HEALTH_CHECK_TIMEOUT,
        })
    }

    /// Checks still unanswered after `timeout` mark their endpoint bad.
    pub fn with_check_timeout(mut self, timeout: Duration) -> Self {
        self.check_timeout = timeout;
        self
    }

    pub fn len(&self) -> usize {
        self.all.len()
    }

    pub fn is_empty(&self) -> bool {
        self.all.is_empty()
    }

    pub fn good_count(&self) -> usize {
        self.lock_selection().good.len()
    }

    pub fn good_names(&self) -> Vec<String> {
        self.lock_selection()
            .good
            .iter()
            .map(|e| e.name().to_string())
            .collect()
    }

    pub fn select(&self, mode: SelectionMode, key: u64) -> Result<SharedEndpoint, AppError> {
        let mut guard = self.lock_selection();
        let len = guard.good.len();
        if len == 0 {
            return Err(AppError::NoHealthyEndpoints {
                total: self.all.len(),
            });
        }
        let idx = pick_index(mode, key, len, &mut guard.rr_cursor);
        Ok(guard.good[idx].clone())
    }

    /// Checks every configured endpoint and swaps in the new good set.
    /// Fails when no endpoint is healthy, leaving selection to fail loudly too.
    pub async fn refresh_health(&self) -> Result<HealthReport, AppError> {
        let limit = self.check_timeout;
        let checks = join_all(self.all.iter().map(|endpoint| async move {
            let result = match tokio::time::timeout(limit, endpoint.health_check()).await {
                Ok(result) => result,
                Err(_) => Err(AppError::Connection(format!(
                    "{}: health check timed out after {}ms",
                    endpoint.name(),
                    limit.as_millis()
                ))),
            };
            (endpoint.clone(), result)
        }))
        .await;

        let mut good = Vec::with_capacity(checks.len());
        let mut report = HealthReport::default();
        for (endpoint, result) in checks {
            match result {
                Ok(()) => {
                    report.good.push(endpoint.name().to_string());
                    good.push(endpoint);
                }
                Err(e) => {
                    tracing::warn!(target: "pool", rpc = %endpoint.name(), error = %e, "Endpoint marked bad");
                    report.bad.push(endpoint.name().to_string());
                }
            }
        }

        {
            let mut guard = self.lock_selection();
            guard.good = good;
            if guard.rr_cursor >= guard.good.len() {
                guard.rr_cursor = 0;
            }
        }

        tracing::info!(
            target: "pool",
            good = report.good.len(),
            bad = report.bad.len(),
            "Endpoint health refreshed"
        );

        if report.good.is_empty() {
            return Err(AppError::NoHealthyEndpoints {
                total: self.all.len(),
            });
        }
        Ok(report)
    }

    fn lock_selection(&self) -> std::sync::MutexGuard<'_, Selection> {
        self.selection.lock().unwrap_or_else(|e| e.into_inner())
    }
}
