// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@mitander.dev>

use crate::common::error::AppError;
use crate::domain::constants::{
    HEALTH_CHECK_INTERVAL, HEALTH_CHECK_RETRY_INTERVAL, RESUPPLY_INTERVAL, RESUPPLY_RETRY_INTERVAL,
};
use crate::infrastructure::network::pool::EndpointPool;
use crate::services::wallet::funding::Funder;
use std::future::Future;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio::time::{Duration, sleep};
use tokio_util::sync::CancellationToken;

/// Cadence of a background loop: `every` after a good cycle, `retry` after a bad one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Schedule {
    pub every: Duration,
    pub retry: Duration,
}

impl Schedule {
    pub fn health() -> Self {
        Self {
            every: HEALTH_CHECK_INTERVAL,
            retry: HEALTH_CHECK_RETRY_INTERVAL,
        }
    }

    pub fn resupply() -> Self {
        Self {
            every: RESUPPLY_INTERVAL,
            retry: RESUPPLY_RETRY_INTERVAL,
        }
    }
}

/// Sleeps, runs `cycle`, and picks the next delay from its outcome until
/// `shutdown` fires.
pub async fn run_periodic<F, Fut>(
    name: &'static str,
    schedule: Schedule,
    shutdown: CancellationToken,
    mut cycle: F,
) where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<(), AppError>>,
{
    let mut delay = schedule.every;
    loop {
        tokio::select! {
            _ = shutdown.cancelled() => {
                tracing::debug!(target: "maintenance", task = name, "Shutdown requested");
                return;
            }
            _ = sleep(delay) => {}
        }
        delay = match cycle().await {
            Ok(()) => schedule.every,
            Err(e) => {
                tracing::warn!(
                    target: "maintenance",
                    task = name,
                    error = %e,
                    retry_in_secs = schedule.retry.as_secs(),
                    "Cycle failed"
                );
                schedule.retry
            }
        };
    }
}

pub fn spawn_health_loop(
    pool: Arc<EndpointPool>,
    schedule: Schedule,
    shutdown: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(run_periodic("health", schedule, shutdown, move || {
        let pool = pool.clone();
        async move { pool.refresh_health().await.map(|_| ()) }
    }))
}

pub fn spawn_resupply_loop(
    funder: Arc<Funder>,
    schedule: Schedule,
    shutdown: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(run_periodic("resupply", schedule, shutdown, move || {
        let funder = funder.clone();
        async move { funder.top_up_workers().await.map(|_| ()) }
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::network::endpoint::{
        ChainEndpoint, SharedEndpoint, SignedTransaction, TxConfirmation,
    };
    use crate::infrastructure::network::pool::SelectionMode;
    use alloy::primitives::{Address, U256};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Mutex;
    use tokio::time::Instant;

    fn schedule() -> Schedule {
        Schedule {
            every: Duration::from_secs(120),
            retry: Duration::from_secs(10),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn failed_cycle_backs_off_then_restores_interval() {
        let start = Instant::now();
        let calls = Arc::new(Mutex::new(Vec::new()));
        let shutdown = CancellationToken::new();
        let seen = calls.clone();
        let handle = tokio::spawn(run_periodic("test", schedule(), shutdown.clone(), move || {
            let seen = seen.clone();
            async move {
                let mut seen = seen.lock().unwrap();
                seen.push(start.elapsed().as_secs());
                if seen.len() == 1 {
                    Err(AppError::Connection("down".into()))
                } else {
                    Ok(())
                }
            }
        }));

        sleep(Duration::from_secs(300)).await;
        shutdown.cancel();
        handle.await.unwrap();

        assert_eq!(*calls.lock().unwrap(), vec![120, 130, 250]);
    }

    struct Flaky {
        name: &'static str,
        healthy: AtomicBool,
        checks: AtomicUsize,
    }

    #[async_trait]
    impl ChainEndpoint for Flaky {
        fn name(&self) -> &str {
            self.name
        }
        async fn chain_id(&self) -> Result<u64, AppError> {
            Ok(1)
        }
        async fn suggest_fees(&self) -> Result<(u128, u128), AppError> {
            Ok((0, 0))
        }
        async fn nonce_of(&self, _: Address) -> Result<u64, AppError> {
            Ok(0)
        }
        async fn balance_of(&self, _: Address) -> Result<U256, AppError> {
            Ok(U256::ZERO)
        }
        async fn send_transaction(&self, _: &SignedTransaction) -> Result<(), AppError> {
            Ok(())
        }
        async fn await_transaction(
            &self,
            _: &SignedTransaction,
        ) -> Result<TxConfirmation, AppError> {
            Ok(TxConfirmation::default())
        }
        async fn health_check(&self) -> Result<(), AppError> {
            self.checks.fetch_add(1, Ordering::Relaxed);
            if self.healthy.load(Ordering::Relaxed) {
                Ok(())
            } else {
                Err(AppError::Connection(format!("{} down", self.name)))
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn health_loop_prunes_and_restores_endpoints() {
        let flaky = Arc::new(Flaky {
            name: "flaky",
            healthy: AtomicBool::new(false),
            checks: AtomicUsize::new(0),
        });
        let steady = Arc::new(Flaky {
            name: "steady",
            healthy: AtomicBool::new(true),
            checks: AtomicUsize::new(0),
        });
        let endpoints: Vec<SharedEndpoint> = vec![flaky.clone(), steady.clone()];
        let pool = Arc::new(EndpointPool::new(endpoints).unwrap());
        let shutdown = CancellationToken::new();
        let handle = spawn_health_loop(pool.clone(), schedule(), shutdown.clone());

        sleep(Duration::from_secs(121)).await;
        assert_eq!(pool.good_names(), vec!["steady".to_string()]);
        for key in 0..4 {
            assert_eq!(pool.select(SelectionMode::ByIndex, key).unwrap().name(), "steady");
        }

        flaky.healthy.store(true, Ordering::Relaxed);
        sleep(Duration::from_secs(120)).await;
        assert_eq!(pool.good_count(), 2);
        assert_eq!(steady.checks.load(Ordering::Relaxed), 2);

        shutdown.cancel();
        handle.await.unwrap();
    }
}
