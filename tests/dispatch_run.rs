// SPDX-License-Identifier: MIT
// Drives full dispatch runs against in-memory endpoints: stop conditions,
// admission bounds, pacing, the fatal timeout and endpoint health.

mod common;

use chain_loadgen::domain::error::AppError;
use chain_loadgen::infrastructure::network::pool::SelectionMode;
use chain_loadgen::scenarios::EoaTransfer;
use chain_loadgen::services::dispatch::{
    DispatchLoop, DispatchOptions, FeeEstimator, SubmissionPath,
};
use common::{MockEndpoint, pool, registry, transfer_loop};
use alloy::primitives::U256;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

fn counted(total_count: u64) -> DispatchOptions {
    DispatchOptions {
        total_count,
        ..Default::default()
    }
}

#[tokio::test(start_paused = true)]
async fn count_run_sends_exactly_n_and_waits_for_confirmations() {
    let endpoint = Arc::new(MockEndpoint::new("a"));
    let summary = transfer_loop(&[endpoint.clone()], 4, counted(10))
        .run()
        .await
        .unwrap();

    assert_eq!(summary.dispatched, 10);
    assert_eq!(summary.submitted, 10);
    assert_eq!(summary.confirmed, 10);
    assert_eq!(summary.failed_dispatches, 0);
    assert_eq!(endpoint.send_count(), 10);
    assert_eq!(
        summary.fees_paid,
        U256::from(10u64 * 21_000 * 1_000_000_000)
    );
}

#[tokio::test(start_paused = true)]
async fn nonces_per_worker_are_gapless_and_unique() {
    let endpoint = Arc::new(MockEndpoint::new("a"));
    transfer_loop(&[endpoint.clone()], 3, counted(30))
        .run()
        .await
        .unwrap();

    let by_sender = endpoint.nonces_by_sender();
    assert_eq!(by_sender.len(), 3);
    for (_, mut nonces) in by_sender {
        nonces.sort_unstable();
        let expected: Vec<u64> = (0..nonces.len() as u64).collect();
        assert_eq!(nonces, expected);
    }
}

#[tokio::test(start_paused = true)]
async fn max_pending_bounds_outstanding_transactions() {
    let endpoint = Arc::new(MockEndpoint::new("a").confirm_after(Duration::from_millis(300)));
    let options = DispatchOptions {
        max_pending: 3,
        ..counted(20)
    };
    let summary = transfer_loop(&[endpoint.clone()], 5, options)
        .run()
        .await
        .unwrap();

    assert_eq!(summary.confirmed, 20);
    let peak = endpoint
        .max_outstanding
        .load(std::sync::atomic::Ordering::SeqCst);
    assert!(peak <= 3, "peak outstanding {peak} exceeded the gate");
    assert!(peak >= 1);
}

#[tokio::test(start_paused = true)]
async fn throughput_paces_admissions_per_slot() {
    let endpoint = Arc::new(MockEndpoint::new("a").confirm_after(Duration::from_secs(1)));
    let options = DispatchOptions {
        total_count: 12,
        throughput: 5,
        slot_duration: Duration::from_secs(12),
        ..Default::default()
    };
    let start = Instant::now();
    let summary = transfer_loop(&[endpoint.clone()], 10, options)
        .run()
        .await
        .unwrap();
    assert_eq!(summary.submitted, 12);

    let offsets: Vec<Duration> = endpoint
        .send_times()
        .into_iter()
        .map(|at| at - start)
        .collect();
    let before = |limit: u64| offsets.iter().filter(|d| **d < Duration::from_secs(limit)).count();
    assert_eq!(before(12), 5);
    assert_eq!(before(24), 10);
    assert_eq!(offsets.len(), 12);
}

#[tokio::test(start_paused = true)]
async fn confirmation_timeout_aborts_run_once() {
    let endpoint = Arc::new(MockEndpoint::new("stalled").never_confirming());
    let options = DispatchOptions {
        timeout: Some(Duration::from_secs(1)),
        ..counted(1)
    };
    let dispatch = transfer_loop(&[endpoint.clone()], 1, options);
    let ctx = dispatch.context();

    let err = dispatch.run_with(ctx.clone()).await.unwrap_err();

    assert!(matches!(
        err,
        AppError::ConfirmationTimeout { index: 1, timeout_secs: 1, .. }
    ));
    assert!(err.is_fatal());
    assert_eq!(ctx.fatal().raise_count(), 1);
    assert_eq!(endpoint.send_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn failed_sends_are_abandoned_and_replaced() {
    let endpoint = Arc::new(MockEndpoint::new("flaky").failing_first(3));
    let options = DispatchOptions {
        max_pending: 1,
        ..counted(5)
    };
    let summary = transfer_loop(&[endpoint.clone()], 2, options)
        .run()
        .await
        .unwrap();

    assert_eq!(summary.failed_dispatches, 3);
    assert_eq!(summary.submitted, 5);
    assert_eq!(summary.dispatched, 8);
    assert_eq!(endpoint.send_count(), 5);
}

#[tokio::test(start_paused = true)]
async fn unhealthy_endpoint_is_never_selected() {
    let endpoints: Vec<Arc<MockEndpoint>> = ["a", "b", "c"]
        .into_iter()
        .map(|n| Arc::new(MockEndpoint::new(n)))
        .collect();
    endpoints[1].set_healthy(false);
    let pool = pool(&endpoints);
    let report = pool.refresh_health().await.unwrap();
    assert_eq!(report.bad, vec!["b".to_string()]);

    let dispatch = DispatchLoop::new(
        pool,
        registry(2),
        Arc::new(EoaTransfer::new(None, U256::ZERO, false)),
        FeeEstimator::new(20, 2),
        SubmissionPath::Direct,
        DispatchOptions {
            endpoint_selection: SelectionMode::ByIndex,
            ..counted(6)
        },
    );
    dispatch.run().await.unwrap();

    assert_eq!(endpoints[0].send_count(), 3);
    assert_eq!(endpoints[1].send_count(), 0);
    assert_eq!(endpoints[2].send_count(), 3);
}

#[tokio::test]
async fn missing_stop_condition_is_rejected_before_dispatch() {
    let endpoint = Arc::new(MockEndpoint::new("a"));
    let err = transfer_loop(&[endpoint.clone()], 1, DispatchOptions::default())
        .run()
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Config(_)));
    assert_eq!(endpoint.send_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn throughput_only_run_stays_within_two_slots_of_budget() {
    let endpoint = Arc::new(MockEndpoint::new("a"));
    let options = DispatchOptions {
        throughput: 5,
        slot_duration: Duration::from_secs(12),
        ..Default::default()
    };
    let dispatch = transfer_loop(&[endpoint.clone()], 10, options);
    let ctx = dispatch.context();

    // Time spent before the run begins does not count against pacing.
    tokio::time::sleep(Duration::from_secs(60)).await;
    let start = Instant::now();
    let window = tokio::time::timeout(Duration::from_millis(23_900), dispatch.run_with(ctx.clone())).await;
    assert!(window.is_err(), "a throughput-only run has no natural end");

    assert_eq!(ctx.accounted(), 10);
    let offsets: Vec<Duration> = endpoint.send_times().into_iter().map(|at| at - start).collect();
    assert_eq!(offsets.len(), 10);
    assert_eq!(offsets.iter().filter(|d| **d < Duration::from_secs(12)).count(), 5);
    assert!(offsets.iter().all(|d| *d < Duration::from_secs(24)));
}

#[tokio::test(start_paused = true)]
async fn persistent_send_failure_aborts_the_run() {
    let endpoint = Arc::new(MockEndpoint::new("rejecting").failing_first(u64::MAX));
    let options = DispatchOptions {
        max_pending: 1,
        max_consecutive_failures: 25,
        ..counted(3)
    };
    let dispatch = transfer_loop(&[endpoint.clone()], 1, options);
    let ctx = dispatch.context();

    let err = tokio::time::timeout(Duration::from_secs(600), dispatch.run_with(ctx.clone()))
        .await
        .expect("run must end on its own")
        .unwrap_err();

    assert!(matches!(err, AppError::DispatchStalled { failures: 25, .. }));
    assert!(err.is_fatal());
    assert_eq!(endpoint.send_count(), 0);
    assert_eq!(ctx.snapshot().submitted, 0);
    assert_eq!(ctx.stats().failed_dispatches.load(std::sync::atomic::Ordering::Relaxed), 25);
}

#[tokio::test(start_paused = true)]
async fn submissions_between_failures_keep_the_run_alive() {
    let endpoint = Arc::new(MockEndpoint::new("flaky").failing_first(4));
    let options = DispatchOptions {
        max_pending: 1,
        max_consecutive_failures: 5,
        ..counted(6)
    };
    let summary = transfer_loop(&[endpoint.clone()], 2, options).run().await.unwrap();

    assert_eq!(summary.failed_dispatches, 4);
    assert_eq!(summary.submitted, 6);
}
