// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@oxidity.com>

use crate::common::error::AppError;
use alloy::primitives::U256;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::time::{Duration, Instant};
use tokio_util::sync::{CancellationToken, WaitForCancellationFuture};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CounterSnapshot {
    pub next_index: u64,
    pub submitted: u64,
    pub in_flight: u64,
}

impl CounterSnapshot {
    /// Work the stop condition and pacing look at.
    pub fn accounted(&self) -> u64 {
        self.submitted + self.in_flight
    }
}

/// Bounds submitted-but-unconfirmed work. Unbounded when `max_pending` is 0.
#[derive(Debug)]
pub struct AdmissionGate {
    semaphore: Option<Arc<Semaphore>>,
    capacity: usize,
}

/// Held from dispatch start until the confirmation tracker exits.
#[derive(Debug)]
pub struct AdmissionSlot {
    _permit: Option<OwnedSemaphorePermit>,
}

impl AdmissionGate {
    pub fn new(max_pending: u64) -> Self {
        let capacity = usize::try_from(max_pending).unwrap_or(Semaphore::MAX_PERMITS);
        let capacity = capacity.min(Semaphore::MAX_PERMITS);
        Self {
            semaphore: (capacity > 0).then(|| Arc::new(Semaphore::new(capacity))),
            capacity,
        }
    }

    pub fn is_bounded(&self) -> bool {
        self.semaphore.is_some()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Free slots, or `None` when unbounded.
    pub fn available(&self) -> Option<usize> {
        self.semaphore.as_ref().map(|s| s.available_permits())
    }

    pub async fn acquire(&self) -> Result<AdmissionSlot, AppError> {
        let permit = match &self.semaphore {
            Some(semaphore) => Some(
                semaphore
                    .clone()
                    .acquire_owned()
                    .await
                    .map_err(|_| AppError::Initialization("Admission gate closed".into()))?,
            ),
            None => None,
        };
        Ok(AdmissionSlot { _permit: permit })
    }
}

/// Run-wide abort signal. The first raise wins; later raises are counted and
/// dropped.
#[derive(Debug, Default)]
pub struct FatalSignal {
    token: CancellationToken,
    error: Mutex<Option<AppError>>,
    raised: AtomicU64,
}

impl FatalSignal {
    pub fn raise(&self, err: AppError) {
        let prior = self.raised.fetch_add(1, Ordering::SeqCst);
        if prior == 0 {
            tracing::error!(target: "dispatch", error = %err, "Fatal condition, aborting run");
            *self.error.lock().unwrap_or_else(|e| e.into_inner()) = Some(err);
            self.token.cancel();
        } else {
            tracing::debug!(target: "dispatch", error = %err, "Fatal condition already raised");
        }
    }

    pub fn is_raised(&self) -> bool {
        self.token.is_cancelled()
    }

    /// How many times `raise` was called.
    pub fn raise_count(&self) -> u64 {
        self.raised.load(Ordering::SeqCst)
    }

    pub fn cancelled(&self) -> WaitForCancellationFuture<'_> {
        self.token.cancelled()
    }

    pub fn take(&self) -> Option<AppError> {
        self.error.lock().unwrap_or_else(|e| e.into_inner()).take()
    }
}

#[derive(Debug, Default)]
pub struct RunStats {
    pub failed_dispatches: AtomicU64,
    pub confirmed: AtomicU64,
    pub reverted: AtomicU64,
    pub watch_errors: AtomicU64,
    pub timeouts: AtomicU64,
    failure_streak: AtomicU64,
    fees_paid: Mutex<U256>,
}

impl RunStats {
    /// Counts a failed send and returns the current run of consecutive failures.
    pub fn record_failure(&self) -> u64 {
        self.failed_dispatches.fetch_add(1, Ordering::Relaxed);
        self.failure_streak.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub fn record_submission(&self) {
        self.failure_streak.store(0, Ordering::SeqCst);
    }

    pub fn failure_streak(&self) -> u64 {
        self.failure_streak.load(Ordering::SeqCst)
    }

    pub fn add_fee(&self, fee: U256) {
        let mut total = self.fees_paid.lock().unwrap_or_else(|e| e.into_inner());
        *total = total.saturating_add(fee);
    }

    pub fn fees_paid(&self) -> U256 {
        *self.fees_paid.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Shared state of one run, handed to every dispatch and tracker task.
#[derive(Debug)]
pub struct RunContext {
    counters: Mutex<CounterSnapshot>,
    started: Mutex<Instant>,
    gate: AdmissionGate,
    fatal: FatalSignal,
    stats: RunStats,
}

impl RunContext {
    pub fn new(max_pending: u64) -> Self {
        Self {
            counters: Mutex::new(CounterSnapshot::default()),
            started: Mutex::new(Instant::now()),
            gate: AdmissionGate::new(max_pending),
            fatal: FatalSignal::default(),
            stats: RunStats::default(),
        }
    }

    /// Assigns the next index and counts it as in flight, under one lock.
    pub fn begin_dispatch(&self) -> u64 {
        let mut counters = self.lock_counters();
        let index = counters.next_index;
        counters.next_index += 1;
        counters.in_flight += 1;
        index
    }

    /// Closes a dispatch started with `begin_dispatch`.
    pub fn finish_dispatch(&self, submitted: bool) {
        let mut counters = self.lock_counters();
        counters.in_flight = counters.in_flight.saturating_sub(1);
        if submitted {
            counters.submitted += 1;
        }
    }

    pub fn snapshot(&self) -> CounterSnapshot {
        *self.lock_counters()
    }

    pub fn accounted(&self) -> u64 {
        self.snapshot().accounted()
    }

    /// Restarts the pacing clock. Called when admissions begin.
    pub fn mark_started(&self) {
        *self.started.lock().unwrap_or_else(|e| e.into_inner()) = Instant::now();
    }

    pub fn elapsed(&self) -> Duration {
        self.started.lock().unwrap_or_else(|e| e.into_inner()).elapsed()
    }

    pub fn gate(&self) -> &AdmissionGate {
        &self.gate
    }

    pub fn fatal(&self) -> &FatalSignal {
        &self.fatal
    }

    pub fn stats(&self) -> &RunStats {
        &self.stats
    }

    fn lock_counters(&self) -> MutexGuard<'_, CounterSnapshot> {
        self.counters.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn indices_are_monotonic_and_accounting_moves_together() {
        let ctx = RunContext::new(0);
        assert_eq!(ctx.begin_dispatch(), 0);
        assert_eq!(ctx.begin_dispatch(), 1);
        assert_eq!(ctx.accounted(), 2);

        ctx.finish_dispatch(false);
        assert_eq!(ctx.accounted(), 1);
        ctx.finish_dispatch(true);

        let snap = ctx.snapshot();
        assert_eq!(snap.submitted, 1);
        assert_eq!(snap.in_flight, 0);
        assert_eq!(ctx.begin_dispatch(), 2);
    }

    #[tokio::test]
    async fn bounded_gate_blocks_until_slot_dropped() {
        let gate = AdmissionGate::new(2);
        let a = gate.acquire().await.unwrap();
        let _b = gate.acquire().await.unwrap();
        assert_eq!(gate.available(), Some(0));

        let blocked =
            tokio::time::timeout(Duration::from_millis(20), gate.acquire()).await;
        assert!(blocked.is_err());

        drop(a);
        let _c = gate.acquire().await.unwrap();
        assert_eq!(gate.available(), Some(0));
    }

    #[tokio::test]
    async fn unbounded_gate_never_blocks() {
        let gate = AdmissionGate::new(0);
        assert!(!gate.is_bounded());
        let slots: Vec<_> = futures::future::join_all((0..64).map(|_| gate.acquire())).await;
        assert!(slots.iter().all(|s| s.is_ok()));
        assert_eq!(gate.available(), None);
    }

    #[test]
    fn first_fatal_raise_wins() {
        let signal = FatalSignal::default();
        signal.raise(AppError::ConfirmationTimeout {
            index: 3,
            hash: "0x03".into(),
            timeout_secs: 1,
        });
        signal.raise(AppError::Connection("late".into()));

        assert!(signal.is_raised());
        assert_eq!(signal.raise_count(), 2);
        assert!(matches!(
            signal.take(),
            Some(AppError::ConfirmationTimeout { index: 3, .. })
        ));
        assert!(signal.take().is_none());
    }

    #[test]
    fn fees_accumulate() {
        let stats = RunStats::default();
        stats.add_fee(U256::from(5u64));
        stats.add_fee(U256::from(7u64));
        assert_eq!(stats.fees_paid(), U256::from(12u64));
    }

    #[test]
    fn submission_resets_failure_streak() {
        let stats = RunStats::default();
        assert_eq!(stats.record_failure(), 1);
        assert_eq!(stats.record_failure(), 2);
        stats.record_submission();
        assert_eq!(stats.failure_streak(), 0);
        assert_eq!(stats.record_failure(), 1);
        assert_eq!(stats.failed_dispatches.load(Ordering::Relaxed), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn pacing_clock_restarts_when_marked() {
        let ctx = RunContext::new(0);
        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(ctx.elapsed(), Duration::from_secs(30));

        ctx.mark_started();
        assert_eq!(ctx.elapsed(), Duration::ZERO);
    }
}
