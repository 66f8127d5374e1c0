// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@oxidity.com>

pub mod assembler;
pub mod context;
pub mod engine;
pub mod fees;
pub mod submit;
pub mod tracker;

pub use assembler::{TransactionAssembler, TxPayload};
pub use context::{AdmissionGate, AdmissionSlot, FatalSignal, RunContext, RunStats};
pub use engine::{DispatchLoop, DispatchOptions, RunSummary, pacing_exceeded};
pub use fees::{FeeEstimator, FeeQuote};
pub use submit::SubmissionPath;
pub use tracker::{ConfirmationTracker, PendingDispatch, TrackOutcome};
