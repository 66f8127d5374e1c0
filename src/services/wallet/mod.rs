// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@on1.no>

pub mod account;
pub mod funding;
pub mod registry;

pub use account::{Account, derive_worker_signer};
pub use funding::{Funder, FundingPlan, prepare_funding};
pub use registry::AccountRegistry;
