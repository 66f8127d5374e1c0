// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@on1.no>

pub mod dispatch;
pub mod maintenance;
pub mod metrics;
pub mod wallet;
