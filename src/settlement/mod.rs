// Copyright (C) 2025 Category Labs, Inc.
// SPDX-License-Identifier: GPL-3.0-or-later

//! Flash swap settlement: engine and callback entrypoint.

pub mod dispatcher;
pub mod engine;

pub use dispatcher::CallbackDispatcher;
pub use engine::{
    LoanRequest, PendingLoan, SettlementEngine, SettlementOutcome, SettlementState,
};
