// Copyright (C) 2025 Category Labs, Inc.
// SPDX-License-Identifier: GPL-3.0-or-later

//! Flash loan arbitrage settlement.
//!
//! Borrow from a concentrated-liquidity pool, run a round-trip route across
//! two other pools inside the loan callback, then repay principal plus fee or
//! revert the whole call chain.

pub mod arbitrage;
pub mod config;
pub mod error;
pub mod gateway;
pub mod history;
pub mod math;
pub mod rpc;
pub mod settlement;
pub mod sim;

pub use error::{SettlementError, TokenSide};
pub use gateway::{FlashBorrower, LoanFees, PoolGateway, SwapLeg};
pub use settlement::{LoanRequest, SettlementEngine, SettlementOutcome, SettlementState};
