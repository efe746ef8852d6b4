// Copyright (C) 2025 Category Labs, Inc.
// SPDX-License-Identifier: GPL-3.0-or-later

//! Simulated mainnet fork used by the harness and the tests.

pub mod chain;
pub mod ledger;
pub mod pool;

pub use chain::{ChainGateway, SimulatedChain, TOO_LITTLE_RECEIVED};
pub use ledger::{ChainRevert, TokenKind};
pub use pool::{amount_out, PoolSnapshot, SimPool};
