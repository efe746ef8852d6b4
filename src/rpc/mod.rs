// Copyright (C) 2025 Category Labs, Inc.
// SPDX-License-Identifier: GPL-3.0-or-later

//! Read-only RPC access used to seed the simulation from a fork.

mod pool;
mod provider;

pub use pool::{fetch_pool_snapshot, IUniswapV3Pool, IERC20};
pub use provider::create_provider;
