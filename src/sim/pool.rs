// Copyright (C) 2025 Category Labs, Inc.
// SPDX-License-Identifier: GPL-3.0-or-later

//! Simulated pools: token pair, fee tier and constant-product pricing.

use crate::math::FEE_DENOMINATOR;
use alloy::primitives::{Address, U256};
use serde::{Deserialize, Serialize};

/// A pool as registered on the simulated chain. Reserves live in the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SimPool {
    pub token0: Address,
    pub token1: Address,
    pub fee: u32,
}

impl SimPool {
    /// `(token_in, token_out)` is one of the pool's two directions.
    pub fn trades(&self, token_in: Address, token_out: Address) -> bool {
        (token_in == self.token0 && token_out == self.token1)
            || (token_in == self.token1 && token_out == self.token0)
    }
}

/// Pool state read from a fork, used to seed the simulation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolSnapshot {
    pub address: Address,
    pub token0: Address,
    pub token1: Address,
    pub fee: u32,
    pub reserve0: U256,
    pub reserve1: U256,
}

/// Output of an exact-input swap against `x * y = k` after the fee.
///
/// `None` if an intermediate product overflows.
pub fn amount_out(
    amount_in: U256,
    reserve_in: U256,
    reserve_out: U256,
    fee: u32,
) -> Option<U256> {
    if amount_in.is_zero() || reserve_in.is_zero() || reserve_out.is_zero() {
        return Some(U256::ZERO);
    }

    let in_with_fee = amount_in.checked_mul(U256::from(FEE_DENOMINATOR.saturating_sub(fee)))?;
    let numerator = in_with_fee.checked_mul(reserve_out)?;
    let denominator = reserve_in
        .checked_mul(U256::from(FEE_DENOMINATOR))?
        .checked_add(in_with_fee)?;

    Some(numerator / denominator)
}
