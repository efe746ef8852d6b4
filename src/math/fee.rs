// Copyright (C) 2025 Category Labs, Inc.
// SPDX-License-Identifier: GPL-3.0-or-later

//! Flash-borrow fee math.
//!
//! Fee rates are expressed in hundredths of a basis point, the unit Uniswap V3
//! uses for its fee tiers (500 = 0.05%, 3000 = 0.3%).

use crate::error::SettlementError;
use alloy::primitives::U256;

/// Denominator for fee rates (1e6 = 100%).
pub const FEE_DENOMINATOR: u32 = 1_000_000;

/// Largest meaningful fee rate.
pub const MAX_FEE_RATE: u32 = FEE_DENOMINATOR;

/// Fee owed for borrowing `amount_borrowed` at `fee_rate`.
///
/// Rounds up, so the lender is never short-changed by truncation.
pub fn borrow_fee(amount_borrowed: U256, fee_rate: u32) -> Result<U256, SettlementError> {
    let product = amount_borrowed
        .checked_mul(U256::from(fee_rate))
        .ok_or(SettlementError::ArithmeticOverflow)?;

    let denominator = U256::from(FEE_DENOMINATOR);
    let fee = product / denominator;
    if product % denominator == U256::ZERO {
        Ok(fee)
    } else {
        // fee < product, so this cannot wrap
        Ok(fee + U256::from(1))
    }
}

/// `principal + fee`, or `ArithmeticOverflow`.
pub fn amount_owed(principal: U256, fee: U256) -> Result<U256, SettlementError> {
    principal
        .checked_add(fee)
        .ok_or(SettlementError::ArithmeticOverflow)
}

/// True iff `held` covers `principal + fee`. An overflowing obligation is never covered.
pub fn is_sufficient(held: U256, principal: U256, fee: U256) -> bool {
    match principal.checked_add(fee) {
        Some(owed) => held >= owed,
        None => false,
    }
}
