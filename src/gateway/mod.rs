// Copyright (C) 2025 Category Labs, Inc.
// SPDX-License-Identifier: GPL-3.0-or-later

//! Call surface of the lending pool, swap router and tokens.
//!
//! A gateway is bound to one account: the settlement contract. Every call it
//! makes is made as that account, and every balance it reports is that
//! account's balance.

use crate::error::SettlementError;
use alloy::primitives::{Address, Bytes, U256};

/// Fees the lending pool charged for one flash borrow.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoanFees {
    pub fee0: U256,
    pub fee1: U256,
}

/// One exact-input swap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SwapLeg {
    pub pool: Address,
    pub fee_tier: u32,
    pub token_in: Address,
    pub token_out: Address,
    pub amount_in: U256,
    pub min_amount_out: U256,
}

/// Recipient side of a flash borrow.
pub trait FlashBorrower {
    /// Invoked by `caller` after it transferred the borrowed amounts.
    ///
    /// The borrower must hold principal + fee of each borrowed token when this
    /// returns, or the pool reverts the whole call chain.
    fn on_flash(
        &self,
        gateway: &dyn PoolGateway,
        caller: Address,
        fee0: U256,
        fee1: U256,
        data: &Bytes,
    ) -> Result<(), SettlementError>;
}

/// The only way the settlement engine reaches pools and tokens.
pub trait PoolGateway {
    /// Account every call is made from.
    fn account(&self) -> Address;

    /// `(token0, token1)` of a pool.
    fn pool_tokens(&self, pool: Address) -> Result<(Address, Address), SettlementError>;

    /// Fee rate of a pool, in hundredths of a basis point.
    fn pool_fee(&self, pool: Address) -> Result<u32, SettlementError>;

    /// Balance of `token` held by [`PoolGateway::account`].
    fn balance_of(&self, token: Address) -> Result<U256, SettlementError>;

    /// Borrow from `pool`. Does not return until `borrower.on_flash` has
    /// completed, or the chain has failed.
    fn request_loan(
        &self,
        pool: Address,
        amount0: U256,
        amount1: U256,
        data: &Bytes,
        borrower: &dyn FlashBorrower,
    ) -> Result<LoanFees, SettlementError>;

    /// Swap exactly `leg.amount_in`; `SlippageExceeded` below the floor.
    fn swap_exact_input(&self, leg: &SwapLeg) -> Result<U256, SettlementError>;

    /// Token transfer. `Ok(false)` when the token reports failure by return value.
    fn transfer(&self, token: Address, to: Address, amount: U256)
        -> Result<bool, SettlementError>;

    /// Pay `amount` of `token` back to `pool`.
    fn repay(&self, pool: Address, token: Address, amount: U256) -> Result<bool, SettlementError> {
        self.transfer(token, pool, amount)
    }
}
