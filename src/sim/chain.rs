// Copyright (C) 2025 Category Labs, Inc.
// SPDX-License-Identifier: GPL-3.0-or-later

//! In-memory fork: pools, router, tokens and all-or-nothing transactions.

use crate::error::{revert_with, SettlementError};
use crate::gateway::{FlashBorrower, LoanFees, PoolGateway, SwapLeg};
use crate::math::{borrow_fee, MAX_FEE_RATE};
use crate::sim::ledger::{ChainRevert, Ledger, TokenKind, Transfer};
use crate::sim::pool::{amount_out, PoolSnapshot, SimPool};
use alloy::primitives::{Address, Bytes, U256};
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use tracing::debug;

/// Router revert on a missed slippage floor.
pub const TOO_LITTLE_RECEIVED: &str = "Too little received";

#[derive(Debug, Clone, Default)]
struct ChainState {
    ledger: Ledger,
    pools: HashMap<Address, SimPool>,
    /// Pools inside their own flash callback.
    locked: HashSet<Address>,
}

/// Simulated chain. Every mutation goes through one lock that is never held
/// while a borrower callback runs.
#[derive(Debug, Default)]
pub struct SimulatedChain {
    state: Mutex<ChainState>,
}

impl SimulatedChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_token(&self, token: Address, kind: TokenKind) {
        self.state.lock().ledger.set_kind(token, kind);
    }

    pub fn add_pool(&self, pool: Address, token0: Address, token1: Address, fee: u32) {
        self.state.lock().pools.insert(
            pool,
            SimPool {
                token0,
                token1,
                fee: fee.min(MAX_FEE_RATE),
            },
        );
    }

    /// Register a pool and mint its reserves.
    pub fn load_pool(&self, snapshot: &PoolSnapshot) {
        self.add_pool(
            snapshot.address,
            snapshot.token0,
            snapshot.token1,
            snapshot.fee,
        );
        self.mint(snapshot.token0, snapshot.address, snapshot.reserve0);
        self.mint(snapshot.token1, snapshot.address, snapshot.reserve1);
        debug!(
            "Loaded pool {} ({} / {}, fee {})",
            snapshot.address, snapshot.reserve0, snapshot.reserve1, snapshot.fee
        );
    }

    pub fn mint(&self, token: Address, to: Address, amount: U256) {
        self.state.lock().ledger.mint(token, to, amount);
    }

    pub fn freeze(&self, token: Address, holder: Address) {
        self.state.lock().ledger.freeze(token, holder);
    }

    pub fn balance_of(&self, token: Address, holder: Address) -> U256 {
        self.state.lock().ledger.balance(token, holder)
    }

    /// `(reserve0, reserve1)` of a pool.
    pub fn reserves(&self, pool: Address) -> Option<(U256, U256)> {
        let state = self.state.lock();
        let info = state.pools.get(&pool)?;
        Some((
            state.ledger.balance(info.token0, pool),
            state.ledger.balance(info.token1, pool),
        ))
    }

    /// Gateway making calls as `account`.
    pub fn gateway(&self, account: Address) -> ChainGateway<'_> {
        ChainGateway {
            chain: self,
            account,
        }
    }

    /// Run `f` as one transaction: on `Err` every state change is undone.
    pub fn transact<T, E>(&self, f: impl FnOnce() -> Result<T, E>) -> Result<T, E> {
        let snapshot = self.state.lock().clone();
        let result = f();
        if result.is_err() {
            *self.state.lock() = snapshot;
            debug!("Transaction reverted, state restored");
        }
        result
    }

    fn pool(&self, pool: Address) -> Result<SimPool, ChainRevert> {
        self.state
            .lock()
            .pools
            .get(&pool)
            .copied()
            .ok_or_else(|| ChainRevert::new(""))
    }

    fn swap(&self, account: Address, leg: &SwapLeg) -> Result<U256, ChainRevert> {
        let mut state = self.state.lock();
        let pool = state
            .pools
            .get(&leg.pool)
            .copied()
            .ok_or_else(|| ChainRevert::new(""))?;

        if pool.fee != leg.fee_tier {
            return Err(ChainRevert::new("fee tier mismatch"));
        }
        if !pool.trades(leg.token_in, leg.token_out) {
            return Err(ChainRevert::new("invalid token pair"));
        }
        if state.locked.contains(&leg.pool) {
            return Err(ChainRevert::new("LOK"));
        }

        let reserve_in = state.ledger.balance(leg.token_in, leg.pool);
        let reserve_out = state.ledger.balance(leg.token_out, leg.pool);
        let out = amount_out(leg.amount_in, reserve_in, reserve_out, pool.fee)
            .ok_or_else(|| ChainRevert::new("overflow"))?;
        if out < leg.min_amount_out {
            return Err(ChainRevert::new(TOO_LITTLE_RECEIVED));
        }

        match state
            .ledger
            .transfer(leg.token_in, account, leg.pool, leg.amount_in)
        {
            Ok(Transfer::Done) => {}
            _ => return Err(ChainRevert::new("STF")),
        }
        match state.ledger.transfer(leg.token_out, leg.pool, account, out) {
            Ok(Transfer::Done) => {}
            _ => return Err(ChainRevert::new("TF")),
        }

        Ok(out)
    }

    fn flash(
        &self,
        gateway: &ChainGateway<'_>,
        pool_address: Address,
        amount0: U256,
        amount1: U256,
        data: &Bytes,
        borrower: &dyn FlashBorrower,
    ) -> Result<LoanFees, SettlementError> {
        let revert = |reason: &str| SettlementError::PoolCallFailed {
            pool: pool_address,
            payload: revert_with(reason),
        };

        let pool = self
            .pool(pool_address)
            .map_err(|r| SettlementError::PoolCallFailed {
                pool: pool_address,
                payload: revert_payload(&r),
            })?;
        let fees = LoanFees {
            fee0: borrow_fee(amount0, pool.fee)?,
            fee1: borrow_fee(amount1, pool.fee)?,
        };

        let (before0, before1) = {
            let mut state = self.state.lock();
            if state.locked.contains(&pool_address) {
                return Err(revert("LOK"));
            }
            let before0 = state.ledger.balance(pool.token0, pool_address);
            let before1 = state.ledger.balance(pool.token1, pool_address);

            for (token, amount) in [(pool.token0, amount0), (pool.token1, amount1)] {
                if amount.is_zero() {
                    continue;
                }
                match state
                    .ledger
                    .transfer(token, pool_address, gateway.account, amount)
                {
                    Ok(Transfer::Done) => {}
                    _ => return Err(revert("TF")),
                }
            }
            state.locked.insert(pool_address);
            (before0, before1)
        };

        let callback = borrower.on_flash(gateway, pool_address, fees.fee0, fees.fee1, data);
        self.state.lock().locked.remove(&pool_address);
        callback?;

        let (after0, after1) = {
            let state = self.state.lock();
            (
                state.ledger.balance(pool.token0, pool_address),
                state.ledger.balance(pool.token1, pool_address),
            )
        };
        if after0 < before0.saturating_add(fees.fee0) {
            return Err(revert("F0"));
        }
        if after1 < before1.saturating_add(fees.fee1) {
            return Err(revert("F1"));
        }

        Ok(fees)
    }
}

/// [`PoolGateway`] over a [`SimulatedChain`], bound to one account.
#[derive(Debug, Clone, Copy)]
pub struct ChainGateway<'c> {
    chain: &'c SimulatedChain,
    account: Address,
}

impl PoolGateway for ChainGateway<'_> {
    fn account(&self) -> Address {
        self.account
    }

    fn pool_tokens(&self, pool: Address) -> Result<(Address, Address), SettlementError> {
        let info = self
            .chain
            .pool(pool)
            .map_err(|r| SettlementError::PoolCallFailed {
                pool,
                payload: revert_payload(&r),
            })?;
        Ok((info.token0, info.token1))
    }

    fn pool_fee(&self, pool: Address) -> Result<u32, SettlementError> {
        let info = self
            .chain
            .pool(pool)
            .map_err(|r| SettlementError::PoolCallFailed {
                pool,
                payload: revert_payload(&r),
            })?;
        Ok(info.fee)
    }

    fn balance_of(&self, token: Address) -> Result<U256, SettlementError> {
        Ok(self.chain.balance_of(token, self.account))
    }

    fn request_loan(
        &self,
        pool: Address,
        amount0: U256,
        amount1: U256,
        data: &Bytes,
        borrower: &dyn FlashBorrower,
    ) -> Result<LoanFees, SettlementError> {
        self.chain
            .flash(self, pool, amount0, amount1, data, borrower)
    }

    fn swap_exact_input(&self, leg: &SwapLeg) -> Result<U256, SettlementError> {
        self.chain.swap(self.account, leg).map_err(|r| {
            if r.0 == TOO_LITTLE_RECEIVED {
                SettlementError::SlippageExceeded {
                    pool: leg.pool,
                    min_amount_out: leg.min_amount_out,
                }
            } else {
                SettlementError::PoolCallFailed {
                    pool: leg.pool,
                    payload: revert_payload(&r),
                }
            }
        })
    }

    fn transfer(&self, token: Address, to: Address, amount: U256) -> Result<bool, SettlementError> {
        let result = self
            .chain
            .state
            .lock()
            .ledger
            .transfer(token, self.account, to, amount);
        match result {
            Ok(Transfer::Done) => Ok(true),
            Ok(Transfer::Refused) => Ok(false),
            Err(r) => Err(SettlementError::PoolCallFailed {
                pool: token,
                payload: revert_payload(&r),
            }),
        }
    }
}

/// Calls into an address with no code revert with empty data.
fn revert_payload(revert: &ChainRevert) -> Bytes {
    if revert.0.is_empty() {
        Bytes::new()
    } else {
        revert_with(&revert.0)
    }
}
