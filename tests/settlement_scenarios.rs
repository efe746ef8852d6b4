// Copyright (C) 2025 Category Labs, Inc.
// SPDX-License-Identifier: GPL-3.0-or-later

//! End-to-end settlements against the simulated fork.

use alloy::primitives::{Address, Bytes, I256, U256};
use flash_swap::arbitrage::ArbitrageRoute;
use flash_swap::error::revert_with;
use flash_swap::gateway::{FlashBorrower, LoanFees, PoolGateway, SwapLeg};
use flash_swap::math::{amount_owed, borrow_fee};
use flash_swap::sim::{amount_out, PoolSnapshot, SimulatedChain, TokenKind};
use flash_swap::{LoanRequest, SettlementEngine, SettlementError, SettlementState, TokenSide};
use parking_lot::Mutex;

const USDC: Address = Address::repeat_byte(0x0c);
const WETH: Address = Address::repeat_byte(0x0e);
const LENDING_POOL: Address = Address::repeat_byte(0x88);
const POOL_A: Address = Address::repeat_byte(0x8a);
const POOL_B: Address = Address::repeat_byte(0x7b);
const POOL_C: Address = Address::repeat_byte(0xc5);
const OPERATOR: Address = Address::repeat_byte(0x0f);
const ENGINE: Address = Address::repeat_byte(0xf5);
const STRANGER: Address = Address::repeat_byte(0x66);

fn weth(whole: u64) -> U256 {
    U256::from(whole) * U256::from(1_000_000_000_000_000_000u128)
}

fn usdc(whole: u64) -> U256 {
    U256::from(whole) * U256::from(1_000_000u64)
}

fn one_point_one_weth() -> U256 {
    U256::from(1_100_000_000_000_000_000u128)
}

/// USDC/WETH at 0.05% (lender), 0.3% (WETH rich), 1% (WETH cheap) and a
/// second 0.05% pool pricing WETH above both.
fn fork() -> SimulatedChain {
    let chain = SimulatedChain::new();
    for (address, fee, usdc_reserve, weth_reserve) in [
        (LENDING_POOL, 500, usdc(100_000_000), weth(40_000)),
        (POOL_A, 3000, usdc(50_000_000), weth(19_600)),
        (POOL_B, 10_000, usdc(10_000_000), weth(4_100)),
        (POOL_C, 500, usdc(26_000_000), weth(10_000)),
    ] {
        chain.load_pool(&PoolSnapshot {
            address,
            token0: USDC,
            token1: WETH,
            fee,
            reserve0: usdc_reserve,
            reserve1: weth_reserve,
        });
    }
    chain
}

fn route(pool_a: Address, fee_a: u32, pool_b: Address, fee_b: u32) -> ArbitrageRoute {
    ArbitrageRoute {
        intermediate_token: USDC,
        pool_a,
        pool_b,
        fee_tier_a: fee_a,
        fee_tier_b: fee_b,
        min_out1: U256::ZERO,
        min_out2: U256::ZERO,
    }
}

fn borrow_weth(amount: U256, route_params: Bytes) -> LoanRequest {
    LoanRequest {
        lending_pool: LENDING_POOL,
        amount0: U256::ZERO,
        amount1: amount,
        route_params,
    }
}

/// Every balance the scenarios can touch.
fn balances(chain: &SimulatedChain) -> Vec<U256> {
    let mut all = Vec::new();
    for pool in [LENDING_POOL, POOL_A, POOL_B, POOL_C] {
        let (r0, r1) = chain.reserves(pool).unwrap();
        all.extend([r0, r1]);
    }
    for holder in [ENGINE, OPERATOR, STRANGER] {
        all.extend([chain.balance_of(USDC, holder), chain.balance_of(WETH, holder)]);
    }
    all
}

fn owed_for(amount: U256) -> U256 {
    amount_owed(amount, borrow_fee(amount, 500).unwrap()).unwrap()
}

#[test]
fn unfunded_loan_without_route_reverts_insufficient() {
    let chain = fork();
    let engine = SettlementEngine::new(OPERATOR);
    let gateway = chain.gateway(ENGINE);
    let before = balances(&chain);

    let err = chain
        .transact(|| engine.initiate(&gateway, OPERATOR, borrow_weth(weth(1), Bytes::new())))
        .unwrap_err();

    assert_eq!(
        err,
        SettlementError::InsufficientFunds {
            token: WETH,
            held: weth(1),
            owed: owed_for(weth(1)),
        }
    );
    assert_eq!(err.revert_reason(), "insufficient funds post-arbitrage");
    assert_eq!(balances(&chain), before);
    assert!(engine.is_idle());
}

#[test]
fn prefunded_buffer_covers_the_fee() {
    let chain = fork();
    chain.mint(WETH, ENGINE, one_point_one_weth());
    let engine = SettlementEngine::new(OPERATOR);
    let gateway = chain.gateway(ENGINE);
    let (_, lender_weth_before) = chain.reserves(LENDING_POOL).unwrap();

    let outcome = chain
        .transact(|| engine.initiate(&gateway, OPERATOR, borrow_weth(weth(1), Bytes::new())))
        .unwrap();

    let owed = owed_for(weth(1));
    let held = weth(1) + one_point_one_weth();
    assert!(outcome.success);
    assert_eq!(outcome.repaid0, U256::ZERO);
    assert_eq!(outcome.repaid1, owed);
    assert_eq!(outcome.realized_profit, I256::try_from(held - owed).unwrap());
    assert!(outcome.realized_profit >= I256::ZERO);

    let (_, lender_weth_after) = chain.reserves(LENDING_POOL).unwrap();
    assert_eq!(lender_weth_after, lender_weth_before + borrow_fee(weth(1), 500).unwrap());
    assert_eq!(chain.balance_of(WETH, ENGINE), held - owed);
    assert!(engine.is_idle());
}

#[test]
fn round_trip_profit_matches_pool_pricing() {
    let chain = fork();
    let engine = SettlementEngine::new(OPERATOR);
    let gateway = chain.gateway(ENGINE);

    let (a_usdc, a_weth) = chain.reserves(POOL_A).unwrap();
    let (b_usdc, b_weth) = chain.reserves(POOL_B).unwrap();
    let out1 = amount_out(weth(1), a_weth, a_usdc, 3000).unwrap();
    let out2 = amount_out(out1, b_usdc, b_weth, 10_000).unwrap();
    let owed = owed_for(weth(1));
    assert!(out2 > owed);

    let request = borrow_weth(weth(1), route(POOL_A, 3000, POOL_B, 10_000).encode());
    let outcome = chain
        .transact(|| engine.initiate(&gateway, OPERATOR, request))
        .unwrap();

    assert_eq!(outcome.realized_profit, I256::try_from(out2 - owed).unwrap());
    assert_eq!(chain.balance_of(WETH, ENGINE), out2 - owed);
    assert_eq!(chain.balance_of(USDC, ENGINE), U256::ZERO);
    assert_eq!(chain.reserves(POOL_A).unwrap(), (a_usdc - out1, a_weth + weth(1)));
    assert_eq!(chain.reserves(POOL_B).unwrap(), (b_usdc + out1, b_weth - out2));
}

#[test]
fn round_trip_through_500_then_3000_tiers() {
    let chain = fork();
    let engine = SettlementEngine::new(OPERATOR);
    let gateway = chain.gateway(ENGINE);

    let (c_usdc, c_weth) = chain.reserves(POOL_C).unwrap();
    let (a_usdc, a_weth) = chain.reserves(POOL_A).unwrap();
    let out1 = amount_out(weth(1), c_weth, c_usdc, 500).unwrap();
    let out2 = amount_out(out1, a_usdc, a_weth, 3000).unwrap();
    let owed = owed_for(weth(1));
    // WETH at ~2600 on the 500 pool and ~2551 on the 3000 pool clears both fees
    assert!(out2 > owed);

    let request = borrow_weth(weth(1), route(POOL_C, 500, POOL_A, 3000).encode());
    let outcome = chain
        .transact(|| engine.initiate(&gateway, OPERATOR, request))
        .unwrap();

    assert_eq!(outcome.realized_profit, I256::try_from(out2 - owed).unwrap());
    assert_eq!(outcome.repaid1, owed);
    assert_eq!(chain.balance_of(WETH, ENGINE), out2 - owed);
    assert_eq!(chain.reserves(POOL_C).unwrap(), (c_usdc - out1, c_weth + weth(1)));
}

#[test]
fn losing_round_trip_is_undone_completely() {
    let chain = fork();
    let engine = SettlementEngine::new(OPERATOR);
    let gateway = chain.gateway(ENGINE);
    let before = balances(&chain);

    // buy WETH where it is expensive, sell where it is cheap
    let request = borrow_weth(weth(1), route(POOL_B, 10_000, POOL_A, 3000).encode());
    let err = chain
        .transact(|| engine.initiate(&gateway, OPERATOR, request))
        .unwrap_err();

    match err {
        SettlementError::InsufficientFunds { token, held, owed } => {
            assert_eq!(token, WETH);
            assert!(held < owed);
            assert_eq!(owed, owed_for(weth(1)));
        }
        other => panic!("expected InsufficientFunds, got {:?}", other),
    }
    assert_eq!(balances(&chain), before);
}

#[test]
fn second_leg_floor_aborts_with_slippage() {
    let chain = fork();
    let engine = SettlementEngine::new(OPERATOR);
    let gateway = chain.gateway(ENGINE);
    let before = balances(&chain);

    let mut guarded = route(POOL_A, 3000, POOL_B, 10_000);
    guarded.min_out2 = weth(2);
    let err = chain
        .transact(|| engine.initiate(&gateway, OPERATOR, borrow_weth(weth(1), guarded.encode())))
        .unwrap_err();

    assert_eq!(
        err,
        SettlementError::SlippageExceeded {
            pool: POOL_B,
            min_amount_out: weth(2),
        }
    );
    assert_eq!(err.revert_reason(), "Too little received");
    assert_eq!(balances(&chain), before);
    assert!(engine.is_idle());
}

#[test]
fn malformed_route_never_borrows() {
    let chain = fork();
    let engine = SettlementEngine::new(OPERATOR);
    let gateway = chain.gateway(ENGINE);
    let before = balances(&chain);

    let mut truncated = route(POOL_A, 3000, POOL_B, 10_000).encode().to_vec();
    truncated.truncate(100);

    // no transact: nothing may have moved even without a rollback
    let err = engine
        .initiate(&gateway, OPERATOR, borrow_weth(weth(1), truncated.into()))
        .unwrap_err();

    assert!(matches!(err, SettlementError::MalformedRoute(_)));
    assert_eq!(balances(&chain), before);
    assert!(engine.is_idle());
}

#[test]
fn borrowed_token_as_intermediate_is_malformed() {
    let chain = fork();
    let engine = SettlementEngine::new(OPERATOR);
    let gateway = chain.gateway(ENGINE);

    let mut looped = route(POOL_A, 3000, POOL_B, 10_000);
    looped.intermediate_token = WETH;
    let err = engine
        .initiate(&gateway, OPERATOR, borrow_weth(weth(1), looped.encode()))
        .unwrap_err();

    assert!(matches!(err, SettlementError::MalformedRoute(_)));
}

#[test]
fn swapping_on_the_lending_pool_hits_its_lock() {
    let chain = fork();
    let engine = SettlementEngine::new(OPERATOR);
    let gateway = chain.gateway(ENGINE);
    let before = balances(&chain);

    let request = borrow_weth(weth(1), route(LENDING_POOL, 500, POOL_B, 10_000).encode());
    let err = chain
        .transact(|| engine.initiate(&gateway, OPERATOR, request))
        .unwrap_err();

    assert_eq!(
        err,
        SettlementError::PoolCallFailed {
            pool: LENDING_POOL,
            payload: revert_with("LOK"),
        }
    );
    assert_eq!(err.revert_reason(), "LOK");
    assert_eq!(balances(&chain), before);
}

#[test]
fn refused_repayment_names_the_side() {
    let chain = fork();
    chain.add_token(WETH, TokenKind::ReturnsFalse);
    chain.mint(WETH, ENGINE, one_point_one_weth());
    chain.freeze(WETH, ENGINE);
    let engine = SettlementEngine::new(OPERATOR);
    let gateway = chain.gateway(ENGINE);
    let before = balances(&chain);

    let err = chain
        .transact(|| engine.initiate(&gateway, OPERATOR, borrow_weth(weth(1), Bytes::new())))
        .unwrap_err();

    assert_eq!(
        err,
        SettlementError::RepaymentTransferFailed {
            token: WETH,
            amount: owed_for(weth(1)),
            side: TokenSide::Token1,
        }
    );
    assert_eq!(err.revert_reason(), "token1 transfer failed");
    assert_eq!(balances(&chain), before);
}

#[test]
fn callback_with_no_pending_loan_is_refused() {
    let chain = fork();
    chain.mint(WETH, ENGINE, weth(3));
    let engine = SettlementEngine::new(OPERATOR);
    let gateway = chain.gateway(ENGINE);
    let before = balances(&chain);

    let data = route(POOL_A, 3000, POOL_B, 10_000).encode();
    let err = engine
        .dispatcher()
        .on_flash(&gateway, LENDING_POOL, U256::from(1), U256::from(1), &data)
        .unwrap_err();

    assert_eq!(err, SettlementError::UnauthorizedCallback { caller: LENDING_POOL });
    assert_eq!(balances(&chain), before);
    assert_eq!(engine.state(), SettlementState::Idle);
}

/// Gateway that lets an attacker act while the engine's callback is running.
struct HijackingGateway<'a> {
    inner: &'a dyn PoolGateway,
    engine: &'a SettlementEngine,
    reentry: Mutex<Option<Result<(), SettlementError>>>,
    forged: Mutex<Option<Result<(), SettlementError>>>,
}

struct Hijack<'a, 'b> {
    outer: &'b HijackingGateway<'a>,
    borrower: &'b dyn FlashBorrower,
}

impl FlashBorrower for Hijack<'_, '_> {
    fn on_flash(
        &self,
        gateway: &dyn PoolGateway,
        caller: Address,
        fee0: U256,
        fee1: U256,
        data: &Bytes,
    ) -> Result<(), SettlementError> {
        let nested = self
            .outer
            .engine
            .initiate(gateway, STRANGER, borrow_weth(weth(1), Bytes::new()))
            .map(|_| ());
        *self.outer.reentry.lock() = Some(nested);

        let forged = self
            .outer
            .engine
            .dispatcher()
            .on_flash(gateway, STRANGER, fee0, fee1, data);
        *self.outer.forged.lock() = Some(forged);

        self.borrower.on_flash(gateway, caller, fee0, fee1, data)
    }
}

impl PoolGateway for HijackingGateway<'_> {
    fn account(&self) -> Address {
        self.inner.account()
    }

    fn pool_tokens(&self, pool: Address) -> Result<(Address, Address), SettlementError> {
        self.inner.pool_tokens(pool)
    }

    fn pool_fee(&self, pool: Address) -> Result<u32, SettlementError> {
        self.inner.pool_fee(pool)
    }

    fn balance_of(&self, token: Address) -> Result<U256, SettlementError> {
        self.inner.balance_of(token)
    }

    fn request_loan(
        &self,
        pool: Address,
        amount0: U256,
        amount1: U256,
        data: &Bytes,
        borrower: &dyn FlashBorrower,
    ) -> Result<LoanFees, SettlementError> {
        let hijack = Hijack {
            outer: self,
            borrower,
        };
        self.inner.request_loan(pool, amount0, amount1, data, &hijack)
    }

    fn swap_exact_input(&self, leg: &SwapLeg) -> Result<U256, SettlementError> {
        self.inner.swap_exact_input(leg)
    }

    fn transfer(&self, token: Address, to: Address, amount: U256) -> Result<bool, SettlementError> {
        self.inner.transfer(token, to, amount)
    }
}

#[test]
fn reentry_during_callback_is_rejected_and_outer_settles() {
    let chain = fork();
    let engine = SettlementEngine::new(OPERATOR);
    let inner = chain.gateway(ENGINE);
    let gateway = HijackingGateway {
        inner: &inner,
        engine: &engine,
        reentry: Mutex::new(None),
        forged: Mutex::new(None),
    };

    let request = borrow_weth(weth(1), route(POOL_A, 3000, POOL_B, 10_000).encode());
    let outcome = chain
        .transact(|| engine.initiate(&gateway, OPERATOR, request))
        .unwrap();

    assert_eq!(
        gateway.reentry.lock().clone(),
        Some(Err(SettlementError::AlreadyPending))
    );
    assert_eq!(
        gateway.forged.lock().clone(),
        Some(Err(SettlementError::UnauthorizedCallback { caller: STRANGER }))
    );
    assert!(outcome.success);
    assert!(outcome.realized_profit > I256::ZERO);
    assert!(engine.is_idle());
}

#[test]
fn owner_sweeps_profit_after_settlement() {
    let chain = fork();
    chain.mint(WETH, ENGINE, one_point_one_weth());
    let engine = SettlementEngine::new(OPERATOR);
    let gateway = chain.gateway(ENGINE);

    chain
        .transact(|| engine.initiate(&gateway, OPERATOR, borrow_weth(weth(1), Bytes::new())))
        .unwrap();
    let profit = chain.balance_of(WETH, ENGINE);

    assert_eq!(
        engine.withdraw(&gateway, STRANGER, WETH),
        Err(SettlementError::NotOwner { caller: STRANGER })
    );
    assert_eq!(engine.withdraw(&gateway, OPERATOR, WETH), Ok(profit));
    assert_eq!(chain.balance_of(WETH, OPERATOR), profit);
    assert_eq!(chain.balance_of(WETH, ENGINE), U256::ZERO);
}

#[test]
fn engine_is_reusable_after_a_revert() {
    let chain = fork();
    let engine = SettlementEngine::new(OPERATOR);
    let gateway = chain.gateway(ENGINE);

    assert!(chain
        .transact(|| engine.initiate(&gateway, OPERATOR, borrow_weth(weth(1), Bytes::new())))
        .is_err());

    let request = borrow_weth(weth(1), route(POOL_A, 3000, POOL_B, 10_000).encode());
    assert!(chain
        .transact(|| engine.initiate(&gateway, OPERATOR, request))
        .is_ok());
}
