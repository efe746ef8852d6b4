// Copyright (C) 2025 Category Labs, Inc.
// SPDX-License-Identifier: GPL-3.0-or-later

//! Flash swap settlement state machine.
//!
//! `initiate` borrows from the lending pool; the pool calls back into
//! [`SettlementEngine::on_loan_received`] (through the
//! [`CallbackDispatcher`]) before `request_loan` returns. The callback runs
//! the route, checks solvency and repays. Any failure surfaces as `Err` from
//! `initiate`; undoing balance changes is the host's job.

use crate::arbitrage::Route;
use crate::error::{revert_with, SettlementError, TokenSide};
use crate::gateway::{PoolGateway, SwapLeg};
use crate::math::{amount_owed, borrow_fee, is_sufficient};
use crate::settlement::CallbackDispatcher;
use alloy::primitives::{Address, Bytes, I256, U256};
use parking_lot::Mutex;
use tracing::{debug, info, warn};

/// Operator request to borrow and settle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoanRequest {
    pub lending_pool: Address,
    pub amount0: U256,
    pub amount1: U256,
    /// Encoded [`crate::arbitrage::ArbitrageRoute`], or empty.
    pub route_params: Bytes,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettlementState {
    Idle,
    LoanInitiated,
    LoanReceived,
    Swapping,
    Settling,
    Repaid,
    Aborted,
}

impl std::fmt::Display for SettlementState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            SettlementState::Idle => "Idle",
            SettlementState::LoanInitiated => "LoanInitiated",
            SettlementState::LoanReceived => "LoanReceived",
            SettlementState::Swapping => "Swapping",
            SettlementState::Settling => "Settling",
            SettlementState::Repaid => "Repaid",
            SettlementState::Aborted => "Aborted",
        };
        write!(f, "{}", name)
    }
}

/// Result of one successful settlement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SettlementOutcome {
    pub success: bool,
    /// Held minus owed of the primary borrowed token, measured before repaying.
    pub realized_profit: I256,
    pub repaid0: U256,
    pub repaid1: U256,
}

/// The in-flight loan. Exists only between `initiate` and its return.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingLoan {
    pub lending_pool: Address,
    pub token0: Address,
    pub token1: Address,
    pub amount0: U256,
    pub amount1: U256,
    pub fee0: U256,
    pub fee1: U256,
    pub route_params: Bytes,
    pub route: Route,
    pub initiator: Address,
    pub state: SettlementState,
    pub outcome: Option<SettlementOutcome>,
}

impl PendingLoan {
    /// Token the route trades: token0 if borrowed, else token1.
    fn primary(&self) -> (TokenSide, Address, U256) {
        if !self.amount0.is_zero() {
            (TokenSide::Token0, self.token0, self.amount0)
        } else {
            (TokenSide::Token1, self.token1, self.amount1)
        }
    }

    /// `(side, token, principal, fee)` for every nonzero borrow.
    fn obligations(&self) -> Vec<(TokenSide, Address, U256, U256)> {
        let mut out = Vec::with_capacity(2);
        if !self.amount0.is_zero() {
            out.push((TokenSide::Token0, self.token0, self.amount0, self.fee0));
        }
        if !self.amount1.is_zero() {
            out.push((TokenSide::Token1, self.token1, self.amount1, self.fee1));
        }
        out
    }
}

/// Holds the pending slot for the duration of one `initiate` and empties it
/// on every exit path.
struct PendingSlot<'a> {
    slot: &'a Mutex<Option<PendingLoan>>,
}

impl<'a> PendingSlot<'a> {
    fn acquire(
        slot: &'a Mutex<Option<PendingLoan>>,
        loan: PendingLoan,
    ) -> Result<Self, SettlementError> {
        let mut guard = slot.lock();
        if guard.is_some() {
            return Err(SettlementError::AlreadyPending);
        }
        *guard = Some(loan);
        Ok(Self { slot })
    }

    fn outcome(&self) -> Option<SettlementOutcome> {
        self.slot.lock().as_ref().and_then(|loan| loan.outcome)
    }
}

impl Drop for PendingSlot<'_> {
    fn drop(&mut self) {
        self.slot.lock().take();
    }
}

/// Settlement contract logic.
pub struct SettlementEngine {
    owner: Address,
    pending: Mutex<Option<PendingLoan>>,
}

impl SettlementEngine {
    pub fn new(owner: Address) -> Self {
        Self {
            owner,
            pending: Mutex::new(None),
        }
    }

    /// Current state; `Idle` whenever nothing is in flight.
    pub fn state(&self) -> SettlementState {
        self.pending
            .lock()
            .as_ref()
            .map(|loan| loan.state)
            .unwrap_or(SettlementState::Idle)
    }

    pub fn is_idle(&self) -> bool {
        self.pending.lock().is_none()
    }

    /// Snapshot of the pending loan, if any.
    pub fn pending(&self) -> Option<PendingLoan> {
        self.pending.lock().clone()
    }

    /// The inbound flash-callback entrypoint.
    pub fn dispatcher(&self) -> CallbackDispatcher<'_> {
        CallbackDispatcher::new(self)
    }

    /// Borrow, run the route and repay, all inside one `request_loan` call.
    pub fn initiate(
        &self,
        gateway: &dyn PoolGateway,
        initiator: Address,
        request: LoanRequest,
    ) -> Result<SettlementOutcome, SettlementError> {
        if request.amount0.is_zero() && request.amount1.is_zero() {
            return Err(SettlementError::ZeroBorrow);
        }
        if !self.is_idle() {
            warn!("⛔ Rejecting flash swap from {}: one is already pending", initiator);
            return Err(SettlementError::AlreadyPending);
        }

        // validated before any borrow or swap is attempted
        let (token0, token1) = gateway.pool_tokens(request.lending_pool)?;
        let route = Route::decode(&request.route_params)?;
        let borrowed: Vec<Address> = [(token0, request.amount0), (token1, request.amount1)]
            .into_iter()
            .filter(|(_, amount)| !amount.is_zero())
            .map(|(token, _)| token)
            .collect();
        route.validate(&borrowed)?;

        info!(
            "⚡ Initiating flash swap on {}: amount0={}, amount1={}, route={}",
            request.lending_pool,
            request.amount0,
            request.amount1,
            match route {
                Route::Empty => "none",
                Route::RoundTrip(_) => "round-trip",
            }
        );

        let slot = PendingSlot::acquire(
            &self.pending,
            PendingLoan {
                lending_pool: request.lending_pool,
                token0,
                token1,
                amount0: request.amount0,
                amount1: request.amount1,
                fee0: U256::ZERO,
                fee1: U256::ZERO,
                route_params: request.route_params.clone(),
                route,
                initiator,
                state: SettlementState::LoanInitiated,
                outcome: None,
            },
        )?;
        debug!("State: Idle -> {}", SettlementState::LoanInitiated);

        let dispatcher = self.dispatcher();
        let fees = gateway.request_loan(
            request.lending_pool,
            request.amount0,
            request.amount1,
            &request.route_params,
            &dispatcher,
        )?;
        debug!("Loan closed: fee0={}, fee1={}", fees.fee0, fees.fee1);

        let outcome = slot.outcome().ok_or_else(|| SettlementError::PoolCallFailed {
            pool: request.lending_pool,
            payload: revert_with("flash callback not received"),
        })?;

        info!(
            "✅ Flash swap settled: profit={}, repaid0={}, repaid1={}",
            outcome.realized_profit, outcome.repaid0, outcome.repaid1
        );
        Ok(outcome)
    }

    /// Callback half of the flash swap; reached only through the dispatcher.
    pub fn on_loan_received(
        &self,
        gateway: &dyn PoolGateway,
        caller: Address,
        fee0: U256,
        fee1: U256,
        data: &Bytes,
    ) -> Result<(), SettlementError> {
        let loan = {
            let mut slot = self.pending.lock();
            let loan = match slot.as_mut() {
                Some(loan)
                    if loan.state == SettlementState::LoanInitiated
                        && loan.lending_pool == caller
                        && loan.route_params == *data =>
                {
                    loan
                }
                _ => {
                    warn!("⛔ Unauthorized flash callback from {}", caller);
                    return Err(SettlementError::UnauthorizedCallback { caller });
                }
            };
            loan.fee0 = fee0;
            loan.fee1 = fee1;
            loan.state = SettlementState::LoanReceived;
            loan.clone()
        };
        debug!("State: LoanInitiated -> LoanReceived (fee0={}, fee1={})", fee0, fee1);

        match self.settle(gateway, &loan) {
            Ok(outcome) => {
                let mut slot = self.pending.lock();
                if let Some(pending) = slot.as_mut() {
                    pending.state = SettlementState::Repaid;
                    pending.outcome = Some(outcome);
                }
                debug!("State: Settling -> Repaid");
                Ok(())
            }
            Err(e) => {
                let from = self.state();
                self.transition(SettlementState::Aborted);
                warn!("❌ Flash swap aborted in {}: {}", from, e);
                Err(e)
            }
        }
    }

    /// Sweep the engine's whole balance of `token` to the owner.
    pub fn withdraw(
        &self,
        gateway: &dyn PoolGateway,
        caller: Address,
        token: Address,
    ) -> Result<U256, SettlementError> {
        if caller != self.owner {
            return Err(SettlementError::NotOwner { caller });
        }
        if !self.is_idle() {
            return Err(SettlementError::AlreadyPending);
        }

        let amount = gateway.balance_of(token)?;
        if amount.is_zero() {
            return Ok(amount);
        }
        if !gateway.transfer(token, self.owner, amount)? {
            return Err(SettlementError::PoolCallFailed {
                pool: token,
                payload: revert_with("TF"),
            });
        }

        info!("💸 Withdrew {} of {} to {}", amount, token, self.owner);
        Ok(amount)
    }

    fn transition(&self, next: SettlementState) {
        if let Some(loan) = self.pending.lock().as_mut() {
            debug!("State: {} -> {}", loan.state, next);
            loan.state = next;
        }
    }

    fn settle(
        &self,
        gateway: &dyn PoolGateway,
        loan: &PendingLoan,
    ) -> Result<SettlementOutcome, SettlementError> {
        self.cross_check_fees(gateway, loan);

        let (primary_side, primary_token, primary_amount) = loan.primary();

        if let Route::RoundTrip(route) = loan.route {
            self.transition(SettlementState::Swapping);

            let out1 = gateway.swap_exact_input(&SwapLeg {
                pool: route.pool_a,
                fee_tier: route.fee_tier_a,
                token_in: primary_token,
                token_out: route.intermediate_token,
                amount_in: primary_amount,
                min_amount_out: route.min_out1,
            })?;
            debug!("Leg 1: {} -> {} intermediate", primary_amount, out1);

            let out2 = gateway.swap_exact_input(&SwapLeg {
                pool: route.pool_b,
                fee_tier: route.fee_tier_b,
                token_in: route.intermediate_token,
                token_out: primary_token,
                amount_in: out1,
                min_amount_out: route.min_out2,
            })?;
            debug!("Leg 2: {} intermediate -> {}", out1, out2);
        }

        self.transition(SettlementState::Settling);

        let mut outcome = SettlementOutcome {
            success: true,
            realized_profit: I256::ZERO,
            repaid0: U256::ZERO,
            repaid1: U256::ZERO,
        };

        for (side, token, principal, fee) in loan.obligations() {
            let held = gateway.balance_of(token)?;
            if !is_sufficient(held, principal, fee) {
                return Err(SettlementError::InsufficientFunds {
                    token,
                    held,
                    owed: principal.saturating_add(fee),
                });
            }
            let owed = amount_owed(principal, fee)?;

            if side == primary_side {
                outcome.realized_profit =
                    I256::try_from(held - owed).map_err(|_| SettlementError::ArithmeticOverflow)?;
            }

            if !gateway.repay(loan.lending_pool, token, owed)? {
                return Err(SettlementError::RepaymentTransferFailed {
                    token,
                    amount: owed,
                    side,
                });
            }
            debug!("Repaid {} of {} ({})", owed, token, side);

            match side {
                TokenSide::Token0 => outcome.repaid0 = owed,
                TokenSide::Token1 => outcome.repaid1 = owed,
            }
        }

        Ok(outcome)
    }

    /// The pool's fee is authoritative; a disagreement is only reported.
    /// Returns the sides whose reported fee did not match.
    fn cross_check_fees(&self, gateway: &dyn PoolGateway, loan: &PendingLoan) -> Vec<TokenSide> {
        let rate = match gateway.pool_fee(loan.lending_pool) {
            Ok(rate) => rate,
            Err(e) => {
                debug!("Fee cross-check skipped: {}", e);
                return Vec::new();
            }
        };

        let mut mismatched = Vec::new();
        for (side, _, principal, reported) in loan.obligations() {
            match borrow_fee(principal, rate) {
                Ok(expected) if expected != reported => {
                    warn!(
                        "⚠️ Pool reported {} fee {} but {} at rate {} implies {}",
                        side, reported, principal, rate, expected
                    );
                    mismatched.push(side);
                }
                Ok(_) => {}
                Err(e) => {
                    warn!("⚠️ Could not recompute {} fee: {}", side, e);
                    mismatched.push(side);
                }
            }
        }
        mismatched
    }
}
