// Copyright (C) 2025 Category Labs, Inc.
// SPDX-License-Identifier: GPL-3.0-or-later

//! Two-leg route carried in the flash loan's opaque data.

use crate::error::SettlementError;
use crate::math::MAX_FEE_RATE;
use alloy::primitives::aliases::U24;
use alloy::primitives::{Address, Bytes, U256};
use alloy::sol;
use alloy::sol_types::SolValue;

// abi.decode(data, (address, address, address, uint24, uint24, uint256, uint256))
sol! {
    struct RouteParams {
        address intermediateToken;
        address poolA;
        address poolB;
        uint24 feeTierA;
        uint24 feeTierB;
        uint256 minOut1;
        uint256 minOut2;
    }
}

const WORD: usize = 32;

/// Encoded size of [`RouteParams`]: seven static words.
pub const ROUTE_PARAMS_LEN: usize = 7 * WORD;

/// Round trip: borrowed token -> intermediate on `pool_a`, back on `pool_b`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArbitrageRoute {
    pub intermediate_token: Address,
    pub pool_a: Address,
    pub pool_b: Address,
    pub fee_tier_a: u32,
    pub fee_tier_b: u32,
    /// Slippage floor for leg 1.
    pub min_out1: U256,
    /// Slippage floor for leg 2.
    pub min_out2: U256,
}

/// What the engine does with the borrowed funds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    /// No swaps; settle with whatever is already held. Diagnostic runs only.
    Empty,
    RoundTrip(ArbitrageRoute),
}

impl Route {
    /// Decode route bytes. An empty blob is the no-op route.
    pub fn decode(data: &[u8]) -> Result<Self, SettlementError> {
        if data.is_empty() {
            return Ok(Route::Empty);
        }
        ArbitrageRoute::decode(data).map(Route::RoundTrip)
    }

    /// Check the route against the tokens actually borrowed.
    pub fn validate(&self, borrowed: &[Address]) -> Result<(), SettlementError> {
        match self {
            Route::Empty => Ok(()),
            Route::RoundTrip(route) => route.validate(borrowed),
        }
    }
}

impl ArbitrageRoute {
    /// Decode the fixed seven-word layout.
    pub fn decode(data: &[u8]) -> Result<Self, SettlementError> {
        if data.len() != ROUTE_PARAMS_LEN {
            return Err(SettlementError::MalformedRoute(format!(
                "expected {} bytes, got {}",
                ROUTE_PARAMS_LEN,
                data.len()
            )));
        }

        // address words carry 12 zero bytes of padding, uint24 words 29
        for (index, word) in data.chunks_exact(WORD).enumerate() {
            let padding = match index {
                0..=2 => 12,
                3 | 4 => 29,
                _ => 0,
            };
            if word[..padding].iter().any(|b| *b != 0) {
                return Err(SettlementError::MalformedRoute(format!(
                    "word {} is not canonically padded",
                    index
                )));
            }
        }

        let params = RouteParams::abi_decode(data)
            .map_err(|e| SettlementError::MalformedRoute(e.to_string()))?;

        let route = Self {
            intermediate_token: params.intermediateToken,
            pool_a: params.poolA,
            pool_b: params.poolB,
            fee_tier_a: params.feeTierA.to::<u32>(),
            fee_tier_b: params.feeTierB.to::<u32>(),
            min_out1: params.minOut1,
            min_out2: params.minOut2,
        };

        for tier in [route.fee_tier_a, route.fee_tier_b] {
            if tier > MAX_FEE_RATE {
                return Err(SettlementError::MalformedRoute(format!(
                    "fee tier {} out of range",
                    tier
                )));
            }
        }

        Ok(route)
    }

    /// Encode into the layout [`ArbitrageRoute::decode`] expects.
    pub fn encode(&self) -> Bytes {
        RouteParams {
            intermediateToken: self.intermediate_token,
            poolA: self.pool_a,
            poolB: self.pool_b,
            feeTierA: U24::saturating_from(self.fee_tier_a),
            feeTierB: U24::saturating_from(self.fee_tier_b),
            minOut1: self.min_out1,
            minOut2: self.min_out2,
        }
        .abi_encode()
        .into()
    }

    pub fn validate(&self, borrowed: &[Address]) -> Result<(), SettlementError> {
        if self.pool_a == self.pool_b {
            return Err(SettlementError::MalformedRoute(
                "both legs use the same pool".to_string(),
            ));
        }
        if borrowed.contains(&self.intermediate_token) {
            return Err(SettlementError::MalformedRoute(format!(
                "intermediate token {} is a borrowed token",
                self.intermediate_token
            )));
        }
        Ok(())
    }
}
