// Copyright (C) 2025 Category Labs, Inc.
// SPDX-License-Identifier: GPL-3.0-or-later

//! Settlement failure taxonomy.

use alloy::primitives::{hex, Address, Bytes, U256};
use alloy::sol_types::{Revert, SolError};
use thiserror::Error;

/// Which side of the pool a token sits on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenSide {
    Token0,
    Token1,
}

impl std::fmt::Display for TokenSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TokenSide::Token0 => write!(f, "token0"),
            TokenSide::Token1 => write!(f, "token1"),
        }
    }
}

/// Every way a settlement attempt can fail.
///
/// All variants are fatal to the current attempt; nothing is retried here.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SettlementError {
    #[error("a flash swap is already pending")]
    AlreadyPending,

    #[error("unauthorized flash callback from {caller}")]
    UnauthorizedCallback { caller: Address },

    #[error("malformed route: {0}")]
    MalformedRoute(String),

    #[error("slippage exceeded on pool {pool}: wanted at least {min_amount_out}")]
    SlippageExceeded { pool: Address, min_amount_out: U256 },

    #[error("pool {pool} call failed: {}", decode_revert(.payload))]
    PoolCallFailed { pool: Address, payload: Bytes },

    #[error("arithmetic overflow")]
    ArithmeticOverflow,

    #[error("insufficient funds post-arbitrage for {token}: held {held}, owed {owed}")]
    InsufficientFunds { token: Address, held: U256, owed: U256 },

    #[error("{side} transfer failed: {amount} of {token}")]
    RepaymentTransferFailed {
        token: Address,
        amount: U256,
        side: TokenSide,
    },

    #[error("nothing to borrow: both amounts are zero")]
    ZeroBorrow,

    #[error("caller {caller} is not the owner")]
    NotOwner { caller: Address },
}

impl SettlementError {
    /// Revert string the settlement contract reports for this failure.
    pub fn revert_reason(&self) -> String {
        match self {
            Self::AlreadyPending => "flash swap pending".to_string(),
            Self::UnauthorizedCallback { .. } => "unauthorized callback".to_string(),
            Self::MalformedRoute(_) => "malformed route".to_string(),
            Self::SlippageExceeded { .. } => "Too little received".to_string(),
            Self::PoolCallFailed { payload, .. } => decode_revert(payload),
            Self::ArithmeticOverflow => "arithmetic overflow".to_string(),
            Self::InsufficientFunds { .. } => "insufficient funds post-arbitrage".to_string(),
            Self::RepaymentTransferFailed { side, .. } => format!("{} transfer failed", side),
            Self::ZeroBorrow => "zero borrow".to_string(),
            Self::NotOwner { .. } => "not owner".to_string(),
        }
    }

    /// Revert payload as the host would surface it.
    ///
    /// Pool failures pass the collaborator's raw payload through unmodified.
    pub fn revert_data(&self) -> Bytes {
        match self {
            Self::PoolCallFailed { payload, .. } => payload.clone(),
            other => revert_with(&other.revert_reason()),
        }
    }
}

/// ABI-encode `Error(string)`.
pub fn revert_with(reason: &str) -> Bytes {
    Revert {
        reason: reason.to_string(),
    }
    .abi_encode()
    .into()
}

/// Render any revert payload for diagnostics.
pub fn decode_revert(data: &[u8]) -> String {
    if data.is_empty() {
        return "reverted with no data".to_string();
    }

    if let Ok(revert) = Revert::abi_decode(data) {
        return revert.reason;
    }

    format!("unknown revert: 0x{}", hex::encode(data))
}
