// Copyright (C) 2025 Category Labs, Inc.
// SPDX-License-Identifier: GPL-3.0-or-later

//! Token balances of the simulated fork.

use alloy::primitives::{Address, U256};
use std::collections::{HashMap, HashSet};
use thiserror::Error;

/// A revert raised inside the simulated chain, with its reason string.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("reverted: {0}")]
pub struct ChainRevert(pub String);

impl ChainRevert {
    pub fn new(reason: impl Into<String>) -> Self {
        Self(reason.into())
    }
}

/// How a token signals a failed transfer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TokenKind {
    /// Reverts.
    #[default]
    Standard,
    /// Returns `false` and moves nothing (USDT-style).
    ReturnsFalse,
}

/// Outcome of a transfer that did not revert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transfer {
    Done,
    Refused,
}

#[derive(Debug, Clone, Default)]
pub struct Ledger {
    balances: HashMap<(Address, Address), U256>,
    kinds: HashMap<Address, TokenKind>,
    frozen: HashSet<(Address, Address)>,
}

impl Ledger {
    pub fn set_kind(&mut self, token: Address, kind: TokenKind) {
        self.kinds.insert(token, kind);
    }

    pub fn kind(&self, token: Address) -> TokenKind {
        self.kinds.get(&token).copied().unwrap_or_default()
    }

    /// Block every outgoing transfer of `token` from `holder`.
    pub fn freeze(&mut self, token: Address, holder: Address) {
        self.frozen.insert((token, holder));
    }

    pub fn balance(&self, token: Address, holder: Address) -> U256 {
        self.balances
            .get(&(token, holder))
            .copied()
            .unwrap_or_default()
    }

    pub fn mint(&mut self, token: Address, to: Address, amount: U256) {
        let balance = self.balances.entry((token, to)).or_default();
        *balance = balance.saturating_add(amount);
    }

    /// Move `amount` of `token`. Failures revert or return `Refused` depending
    /// on the token's [`TokenKind`].
    pub fn transfer(
        &mut self,
        token: Address,
        from: Address,
        to: Address,
        amount: U256,
    ) -> Result<Transfer, ChainRevert> {
        let from_balance = self.balance(token, from);
        let failure = if self.frozen.contains(&(token, from)) {
            Some("transfer frozen")
        } else if from_balance < amount {
            Some("ERC20: transfer amount exceeds balance")
        } else {
            None
        };

        if let Some(reason) = failure {
            return match self.kind(token) {
                TokenKind::Standard => Err(ChainRevert::new(reason)),
                TokenKind::ReturnsFalse => Ok(Transfer::Refused),
            };
        }

        if from != to {
            self.balances.insert((token, from), from_balance - amount);
            self.mint(token, to, amount);
        }
        Ok(Transfer::Done)
    }
}
