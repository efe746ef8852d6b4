// Copyright (C) 2025 Category Labs, Inc.
// SPDX-License-Identifier: GPL-3.0-or-later

//! Single inbound entrypoint for pool flash callbacks.

use crate::error::SettlementError;
use crate::gateway::{FlashBorrower, PoolGateway};
use crate::settlement::SettlementEngine;
use alloy::primitives::{Address, Bytes, U256};
use tracing::warn;

/// Routes a pool's callback to the engine iff a loan is outstanding.
///
/// Every pool integration goes through this guard, so a callback nobody asked
/// for is refused before it can touch a balance.
pub struct CallbackDispatcher<'e> {
    engine: &'e SettlementEngine,
}

impl<'e> CallbackDispatcher<'e> {
    pub fn new(engine: &'e SettlementEngine) -> Self {
        Self { engine }
    }
}

impl FlashBorrower for CallbackDispatcher<'_> {
    fn on_flash(
        &self,
        gateway: &dyn PoolGateway,
        caller: Address,
        fee0: U256,
        fee1: U256,
        data: &Bytes,
    ) -> Result<(), SettlementError> {
        if self.engine.is_idle() {
            warn!("⛔ Flash callback from {} with no pending loan", caller);
            return Err(SettlementError::UnauthorizedCallback { caller });
        }
        self.engine
            .on_loan_received(gateway, caller, fee0, fee1, data)
    }
}
