// Copyright (C) 2025 Category Labs, Inc.
// SPDX-License-Identifier: GPL-3.0-or-later

//! Fixed-point arithmetic shared by the engine and the simulated pools.

pub mod fee;

pub use fee::{amount_owed, borrow_fee, is_sufficient, FEE_DENOMINATOR, MAX_FEE_RATE};
