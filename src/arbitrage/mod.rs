// Copyright (C) 2025 Category Labs, Inc.
// SPDX-License-Identifier: GPL-3.0-or-later

//! Arbitrage routes executed inside a flash loan.

pub mod route;

pub use route::{ArbitrageRoute, Route, RouteParams, ROUTE_PARAMS_LEN};
