// Copyright (C) 2025 Category Labs, Inc.
// SPDX-License-Identifier: GPL-3.0-or-later

//! Configuration module - loads settings from environment variables.

use alloy::primitives::utils::parse_ether;
use alloy::primitives::{Address, U256};
use std::path::PathBuf;
use std::str::FromStr;

/// Main configuration for the flash swap harness.
#[derive(Debug, Clone)]
pub struct Config {
    // Fork
    pub fork_rpc_url: Option<String>,

    // Tokens
    pub weth_address: Address,
    pub usdc_address: Address,

    // Pools
    pub lending_pool: Address,
    pub route_pool_a: Address,
    pub route_pool_b: Address,

    // Amounts (wei)
    pub borrow_amount: U256,
    pub prefund_amount: U256,
    pub min_out_1: U256,
    pub min_out_2: U256,

    // Output
    pub history_file: PathBuf,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, String> {
        dotenvy::dotenv().ok();

        Ok(Self {
            // Fork
            fork_rpc_url: std::env::var("FORK_RPC_URL")
                .ok()
                .filter(|url| !url.is_empty()),

            // Tokens
            weth_address: parse_address(&env_var_or(
                "WETH_ADDRESS",
                "0xC02aaA39b223FE8D0A0e5C4F27eAD9083C756Cc2",
            ))?,
            usdc_address: parse_address(&env_var_or(
                "USDC_ADDRESS",
                "0xA0b86991c6218b36c1d19D4a2e9Eb0cE3606eB48",
            ))?,

            // Pools: USDC/WETH 0.05%, 0.3% and 1%
            lending_pool: parse_address(&env_var_or(
                "LENDING_POOL",
                "0x88e6A0c2dDD26FEEb64F039a2c41296FcB3f5640",
            ))?,
            route_pool_a: parse_address(&env_var_or(
                "ROUTE_POOL_A",
                "0x8ad599c3A0ff1De082011EFDDc58f1908eb6e6D8",
            ))?,
            route_pool_b: parse_address(&env_var_or(
                "ROUTE_POOL_B",
                "0x7BeA39867e4169DBe237d55C8242a8f2fcDcc387",
            ))?,

            // Amounts
            borrow_amount: parse_weth(&env_var_or("BORROW_AMOUNT_WETH", "1"))?,
            prefund_amount: parse_weth(&env_var_or("PREFUND_WETH", "0"))?,
            min_out_1: parse_wei(&env_var_or("ROUTE_MIN_OUT_1", "0"))?,
            min_out_2: parse_wei(&env_var_or("ROUTE_MIN_OUT_2", "0"))?,

            // Output
            history_file: PathBuf::from(env_var_or("HISTORY_FILE", "settlements.json")),
        })
    }
}

fn env_var_or(name: &str, default: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| default.to_string())
}

fn parse_address(s: &str) -> Result<Address, String> {
    Address::from_str(s).map_err(|e| format!("Invalid address {}: {}", s, e))
}

/// Decimal WETH amount ("1.1") to wei.
pub fn parse_weth(s: &str) -> Result<U256, String> {
    parse_ether(s.trim()).map_err(|e| format!("Invalid WETH amount {}: {}", s, e))
}

fn parse_wei(s: &str) -> Result<U256, String> {
    U256::from_str(s.trim()).map_err(|e| format!("Invalid amount {}: {}", s, e))
}
