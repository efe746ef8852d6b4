// Copyright (C) 2025 Category Labs, Inc.
// SPDX-License-Identifier: GPL-3.0-or-later

//! Pool state reads.

use crate::sim::PoolSnapshot;
use alloy::primitives::Address;
use alloy::providers::Provider;
use alloy::sol;
use anyhow::Context;
use tracing::debug;

sol! {
    #[sol(rpc)]
    interface IUniswapV3Pool {
        function token0() external view returns (address);
        function token1() external view returns (address);
        function fee() external view returns (uint24);
    }
}

sol! {
    #[sol(rpc)]
    interface IERC20 {
        function balanceOf(address account) external view returns (uint256);
    }
}

/// Read a pool's tokens, fee tier and token balances.
///
/// Balances stand in for reserves; the simulation prices on them directly.
pub async fn fetch_pool_snapshot<P: Provider + Clone>(
    provider: &P,
    pool: Address,
) -> anyhow::Result<PoolSnapshot> {
    let contract = IUniswapV3Pool::new(pool, provider);

    let token0 = contract
        .token0()
        .call()
        .await
        .with_context(|| format!("token0() failed for pool {}", pool))?;
    let token1 = contract
        .token1()
        .call()
        .await
        .with_context(|| format!("token1() failed for pool {}", pool))?;
    let fee = contract
        .fee()
        .call()
        .await
        .with_context(|| format!("fee() failed for pool {}", pool))?;

    let reserve0 = IERC20::new(token0, provider)
        .balanceOf(pool)
        .call()
        .await
        .with_context(|| format!("balanceOf({}) failed on {}", pool, token0))?;
    let reserve1 = IERC20::new(token1, provider)
        .balanceOf(pool)
        .call()
        .await
        .with_context(|| format!("balanceOf({}) failed on {}", pool, token1))?;

    debug!(
        "🔍 Pool {} | {} / {} | fee {} | reserves {} / {}",
        pool, token0, token1, fee, reserve0, reserve1
    );

    Ok(PoolSnapshot {
        address: pool,
        token0,
        token1,
        fee: fee.to::<u32>(),
        reserve0,
        reserve1,
    })
}
