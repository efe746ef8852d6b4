// Copyright (C) 2025 Category Labs, Inc.
// SPDX-License-Identifier: GPL-3.0-or-later

//! Flash swap harness - runs one settlement scenario against a simulated fork.

use alloy::primitives::utils::format_ether;
use alloy::primitives::{Address, Bytes, I256, U256};
use anyhow::{anyhow, bail};
use clap::{Parser, ValueEnum};
use flash_swap::arbitrage::ArbitrageRoute;
use flash_swap::config::{parse_weth, Config};
use flash_swap::history::{SettlementHistory, SettlementRecord};
use flash_swap::rpc::{create_provider, fetch_pool_snapshot};
use flash_swap::sim::{PoolSnapshot, SimulatedChain};
use flash_swap::{LoanRequest, SettlementEngine};
use std::path::PathBuf;
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// Operator account that owns the engine.
const OPERATOR: Address = Address::repeat_byte(0x0f);
/// Account the engine holds funds and makes calls from.
const ENGINE_ACCOUNT: Address = Address::repeat_byte(0xf5);

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Scenario {
    /// Borrow with no route and nothing held: must revert on settlement.
    NoFunding,
    /// Borrow with no route, fee covered by pre-funded WETH.
    Prefunded,
    /// Borrow WETH and round-trip it through the two route pools.
    RoundTrip,
}

impl Scenario {
    fn name(self) -> &'static str {
        match self {
            Scenario::NoFunding => "no-funding",
            Scenario::Prefunded => "prefunded",
            Scenario::RoundTrip => "round-trip",
        }
    }
}

#[derive(Debug, Parser)]
#[command(name = "flash-swap", about = "Flash loan arbitrage settlement harness")]
struct Args {
    #[arg(long, value_enum, default_value_t = Scenario::RoundTrip)]
    scenario: Scenario,

    /// WETH to borrow, e.g. "1" or "2.5".
    #[arg(long)]
    borrow: Option<String>,

    /// WETH minted to the engine before the loan.
    #[arg(long)]
    prefund: Option<String>,

    /// Settlement journal path.
    #[arg(long)]
    history: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let args = Args::parse();
    let config = Config::from_env().map_err(|e| {
        error!("Failed to load config: {}", e);
        anyhow!(e)
    })?;

    let borrow = match &args.borrow {
        Some(amount) => parse_weth(amount).map_err(|e| anyhow!(e))?,
        None => config.borrow_amount,
    };
    let prefund = match (&args.prefund, args.scenario) {
        (Some(amount), _) => parse_weth(amount).map_err(|e| anyhow!(e))?,
        (None, Scenario::Prefunded) if config.prefund_amount.is_zero() => {
            parse_weth("1.1").map_err(|e| anyhow!(e))?
        }
        (None, _) => config.prefund_amount,
    };
    let history_path = args.history.clone().unwrap_or(config.history_file.clone());

    info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    info!("⚡ Flash swap harness");
    info!("   Scenario: {}", args.scenario.name());
    info!("   Lending pool: {}", config.lending_pool);
    info!("   Borrow: {} WETH", format_ether(borrow));
    info!("   Prefund: {} WETH", format_ether(prefund));
    info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    let snapshots = load_snapshots(&config).await?;
    let chain = SimulatedChain::new();
    for snapshot in &snapshots {
        chain.load_pool(snapshot);
    }

    let lending = &snapshots[0];
    let (amount0, amount1) = if lending.token0 == config.weth_address {
        (borrow, U256::ZERO)
    } else if lending.token1 == config.weth_address {
        (U256::ZERO, borrow)
    } else {
        bail!("Lending pool {} does not hold WETH", lending.address);
    };

    let route_params = match args.scenario {
        Scenario::NoFunding | Scenario::Prefunded => Bytes::new(),
        Scenario::RoundTrip => ArbitrageRoute {
            intermediate_token: config.usdc_address,
            pool_a: config.route_pool_a,
            pool_b: config.route_pool_b,
            fee_tier_a: snapshots[1].fee,
            fee_tier_b: snapshots[2].fee,
            min_out1: config.min_out_1,
            min_out2: config.min_out_2,
        }
        .encode(),
    };

    if args.scenario == Scenario::NoFunding && !prefund.is_zero() {
        warn!("⚠️ Ignoring prefund for the no-funding scenario");
    } else if !prefund.is_zero() {
        chain.mint(config.weth_address, ENGINE_ACCOUNT, prefund);
    }

    let engine = SettlementEngine::new(OPERATOR);
    let gateway = chain.gateway(ENGINE_ACCOUNT);
    let request = LoanRequest {
        lending_pool: config.lending_pool,
        amount0,
        amount1,
        route_params,
    };

    info!("🚀 Initiating flash swap on {}", request.lending_pool);
    let result = chain.transact(|| engine.initiate(&gateway, OPERATOR, request.clone()));

    match &result {
        Ok(outcome) => {
            info!("✅ Flash swap settled");
            info!("   Realized profit: {} WETH", format_signed(outcome.realized_profit));
            info!("   Repaid: {} / {}", outcome.repaid0, outcome.repaid1);
        }
        Err(e) => {
            error!("❌ Flash swap reverted: {}", e.revert_reason());
            error!("   Revert data: {}", e.revert_data());
        }
    }
    info!(
        "💰 Engine WETH balance: {}",
        format_ether(chain.balance_of(config.weth_address, ENGINE_ACCOUNT))
    );

    let mut history = SettlementHistory::load(&history_path);
    history.record(SettlementRecord::new(args.scenario.name(), &request, &result));
    history.log_summary();

    Ok(())
}

/// Pool state for the lending pool and both route pools, in that order.
async fn load_snapshots(config: &Config) -> anyhow::Result<Vec<PoolSnapshot>> {
    let pools = [config.lending_pool, config.route_pool_a, config.route_pool_b];

    let Some(rpc_url) = &config.fork_rpc_url else {
        info!("📦 No FORK_RPC_URL, using built-in pool state");
        return Ok(default_snapshots(config));
    };

    info!("🔗 Reading pool state from {}", rpc_url);
    let provider = create_provider(rpc_url)?;
    let mut snapshots = Vec::with_capacity(pools.len());
    for pool in pools {
        snapshots.push(fetch_pool_snapshot(&provider, pool).await?);
    }
    Ok(snapshots)
}

/// USDC/WETH at 0.05%, 0.3% and 1%, with the two route pools priced apart.
fn default_snapshots(config: &Config) -> Vec<PoolSnapshot> {
    let usdc = |whole: u64| U256::from(whole) * U256::from(1_000_000u64);
    let weth = |whole: u64| U256::from(whole) * U256::from(10u64).pow(U256::from(18));

    let (token0, token1) = if config.usdc_address < config.weth_address {
        (config.usdc_address, config.weth_address)
    } else {
        (config.weth_address, config.usdc_address)
    };
    let snapshot = |address: Address, fee: u32, usdc_reserve: U256, weth_reserve: U256| {
        let (reserve0, reserve1) = if token0 == config.usdc_address {
            (usdc_reserve, weth_reserve)
        } else {
            (weth_reserve, usdc_reserve)
        };
        PoolSnapshot {
            address,
            token0,
            token1,
            fee,
            reserve0,
            reserve1,
        }
    };

    vec![
        snapshot(config.lending_pool, 500, usdc(100_000_000), weth(40_000)),
        snapshot(config.route_pool_a, 3000, usdc(50_000_000), weth(19_600)),
        snapshot(config.route_pool_b, 10_000, usdc(10_000_000), weth(4_100)),
    ]
}

fn format_signed(value: I256) -> String {
    let magnitude = format_ether(value.unsigned_abs());
    if value.is_negative() {
        format!("-{}", magnitude)
    } else {
        magnitude
    }
}
