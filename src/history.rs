// Copyright (C) 2025 Category Labs, Inc.
// SPDX-License-Identifier: GPL-3.0-or-later

//! Settlement journal with JSON persistence.

use crate::error::SettlementError;
use crate::settlement::{LoanRequest, SettlementOutcome};
use alloy::primitives::{utils::format_ether, Address, I256};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// One initiate call and how it ended.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SettlementRecord {
    pub scenario: String,
    pub lending_pool: Address,
    pub amount0: String, // U256 as string for serialization
    pub amount1: String,
    pub success: bool,
    /// Signed, primary borrowed token. Empty on revert.
    pub realized_profit: String,
    pub revert_reason: Option<String>,
    pub timestamp: u64,
}

impl SettlementRecord {
    pub fn new(
        scenario: &str,
        request: &LoanRequest,
        result: &Result<SettlementOutcome, SettlementError>,
    ) -> Self {
        let (success, realized_profit, revert_reason) = match result {
            Ok(outcome) => (outcome.success, outcome.realized_profit.to_string(), None),
            Err(e) => (false, String::new(), Some(e.revert_reason())),
        };

        Self {
            scenario: scenario.to_string(),
            lending_pool: request.lending_pool,
            amount0: request.amount0.to_string(),
            amount1: request.amount1.to_string(),
            success,
            realized_profit,
            revert_reason,
            timestamp: chrono::Utc::now().timestamp() as u64,
        }
    }
}

/// Settlement journal backed by a JSON file.
#[derive(Debug)]
pub struct SettlementHistory {
    path: PathBuf,
    records: Vec<SettlementRecord>,
}

impl SettlementHistory {
    /// Load history from `path` or start empty.
    pub fn load(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref().to_path_buf();
        let records = match fs::read_to_string(&path) {
            Ok(contents) => serde_json::from_str(&contents).unwrap_or_else(|e| {
                warn!("Failed to parse {}: {}", path.display(), e);
                Vec::new()
            }),
            Err(_) => {
                info!("No settlement history at {}, starting fresh", path.display());
                Vec::new()
            }
        };

        info!("📊 Loaded {} historical settlements", records.len());
        Self { path, records }
    }

    pub fn records(&self) -> &[SettlementRecord] {
        &self.records
    }

    pub fn save(&self) -> Result<(), String> {
        let json = serde_json::to_string_pretty(&self.records)
            .map_err(|e| format!("Failed to serialize settlements: {}", e))?;
        fs::write(&self.path, json)
            .map_err(|e| format!("Failed to write {}: {}", self.path.display(), e))?;
        Ok(())
    }

    /// Append a record and persist. Write failures are logged, not returned.
    pub fn record(&mut self, record: SettlementRecord) {
        match &record.revert_reason {
            None => info!(
                "📝 Recording {} settlement: profit {}",
                record.scenario, record.realized_profit
            ),
            Some(reason) => info!(
                "📝 Recording {} revert: {}",
                record.scenario, reason
            ),
        }

        self.records.push(record);

        if let Err(e) = self.save() {
            warn!("Failed to save settlements: {}", e);
        }
    }

    pub fn summary(&self) -> HistorySummary {
        let settled = self.records.iter().filter(|r| r.success).count();
        let net_profit = self
            .records
            .iter()
            .filter(|r| r.success)
            .filter_map(|r| I256::from_dec_str(&r.realized_profit).ok())
            .fold(I256::ZERO, |acc, profit| acc.saturating_add(profit));

        HistorySummary {
            settled,
            reverted: self.records.len() - settled,
            net_profit,
        }
    }

    pub fn log_summary(&self) {
        let summary = self.summary();
        info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
        info!("📊 Settlement History:");
        info!("   Settled: {}", summary.settled);
        info!("   Reverted: {}", summary.reverted);
        let magnitude = format_ether(summary.net_profit.unsigned_abs());
        if summary.net_profit.is_negative() {
            info!("   Net P/L: -{} WETH", magnitude);
        } else {
            info!("   Net P/L: {} WETH", magnitude);
        }
        info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HistorySummary {
    pub settled: usize,
    pub reverted: usize,
    /// Sum of realized profit over settled records.
    pub net_profit: I256,
}
