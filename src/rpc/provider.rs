// Copyright (C) 2025 Category Labs, Inc.
// SPDX-License-Identifier: GPL-3.0-or-later

//! HTTP provider for fork reads.

use alloy::{
    providers::{Provider, ProviderBuilder},
    transports::http::reqwest::Url,
};
use anyhow::Context;

/// Create a read-only provider. No signer: nothing is ever sent.
pub fn create_provider(rpc_url: &str) -> anyhow::Result<impl Provider + Clone> {
    let url: Url = rpc_url
        .parse()
        .with_context(|| format!("Invalid RPC URL: {}", rpc_url))?;

    Ok(ProviderBuilder::new().connect_http(url))
}
