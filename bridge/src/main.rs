// Copyright (c) Starcoin, Inc.
// SPDX-License-Identifier: Apache-2.0

use clap::Parser;
use ncg_bridge::config::{BridgeArgs, BridgeConfig};
use ncg_bridge::node::run_bridge_node;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = BridgeArgs::parse();
    let config = match BridgeConfig::from_args(args) {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("invalid configuration: {:?}", e);
            std::process::exit(-1);
        }
    };

    // the daemon only ever returns on a fatal error
    if let Err(e) = run_bridge_node(config).await {
        tracing::error!("bridge node exited: {:?}", e);
        std::process::exit(-1);
    }
}
