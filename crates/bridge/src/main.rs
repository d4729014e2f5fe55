// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use clap::Parser;
use edgebridge::config::{BridgeArgs, BridgeConfig};

#[tokio::main]
async fn main() {
    let args = BridgeArgs::parse();

    let config = match BridgeConfig::load(&args.config) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("fatal: loading config {}: {e}", args.config.display());
            std::process::exit(1);
        }
    };

    let log_level = args.log_level.as_deref().unwrap_or(config.log_level.as_str());
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .init();

    if let Err(e) = edgebridge::run(config).await {
        tracing::error!("fatal: {e:#}");
        std::process::exit(1);
    }
}
