// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

pub mod adapter;
pub mod client;
pub mod config;
pub mod coordinator;
pub mod door;
pub mod error;
pub mod health;
pub mod manager;
pub mod model;
pub mod processor;
pub mod queue;
pub mod secret;
pub mod submission;
pub mod tier;

use config::BridgeConfig;
use coordinator::BridgeCoordinator;

/// Runs the daemon to completion: loads identity, starts the coordinator,
/// binds the local API server, and blocks until SIGINT/SIGTERM.
pub async fn run(config: BridgeConfig) -> anyhow::Result<()> {
    let identity = secret::load()?;
    if identity.is_none() {
        tracing::warn!("starting unpaired: door-control endpoint is active, submissions are refused");
    }

    let coordinator = BridgeCoordinator::start(&config, identity).await?;

    let api = config.api_server.clone();
    let coordinator_for_signals = coordinator.clone();
    let sigint = tokio::spawn(async move {
        let _ = tokio::signal::ctrl_c().await;
        coordinator_for_signals.shutdown().await;
    });

    if api.enabled {
        coordinator.serve(&api.host, api.port).await?;
    } else {
        sigint.await.ok();
    }
    Ok(())
}
