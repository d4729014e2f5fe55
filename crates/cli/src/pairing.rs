// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `pair` exchanges a one-time code for persistent device credentials and
//! stores them via the same secret store the daemon reads on startup.

use edgebridge::client::{AuthenticatedClient, DeviceInfo};
use edgebridge::model::{DeviceIdentity, Tier};
use edgebridge::secret;

#[derive(clap::Args)]
pub struct PairArgs {
    /// One-time pair code issued by the cloud platform.
    pub code: String,

    /// Cloud base URL to pair against.
    #[arg(long, env = "BRIDGE_SERVER_URL")]
    pub server_url: String,

    /// Tier reported to the cloud during pairing.
    #[arg(long, default_value = "normal")]
    pub tier: String,
}

fn parse_tier(raw: &str) -> Tier {
    match raw {
        "lite" => Tier::Lite,
        "full" => Tier::Full,
        _ => Tier::Normal,
    }
}

pub async fn pair(args: PairArgs) -> i32 {
    let tier = parse_tier(&args.tier);
    let hostname = hostname();
    let info = DeviceInfo { hostname, platform: std::env::consts::OS.to_owned(), version: env!("CARGO_PKG_VERSION").to_owned(), tier };

    let client = AuthenticatedClient::new(args.server_url);
    let response = match client.pair(&args.code, &info).await {
        Ok(response) => response,
        Err(e) => {
            eprintln!("error: pairing failed: {e}");
            return 1;
        }
    };

    let identity = DeviceIdentity { device_id: response.device_id.clone(), device_key: response.device_key.clone() };
    if let Err(e) = secret::save(&identity) {
        eprintln!("error: paired but failed to persist credentials: {e}");
        return 1;
    }

    println!("paired as device {}", response.device_id);
    if let Some(overrides) = response.config {
        println!("cloud supplied config overrides: {overrides}");
    }
    0
}

pub fn unpair() -> i32 {
    match secret::clear() {
        Ok(()) => {
            println!("credentials removed, device is now unpaired");
            0
        }
        Err(e) => {
            eprintln!("error: failed to clear credentials: {e}");
            1
        }
    }
}

fn hostname() -> String {
    std::env::var("HOSTNAME")
        .ok()
        .or_else(|| std::fs::read_to_string("/etc/hostname").ok().map(|s| s.trim().to_owned()))
        .unwrap_or_else(|| "unknown-host".to_owned())
}
