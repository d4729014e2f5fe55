// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `status` reports pairing state locally, then queries the daemon's own
//! `/health` endpoint if it's reachable.

use edgebridge::secret;

#[derive(clap::Args)]
pub struct StatusArgs {
    /// Base URL of the running daemon's local API server.
    #[arg(long, default_value = "http://127.0.0.1:8081")]
    pub api_url: String,
}

pub async fn run(args: StatusArgs) -> i32 {
    let identity = match secret::load() {
        Ok(identity) => identity,
        Err(e) => {
            eprintln!("error: failed to read credential store: {e}");
            return 1;
        }
    };

    match &identity {
        Some(identity) => println!("paired: device {}", identity.device_id),
        None => println!("paired: no (run `edgebridge-ctl pair <code>`)"),
    }

    let url = format!("{}/health", args.api_url.trim_end_matches('/'));
    match reqwest::get(&url).await {
        Ok(response) => {
            let status = response.status();
            match response.json::<serde_json::Value>().await {
                Ok(body) => println!("daemon: http {status} — {body}"),
                Err(_) => println!("daemon: http {status}"),
            }
        }
        Err(e) => {
            println!("daemon: unreachable ({e})");
        }
    }

    if identity.is_none() {
        return 3;
    }
    0
}
