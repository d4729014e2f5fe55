// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use clap::Parser;
use tracing::error;

mod pairing;
mod service;
mod status;

use edgebridge::config::{BridgeArgs, BridgeConfig};

#[derive(Parser)]
#[command(name = "edgebridge-ctl", version, about = "Operator control surface for the edgebridge daemon.")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand)]
enum Commands {
    /// Installs the daemon as a systemd user service.
    Install,
    /// Removes the systemd user service.
    Uninstall,
    /// Starts the installed service.
    Start,
    /// Stops the running service.
    Stop,
    /// Reports pairing state and, if reachable, the local health snapshot.
    Status(status::StatusArgs),
    /// Exchanges a one-time pair code for persistent device credentials.
    Pair(pairing::PairArgs),
    /// Deletes persisted device credentials, returning to "unpaired".
    Unpair,
    /// Runs the daemon in the foreground (what the installed service execs).
    Run {
        #[command(flatten)]
        args: BridgeArgs,
    },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt().with_env_filter(tracing_subscriber::EnvFilter::from_default_env()).init();
    let cli = Cli::parse();

    let code = match cli.command {
        Commands::Install => service::install(),
        Commands::Uninstall => service::uninstall(),
        Commands::Start => service::start(),
        Commands::Stop => service::stop(),
        Commands::Status(args) => status::run(args).await,
        Commands::Pair(args) => pairing::pair(args).await,
        Commands::Unpair => pairing::unpair(),
        Commands::Run { args } => run_foreground(args).await,
    };
    std::process::exit(code);
}

async fn run_foreground(args: BridgeArgs) -> i32 {
    let config = match BridgeConfig::load(&args.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("error: {e}");
            return 2;
        }
    };
    match edgebridge::run(config).await {
        Ok(()) => 0,
        Err(e) => {
            error!("fatal: {e:#}");
            1
        }
    }
}
