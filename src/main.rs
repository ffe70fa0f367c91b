// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
mod cli;

use clap::Parser;
use rand::distributions::Alphanumeric;
use rand::Rng;
use tracing_subscriber::{filter::EnvFilter, fmt, prelude::*};

use candor_gateway::AppState;
use cli::{Cli, Commands};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Some(Commands::ShowConfig) => {
            let settings = candor_config::load(cli.config.as_deref())?;
            println!("{}", serde_yaml::to_string(&settings).unwrap_or_default());
            Ok(())
        }
        Some(Commands::MintSecret) => {
            let secret: String = rand::thread_rng()
                .sample_iter(&Alphanumeric)
                .take(48)
                .map(char::from)
                .collect();
            println!("{secret}");
            Ok(())
        }
        Some(Commands::Serve { bind }) => serve(cli.config.as_deref(), bind).await,
        None => serve(cli.config.as_deref(), None).await,
    }
}

async fn serve(config: Option<&std::path::Path>, bind: Option<String>) -> anyhow::Result<()> {
    let mut settings = candor_config::load(config)?;
    if let Some(bind) = bind {
        settings.server.bind = bind;
    }
    let state = AppState::from_settings(settings);
    candor_gateway::serve(state).await
}

/// `CANDOR_LOG` wins, then `RUST_LOG`, then `--verbose` (debug) or the
/// quiet default (warn).
fn init_logging(verbose: bool) {
    let filter = std::env::var("CANDOR_LOG")
        .or_else(|_| std::env::var("RUST_LOG"))
        .ok()
        .map(EnvFilter::new)
        .unwrap_or_else(|| {
            if verbose {
                EnvFilter::new("debug")
            } else {
                EnvFilter::new("warn")
            }
        });
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}
