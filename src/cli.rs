// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "candor",
    about = "AI mock-interview session engine with tamper-evident anti-cheat",
    version,
    long_about = None,
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Path to an explicit config file (merged over the discovered layers).
    #[arg(long, short = 'c', global = true)]
    pub config: Option<PathBuf>,

    /// Log to stderr at debug level (or set CANDOR_LOG / RUST_LOG).
    #[arg(long, short = 'v', global = true)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the HTTP/WebSocket gateway (the default when no command is
    /// given).
    Serve {
        /// Override the configured bind address, e.g. 0.0.0.0:8480.
        #[arg(long)]
        bind: Option<String>,
    },

    /// Print the effective configuration (after layer merging) and exit.
    ShowConfig,

    /// Generate a fresh token-signing secret.
    ///
    /// Put the output in `auth.signing_secret` (or the environment variable
    /// named by `auth.signing_secret_env`).  Rotating the secret
    /// invalidates every outstanding token at once.
    MintSecret,
}
