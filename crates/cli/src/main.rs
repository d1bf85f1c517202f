// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! leash - lease pooled CI resources around step execution

mod commands;
mod pool;

use anyhow::Result;
use clap::{Parser, Subcommand};
use commands::{run, validate};
use std::io::IsTerminal;
use std::process::ExitCode;

#[derive(Parser)]
#[command(
    name = "leash",
    version,
    about = "Leash - Lease pooled CI resources around step execution"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run steps from a runbook, holding their leases while they run
    Run(run::RunArgs),
    /// Check a runbook without contacting the pool
    Validate(validate::ValidateArgs),
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    setup_logging();

    match cli.command {
        Commands::Run(args) => run::run(args).await,
        Commands::Validate(args) => {
            validate::validate(args)?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn setup_logging() {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_ansi(std::io::stderr().is_terminal())
                .with_target(false),
        )
        .init();
}
