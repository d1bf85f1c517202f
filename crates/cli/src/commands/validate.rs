// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `leash validate` - Check a runbook and list its steps

use anyhow::Result;
use clap::Args;
use leash_runbook::load_runbook;
use std::path::PathBuf;

#[derive(Args)]
pub struct ValidateArgs {
    /// Runbook file
    #[arg(short, long, default_value = "leash.toml")]
    pub config: PathBuf,
}

pub fn validate(args: ValidateArgs) -> Result<()> {
    let runbook = load_runbook(&args.config)?;

    if runbook.steps.is_empty() {
        println!("No steps");
        return Ok(());
    }

    println!("{:<20} LEASES", "STEP");
    for (name, step) in &runbook.steps {
        let leases = if step.leases.is_empty() {
            "-".to_string()
        } else {
            step.leases
                .iter()
                .map(|l| format!("{} x{} (${})", l.spec.resource_type(), l.spec.count(), l.env))
                .collect::<Vec<_>>()
                .join(", ")
        };
        println!("{:<20} {}", name, leases);
    }

    if runbook.pool.server.is_none() && runbook.steps.values().any(|s| s.needs_leases()) {
        println!("note: no [pool] server configured; pass --lease-server to run steps with leases");
    }
    Ok(())
}
