// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `leash run [--step NAME]...` - Run runbook steps with their leases

use crate::pool::{self, Client, LeaseArgs};
use anyhow::{bail, Result};
use clap::Args;
use leash_adapters::PoolClient;
use leash_core::Clock;
use leash_engine::{
    Cancellation, CoordinatorConfig, LeaseCoordinator, RunExit, ShellWorkload, ShutdownReleaser,
    StepError, StepLifecycle, StepReport,
};
use leash_runbook::{load_runbook, Runbook, StepDef};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tokio::task::JoinSet;

/// Exit status after SIGINT/SIGTERM
const INTERRUPTED: u8 = 130;

#[derive(Args)]
pub struct RunArgs {
    /// Runbook file
    #[arg(short, long, default_value = "leash.toml")]
    pub config: PathBuf,

    /// Step to run; repeat for several (default: every step)
    #[arg(short, long = "step", value_name = "NAME")]
    pub steps: Vec<String>,

    #[command(flatten)]
    pub lease: LeaseArgs,
}

pub async fn run(args: RunArgs) -> Result<ExitCode> {
    let runbook = load_runbook(&args.config)?;
    let base_dir = runbook_dir(&args.config);
    let steps = select_steps(&runbook, &args.steps)?;
    let pool = args.lease.apply(&runbook.pool, &base_dir);
    let workload = ShellWorkload::with_base_dir(&base_dir);
    let cancel = Cancellation::new();

    let Some(client) = pool::connect(&pool)? else {
        // Reported before anything is acquired
        if let Some(step) = steps.iter().find(|s| s.needs_leases()) {
            bail!("step {}: {}", step.name, StepError::NoLeaseClient);
        }
        let lifecycle = StepLifecycle::<Client>::new(None, cancel);
        let reports = run_steps(lifecycle, steps, workload).await;
        return Ok(summarize(&reports));
    };

    let coordinator = LeaseCoordinator::new(client, CoordinatorConfig::from_pool(&pool));
    let releaser = ShutdownReleaser::new(coordinator.clone(), cancel.clone());
    let lifecycle = StepLifecycle::new(Some(coordinator), cancel);

    match releaser.run(run_steps(lifecycle, steps, workload)).await? {
        RunExit::Completed(reports) => Ok(summarize(&reports)),
        RunExit::Interrupted { signal, output } => {
            if let Some(reports) = output {
                summarize(&reports);
            }
            eprintln!("Interrupted by {}", signal);
            Ok(ExitCode::from(INTERRUPTED))
        }
    }
}

fn runbook_dir(config: &Path) -> PathBuf {
    match config.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

/// Steps named on the command line in the order given, or every step
fn select_steps(runbook: &Runbook, names: &[String]) -> Result<Vec<StepDef>> {
    if names.is_empty() {
        return Ok(runbook.steps.values().cloned().collect());
    }

    let mut steps: Vec<StepDef> = Vec::with_capacity(names.len());
    for name in names {
        let step = runbook
            .get_step(name)
            .ok_or_else(|| anyhow::anyhow!("unknown step: {}", name))?;
        if !steps.iter().any(|s| s.name == step.name) {
            steps.push(step.clone());
        }
    }
    Ok(steps)
}

/// Run every step concurrently; reports come back in selection order
async fn run_steps<P, C>(
    lifecycle: StepLifecycle<P, C>,
    steps: Vec<StepDef>,
    workload: ShellWorkload,
) -> Vec<StepReport>
where
    P: PoolClient,
    C: Clock,
{
    let mut tasks = JoinSet::new();
    for (index, step) in steps.into_iter().enumerate() {
        let lifecycle = lifecycle.clone();
        let workload = workload.clone();
        tasks.spawn(async move { (index, lifecycle.run(&step, &workload).await) });
    }

    let mut reports = Vec::new();
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok(report) => reports.push(report),
            Err(e) => tracing::error!(error = %e, "step task failed"),
        }
    }
    reports.sort_by_key(|(index, _)| *index);
    reports.into_iter().map(|(_, report)| report).collect()
}

fn summarize(reports: &[StepReport]) -> ExitCode {
    let mut failed = 0;
    for report in reports {
        match &report.outcome {
            Ok(()) => println!("{}: ok", report.name),
            Err(e) => {
                failed += 1;
                println!("{}: failed: {}", report.name, e);
            }
        }
        for (lease, error) in &report.release.failed {
            println!("  lease {} not released: {}", lease, error);
        }
    }

    if failed == 0 {
        ExitCode::SUCCESS
    } else {
        eprintln!("{} of {} step(s) failed", failed, reports.len());
        ExitCode::FAILURE
    }
}
