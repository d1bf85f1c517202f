// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Step lifecycle: acquire, run, release
//!
//! ```text
//! Pending -> Acquiring -> Running -> Releasing -> Done
//!               |                                  ^
//!               +------------ (failed) ------------+
//! ```
//!
//! Steps without lease requirements go straight from `Pending` to `Running`.
//! Once leases are held, release happens on every exit path.

use crate::cancel::Cancellation;
use crate::coordinator::{LeaseCoordinator, ReleaseReport};
use crate::error::{LeaseError, StepError};
use crate::workload::{StepContext, StepWorkload, WorkloadError};
use leash_adapters::PoolClient;
use leash_core::{Clock, LeaseSet, SystemClock};
use leash_runbook::StepDef;
use std::fmt;
use tokio::task::JoinHandle;
use tracing::Instrument;

/// Where a step is in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepPhase {
    Pending,
    Acquiring,
    Running,
    Releasing,
    Done,
}

impl fmt::Display for StepPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StepPhase::Pending => "pending",
            StepPhase::Acquiring => "acquiring",
            StepPhase::Running => "running",
            StepPhase::Releasing => "releasing",
            StepPhase::Done => "done",
        };
        f.write_str(name)
    }
}

/// Everything that happened to one step
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepReport {
    pub name: String,
    /// Phases entered, in order
    pub phases: Vec<StepPhase>,
    pub outcome: Result<(), StepError>,
    pub release: ReleaseReport,
}

impl StepReport {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            phases: vec![StepPhase::Pending],
            outcome: Ok(()),
            release: ReleaseReport::default(),
        }
    }

    fn enter(&mut self, phase: StepPhase) {
        tracing::debug!(from = ?self.phase(), to = %phase, "step phase");
        self.phases.push(phase);
    }

    pub fn phase(&self) -> StepPhase {
        self.phases.last().copied().unwrap_or(StepPhase::Pending)
    }

    pub fn succeeded(&self) -> bool {
        self.outcome.is_ok()
    }
}

/// Wraps step execution with lease acquisition and release
///
/// Holds the run's coordinator, if a pool is configured, and the run-wide
/// cancellation flag.
pub struct StepLifecycle<P, C = SystemClock> {
    coordinator: Option<LeaseCoordinator<P, C>>,
    cancel: Cancellation,
}

impl<P, C> Clone for StepLifecycle<P, C> {
    fn clone(&self) -> Self {
        Self {
            coordinator: self.coordinator.clone(),
            cancel: self.cancel.clone(),
        }
    }
}

impl<P: PoolClient, C: Clock> StepLifecycle<P, C> {
    pub fn new(coordinator: Option<LeaseCoordinator<P, C>>, cancel: Cancellation) -> Self {
        Self {
            coordinator,
            cancel,
        }
    }

    /// Drive `step` through its lifecycle; never fails, the outcome is in the report
    pub async fn run<W: StepWorkload>(&self, step: &StepDef, workload: &W) -> StepReport {
        let span = tracing::info_span!("step", step = %step.name);
        self.run_inner(step, workload).instrument(span).await
    }

    async fn run_inner<W: StepWorkload>(&self, step: &StepDef, workload: &W) -> StepReport {
        let mut report = StepReport::new(&step.name);

        let held = if step.needs_leases() {
            let Some(coordinator) = &self.coordinator else {
                return fail(report, StepError::NoLeaseClient);
            };

            report.enter(StepPhase::Acquiring);
            match coordinator
                .acquire_cancellable(&step.specs(), &self.cancel)
                .await
            {
                Ok(set) => Some((coordinator, set)),
                Err(err) => {
                    match (err.resource_type(), &err) {
                        (Some(resource_type), LeaseError::Cancelled { .. }) => {
                            tracing::warn!(resource_type, "stopped acquiring {:?}", resource_type)
                        }
                        (Some(resource_type), _) => tracing::error!(
                            resource_type,
                            "could not acquire {:?} lease(s): {}",
                            resource_type,
                            err
                        ),
                        (None, _) => {}
                    }
                    return fail(report, err.into());
                }
            }
        } else {
            None
        };

        report.enter(StepPhase::Running);
        let ctx = context(step, held.as_ref().map(|(_, set)| set));
        let outcome = self.execute(workload, ctx, held.as_ref()).await;

        if let Some((coordinator, set)) = held {
            report.enter(StepPhase::Releasing);
            tracing::info!("Releasing leases for {:?}", step.name);
            report.release = coordinator.release(&set).await;
        }

        report.enter(StepPhase::Done);
        match &outcome {
            Ok(()) => tracing::info!("step {} succeeded", step.name),
            Err(e) => tracing::error!("step {} failed: {}", step.name, e),
        }
        report.outcome = outcome;
        report
    }

    /// Run the workload until it finishes, a lease is lost, or the run is cancelled
    async fn execute<W: StepWorkload>(
        &self,
        workload: &W,
        ctx: StepContext,
        held: Option<&(&LeaseCoordinator<P, C>, LeaseSet)>,
    ) -> Result<(), StepError> {
        let workload = workload.clone();
        let mut task = AbortOnDrop(tokio::spawn(async move { workload.run(ctx).await }));

        let lost = async {
            match held {
                Some((coordinator, set)) => coordinator.lost(set.id()).await,
                None => std::future::pending().await,
            }
        };

        tokio::select! {
            joined = &mut task.0 => match joined {
                Ok(result) => result.map_err(StepError::from),
                Err(e) if e.is_panic() => Err(WorkloadError::Panicked(e.to_string()).into()),
                Err(_) => Err(StepError::Cancelled),
            },
            expiry = lost => {
                task.stop().await;
                Err(StepError::LeaseExpired {
                    resource_type: expiry.resource_type,
                    lease: expiry.lease,
                    reason: expiry.reason,
                })
            }
            _ = self.cancel.cancelled() => {
                task.stop().await;
                Err(StepError::Cancelled)
            }
        }
    }
}

fn fail(mut report: StepReport, err: StepError) -> StepReport {
    tracing::error!("step {} failed: {}", report.name, err);
    report.enter(StepPhase::Done);
    report.outcome = Err(err);
    report
}

/// Step env plus one variable per lease requirement
fn context(step: &StepDef, set: Option<&LeaseSet>) -> StepContext {
    let mut ctx = StepContext {
        step: step.name.clone(),
        run: step.run.clone(),
        cwd: step.cwd.clone(),
        env: step.env.clone(),
        leases: Default::default(),
    };

    let Some(set) = set else {
        return ctx;
    };
    for def in &step.leases {
        if let Some(group) = set.group(def.spec.resource_type()) {
            ctx.env.insert(def.env.clone(), group.joined_ids());
            ctx.leases.insert(
                group.resource_type().to_string(),
                group.leases.iter().map(|l| l.id.clone()).collect(),
            );
        }
    }
    ctx
}

/// Aborts the workload task if the step is abandoned
struct AbortOnDrop<T>(JoinHandle<T>);

impl<T> AbortOnDrop<T> {
    /// Abort and wait until the task has been torn down
    async fn stop(&mut self) {
        self.0.abort();
        let _ = (&mut self.0).await;
    }
}

impl<T> Drop for AbortOnDrop<T> {
    fn drop(&mut self) {
        self.0.abort();
    }
}

#[cfg(test)]
#[path = "lifecycle_tests.rs"]
mod tests;
