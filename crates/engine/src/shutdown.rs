// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Process-wide release on completion or termination signal

use crate::cancel::Cancellation;
use crate::coordinator::{LeaseCoordinator, ReleaseReport};
use leash_adapters::PoolClient;
use leash_core::{Clock, SystemClock};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::{mpsc, OnceCell};

/// How a guarded run ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunExit<T> {
    Completed(T),
    /// A termination signal arrived; `output` is set if the run wound down within the grace period
    Interrupted {
        signal: &'static str,
        output: Option<T>,
    },
}

/// Yields the name of every SIGINT or SIGTERM received, in arrival order
///
/// Must be called from within a runtime.
pub fn termination_signals() -> std::io::Result<mpsc::UnboundedReceiver<&'static str>> {
    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;
    let (tx, rx) = mpsc::unbounded_channel();
    tokio::spawn(async move {
        loop {
            let name = tokio::select! {
                _ = sigterm.recv() => "SIGTERM",
                _ = sigint.recv() => "SIGINT",
            };
            if tx.send(name).is_err() {
                break;
            }
        }
    });
    Ok(rx)
}

/// Next signal from `signals`; pends forever once the sender is gone
async fn next_signal(signals: &mut mpsc::UnboundedReceiver<&'static str>) -> &'static str {
    match signals.recv().await {
        Some(name) => name,
        None => std::future::pending().await,
    }
}

/// Runs `ReleaseAll` exactly once, whichever way the run ends
pub struct ShutdownReleaser<P, C = SystemClock> {
    coordinator: LeaseCoordinator<P, C>,
    cancel: Cancellation,
    grace: Duration,
    report: Arc<OnceCell<ReleaseReport>>,
}

impl<P, C> Clone for ShutdownReleaser<P, C> {
    fn clone(&self) -> Self {
        Self {
            coordinator: self.coordinator.clone(),
            cancel: self.cancel.clone(),
            grace: self.grace,
            report: Arc::clone(&self.report),
        }
    }
}

impl<P: PoolClient, C: Clock> ShutdownReleaser<P, C> {
    pub fn new(coordinator: LeaseCoordinator<P, C>, cancel: Cancellation) -> Self {
        Self {
            coordinator,
            cancel,
            grace: Duration::from_secs(30),
            report: Arc::new(OnceCell::new()),
        }
    }

    /// How long an interrupted run may take to wind down before leases are released under it
    pub fn with_grace(mut self, grace: Duration) -> Self {
        self.grace = grace;
        self
    }

    /// Release everything the coordinator still tracks; later calls return the first report
    pub async fn release_all(&self) -> &ReleaseReport {
        self.report
            .get_or_init(|| async {
                let report = self.coordinator.release_all().await;
                if !report.is_empty() {
                    tracing::info!(
                        released = report.released.len(),
                        failed = report.failed.len(),
                        "released all remaining leases"
                    );
                }
                report
            })
            .await
    }

    pub fn has_released(&self) -> bool {
        self.report.initialized()
    }

    /// Run `work` until it finishes or SIGINT/SIGTERM arrives, then release everything
    pub async fn run<F: Future>(&self, work: F) -> std::io::Result<RunExit<F::Output>> {
        let signals = termination_signals()?;
        Ok(self.run_until(work, signals).await)
    }

    /// Like [`ShutdownReleaser::run`] with signal names fed through `signals`
    ///
    /// On the first signal the run is cancelled and given the grace period to
    /// release its own leases step by step before `ReleaseAll` sweeps the rest.
    /// A second signal ends the grace period at once.
    pub async fn run_until<F>(
        &self,
        work: F,
        mut signals: mpsc::UnboundedReceiver<&'static str>,
    ) -> RunExit<F::Output>
    where
        F: Future,
    {
        tokio::pin!(work);

        let exit = tokio::select! {
            output = &mut work => RunExit::Completed(output),
            signal = next_signal(&mut signals) => {
                tracing::warn!(signal, "interrupted, cancelling steps and releasing leases");
                self.cancel.cancel();
                let output = tokio::select! {
                    output = tokio::time::timeout(self.grace, &mut work) => output.ok(),
                    again = next_signal(&mut signals) => {
                        tracing::warn!(signal = again, "second signal, releasing leases now");
                        None
                    }
                };
                RunExit::Interrupted { signal, output }
            }
        };

        self.release_all().await;
        exit
    }
}

#[cfg(test)]
#[path = "shutdown_tests.rs"]
mod tests;
