// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Step workloads

use async_trait::async_trait;
use leash_core::LeaseId;
use std::collections::BTreeMap;
use std::path::PathBuf;
use thiserror::Error;

/// Errors from running a step's own work
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum WorkloadError {
    #[error("failed to start step: {0}")]
    Spawn(String),
    #[error("step exited with code {0}")]
    Failed(i32),
    #[error("step panicked: {0}")]
    Panicked(String),
}

/// What a workload sees while its step is running
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StepContext {
    pub step: String,
    pub run: String,
    pub cwd: Option<PathBuf>,
    /// Static step env plus one variable per lease requirement
    pub env: BTreeMap<String, String>,
    /// Lease ids keyed by resource type
    pub leases: BTreeMap<String, Vec<LeaseId>>,
}

/// The work a step performs once its leases are held
#[async_trait]
pub trait StepWorkload: Clone + Send + Sync + 'static {
    async fn run(&self, ctx: StepContext) -> Result<(), WorkloadError>;
}

/// Runs the step's `run` line with `sh -c`
///
/// The child is killed if the step is aborted.
#[derive(Clone, Debug, Default)]
pub struct ShellWorkload {
    base_dir: Option<PathBuf>,
}

impl ShellWorkload {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve relative step `cwd` values against `dir`
    pub fn with_base_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: Some(dir.into()),
        }
    }

    fn working_dir(&self, ctx: &StepContext) -> Option<PathBuf> {
        match (&self.base_dir, &ctx.cwd) {
            (Some(base), Some(cwd)) => Some(base.join(cwd)),
            (None, Some(cwd)) => Some(cwd.clone()),
            (Some(base), None) => Some(base.clone()),
            (None, None) => None,
        }
    }
}

#[async_trait]
impl StepWorkload for ShellWorkload {
    async fn run(&self, ctx: StepContext) -> Result<(), WorkloadError> {
        let mut command = tokio::process::Command::new("sh");
        command.arg("-c").arg(&ctx.run).envs(&ctx.env).kill_on_drop(true);
        if let Some(dir) = self.working_dir(&ctx) {
            command.current_dir(dir);
        }

        let output = command
            .output()
            .await
            .map_err(|e| WorkloadError::Spawn(e.to_string()))?;

        if !output.stdout.is_empty() {
            tracing::info!(
                step = ctx.step,
                stdout = %String::from_utf8_lossy(&output.stdout),
                "shell stdout"
            );
        }
        if !output.stderr.is_empty() {
            tracing::warn!(
                step = ctx.step,
                stderr = %String::from_utf8_lossy(&output.stderr),
                "shell stderr"
            );
        }

        match output.status.code() {
            Some(0) => Ok(()),
            Some(code) => Err(WorkloadError::Failed(code)),
            // Terminated by a signal
            None => Err(WorkloadError::Failed(-1)),
        }
    }
}

#[cfg(test)]
#[path = "workload_tests.rs"]
mod tests;
