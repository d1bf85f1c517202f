// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! leash execution engine: lease coordination around step execution

mod cancel;
mod coordinator;
mod error;
mod lifecycle;
mod shutdown;
mod workload;

#[cfg(test)]
mod test_logs;

pub use cancel::Cancellation;
pub use coordinator::{CoordinatorConfig, LeaseCoordinator, LeaseExpiry, ReleaseReport};
pub use error::{LeaseError, StepError};
pub use lifecycle::{StepLifecycle, StepPhase, StepReport};
pub use shutdown::{termination_signals, RunExit, ShutdownReleaser};
pub use workload::{ShellWorkload, StepContext, StepWorkload, WorkloadError};
