// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-lease heartbeat bookkeeping
//!
//! A small state machine fed with heartbeat results. Only the renewal loop
//! drives it; everything else reads it.

use crate::clock::Clock;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

/// Renewal configuration
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenewalConfig {
    /// How often every tracked lease is heartbeated
    #[serde(with = "humantime_serde")]
    pub heartbeat_interval: Duration,
    /// Consecutive transient heartbeat failures before a lease is given up
    pub max_heartbeat_failures: u32,
}

impl Default for RenewalConfig {
    fn default() -> Self {
        Self {
            heartbeat_interval: Duration::from_secs(30),
            max_heartbeat_failures: 3,
        }
    }
}

impl RenewalConfig {
    pub fn with_heartbeat_interval(mut self, interval: Duration) -> Self {
        self.heartbeat_interval = interval;
        self
    }

    pub fn with_max_heartbeat_failures(mut self, failures: u32) -> Self {
        self.max_heartbeat_failures = failures;
        self
    }
}

/// Result of one heartbeat, as seen by the renewal loop
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HeartbeatResult {
    Ok,
    /// The authority reports the lease reclaimed
    Expired,
    /// Network or backend hiccup
    Transient(String),
}

/// What the loop should do with the lease after a heartbeat
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RenewalVerdict {
    Healthy,
    /// Still tracked, but the last `failures` heartbeats failed
    Degraded { failures: u32 },
    /// Stop tracking and invalidate the owning set
    Lost { reason: LossReason },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LossReason {
    /// The authority said so
    Expired,
    /// Too many consecutive transient failures; last error attached
    Unreachable { failures: u32, last_error: String },
}

impl std::fmt::Display for LossReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LossReason::Expired => write!(f, "reclaimed by the pool authority"),
            LossReason::Unreachable {
                failures,
                last_error,
            } => write!(
                f,
                "{} consecutive heartbeats failed (last: {})",
                failures, last_error
            ),
        }
    }
}

/// Heartbeat bookkeeping for one lease
#[derive(Clone, Debug)]
pub struct RenewalState {
    pub last_heartbeat: Instant,
    pub consecutive_failures: u32,
}

impl RenewalState {
    /// Fresh state for a lease granted now
    pub fn new(clock: &impl Clock) -> Self {
        Self {
            last_heartbeat: clock.now(),
            consecutive_failures: 0,
        }
    }

    /// Time since the last successful heartbeat (or the grant)
    pub fn age(&self, clock: &impl Clock) -> Duration {
        clock.now().saturating_duration_since(self.last_heartbeat)
    }

    /// Fold a heartbeat result into the state
    pub fn record(
        &mut self,
        result: HeartbeatResult,
        config: &RenewalConfig,
        clock: &impl Clock,
    ) -> RenewalVerdict {
        match result {
            HeartbeatResult::Ok => {
                self.last_heartbeat = clock.now();
                self.consecutive_failures = 0;
                RenewalVerdict::Healthy
            }
            HeartbeatResult::Expired => RenewalVerdict::Lost {
                reason: LossReason::Expired,
            },
            HeartbeatResult::Transient(error) => {
                self.consecutive_failures += 1;
                if self.consecutive_failures >= config.max_heartbeat_failures.max(1) {
                    RenewalVerdict::Lost {
                        reason: LossReason::Unreachable {
                            failures: self.consecutive_failures,
                            last_error: error,
                        },
                    }
                } else {
                    RenewalVerdict::Degraded {
                        failures: self.consecutive_failures,
                    }
                }
            }
        }
    }
}

#[cfg(test)]
#[path = "renewal_tests.rs"]
mod tests;
