// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Pool authority settings

use leash_core::{RenewalConfig, RetryPolicy};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// The `[pool]` table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PoolDef {
    /// Base URL of the pool authority; leases cannot be acquired without it
    pub server: Option<String>,
    /// Owner name recorded on leased resources
    pub owner: Option<String>,
    /// File holding a bearer token
    pub credentials_file: Option<PathBuf>,
    #[serde(with = "humantime_serde")]
    pub heartbeat_interval: Duration,
    pub max_heartbeat_failures: u32,
    /// Deadline for a single pool call
    #[serde(with = "humantime_serde")]
    pub call_timeout: Duration,
    /// Overall acquisition budget for one step
    #[serde(with = "humantime_serde")]
    pub acquire_timeout: Duration,
    pub retry: RetryPolicy,
    #[serde(default = "default_release_retry")]
    pub release_retry: RetryPolicy,
}

fn default_release_retry() -> RetryPolicy {
    RetryPolicy::default()
        .with_max_attempts(3)
        .with_budget(Duration::from_secs(60))
}

impl Default for PoolDef {
    fn default() -> Self {
        let renewal = RenewalConfig::default();
        Self {
            server: None,
            owner: None,
            credentials_file: None,
            heartbeat_interval: renewal.heartbeat_interval,
            max_heartbeat_failures: renewal.max_heartbeat_failures,
            call_timeout: Duration::from_secs(30),
            acquire_timeout: Duration::from_secs(2 * 60 * 60),
            retry: RetryPolicy::default(),
            release_retry: default_release_retry(),
        }
    }
}

impl PoolDef {
    pub fn renewal(&self) -> RenewalConfig {
        RenewalConfig::default()
            .with_heartbeat_interval(self.heartbeat_interval)
            .with_max_heartbeat_failures(self.max_heartbeat_failures)
    }

    /// Acquisition policy: per-attempt deadline from `call_timeout`,
    /// overall budget from `acquire_timeout`
    pub fn acquire_policy(&self) -> RetryPolicy {
        self.retry
            .clone()
            .with_attempt_timeout(self.call_timeout)
            .with_budget(self.acquire_timeout)
    }

    pub fn release_policy(&self) -> RetryPolicy {
        self.release_retry
            .clone()
            .with_attempt_timeout(self.call_timeout)
    }
}
