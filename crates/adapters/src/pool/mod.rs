// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Resource-pool authority adapters

mod boskos;

pub use boskos::{BoskosConfig, BoskosPoolClient};

// Test support - only compiled for tests or when explicitly requested
#[cfg(any(test, feature = "test-support"))]
mod fake;
#[cfg(any(test, feature = "test-support"))]
pub use fake::{FakePoolClient, PoolCall, PoolOp};

use async_trait::async_trait;
use leash_core::{Lease, LeaseId, Retryable};
use std::time::Duration;
use thiserror::Error;

/// Errors from pool authority operations
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PoolError {
    /// No `count` free units of the type; permanent for this request
    #[error("resources not found")]
    Unavailable { resource_type: String },
    /// The authority has already reclaimed the lease
    #[error("lease {0} has expired")]
    Expired(LeaseId),
    /// Network or backend hiccup
    #[error("pool request failed: {0}")]
    Transient(String),
    /// A call exceeded its deadline
    #[error("pool request timed out after {0:?}")]
    Timeout(Duration),
    /// The authority refused the request (auth, ownership conflict, bad input)
    #[error("pool rejected request: {0}")]
    Rejected(String),
}

impl Retryable for PoolError {
    fn is_transient(&self) -> bool {
        matches!(self, PoolError::Transient(_) | PoolError::Timeout(_))
    }

    fn attempt_timed_out(timeout: Duration) -> Self {
        PoolError::Timeout(timeout)
    }
}

/// Free/leased unit counts for one resource type
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolMetrics {
    pub free: u32,
    pub leased: u32,
}

/// Client side of the pool authority protocol
///
/// Implementations are stateless per call and safe for concurrent use.
#[async_trait]
pub trait PoolClient: Clone + Send + Sync + 'static {
    /// Lease exactly `count` units of `resource_type`, or none
    async fn acquire(&self, resource_type: &str, count: u32) -> Result<Vec<Lease>, PoolError>;

    /// Tell the authority the lease is still in use
    async fn heartbeat(&self, lease: &Lease) -> Result<(), PoolError>;

    /// Return the lease to the pool
    async fn release(&self, lease: &Lease) -> Result<(), PoolError>;

    /// Current usage of a resource type
    async fn metrics(&self, resource_type: &str) -> Result<PoolMetrics, PoolError>;
}
