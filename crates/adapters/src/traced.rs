// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Traced adapter wrappers for consistent observability

use crate::pool::{PoolClient, PoolError, PoolMetrics};
use async_trait::async_trait;
use leash_core::Lease;
use tracing::Instrument;

/// Wrapper that adds tracing to any PoolClient
#[derive(Clone)]
pub struct TracedPoolClient<P> {
    inner: P,
}

impl<P> TracedPoolClient<P> {
    pub fn new(inner: P) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl<P: PoolClient> PoolClient for TracedPoolClient<P> {
    async fn acquire(&self, resource_type: &str, count: u32) -> Result<Vec<Lease>, PoolError> {
        let span = tracing::info_span!("pool.acquire", resource_type, count);
        async {
            tracing::debug!("requesting");

            let start = std::time::Instant::now();
            let result = self.inner.acquire(resource_type, count).await;
            let elapsed = start.elapsed();

            match &result {
                Ok(leases) => tracing::debug!(
                    leases = ?leases.iter().map(|l| l.id.as_str()).collect::<Vec<_>>(),
                    elapsed_ms = elapsed.as_millis() as u64,
                    "granted"
                ),
                Err(e @ PoolError::Unavailable { .. }) => tracing::info!(
                    elapsed_ms = elapsed.as_millis() as u64,
                    error = %e,
                    "not granted"
                ),
                Err(e) => tracing::warn!(
                    elapsed_ms = elapsed.as_millis() as u64,
                    error = %e,
                    "acquire failed"
                ),
            }

            result
        }
        .instrument(span)
        .await
    }

    async fn heartbeat(&self, lease: &Lease) -> Result<(), PoolError> {
        let span = tracing::debug_span!("pool.heartbeat", lease = %lease.id);
        async {
            let start = std::time::Instant::now();
            let result = self.inner.heartbeat(lease).await;
            let elapsed = start.elapsed();

            match &result {
                Ok(()) => tracing::trace!(elapsed_ms = elapsed.as_millis() as u64, "renewed"),
                Err(e) => tracing::warn!(
                    elapsed_ms = elapsed.as_millis() as u64,
                    error = %e,
                    "heartbeat failed"
                ),
            }

            result
        }
        .instrument(span)
        .await
    }

    async fn release(&self, lease: &Lease) -> Result<(), PoolError> {
        let span = tracing::info_span!("pool.release", lease = %lease.id);
        async {
            let start = std::time::Instant::now();
            let result = self.inner.release(lease).await;
            let elapsed = start.elapsed();

            // Expired on release means the unit is already back in the pool
            match &result {
                Ok(()) => tracing::debug!(elapsed_ms = elapsed.as_millis() as u64, "released"),
                Err(e @ PoolError::Expired(_)) => tracing::debug!(
                    elapsed_ms = elapsed.as_millis() as u64,
                    error = %e,
                    "already reclaimed"
                ),
                Err(e) => tracing::warn!(
                    elapsed_ms = elapsed.as_millis() as u64,
                    error = %e,
                    "release failed"
                ),
            }

            result
        }
        .instrument(span)
        .await
    }

    async fn metrics(&self, resource_type: &str) -> Result<PoolMetrics, PoolError> {
        let result = self.inner.metrics(resource_type).await;
        tracing::trace!(resource_type, metrics = ?result.as_ref().ok(), "checked");
        result
    }
}

#[cfg(test)]
#[path = "traced_tests.rs"]
mod tests;
