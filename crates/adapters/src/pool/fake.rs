// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fake pool authority for testing
#![cfg_attr(coverage_nightly, coverage(off))]

use super::{PoolClient, PoolError, PoolMetrics};
use async_trait::async_trait;
use chrono::Utc;
use leash_core::{IdGen, Lease, LeaseId, SequentialIdGen};
use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Recorded pool call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PoolCall {
    Acquire { resource_type: String, count: u32 },
    Heartbeat { lease: LeaseId },
    Release { lease: LeaseId },
    Metrics { resource_type: String },
}

/// Operation selector for scripted failures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PoolOp {
    Acquire,
    Heartbeat,
    Release,
    Metrics,
}

#[derive(Debug)]
struct FakePool {
    capacity: u32,
    ids: SequentialIdGen,
    leased: BTreeSet<LeaseId>,
}

impl FakePool {
    fn new(resource_type: &str) -> Self {
        Self {
            capacity: 0,
            ids: SequentialIdGen::new(resource_type),
            leased: BTreeSet::new(),
        }
    }
}

#[derive(Debug, Default)]
struct FakePoolState {
    pools: HashMap<String, FakePool>,
    reclaimed: HashSet<LeaseId>,
    failures: HashMap<PoolOp, VecDeque<PoolError>>,
    unreachable: bool,
    acquire_delays: HashMap<String, Duration>,
}

impl FakePoolState {
    fn take_failure(&mut self, op: PoolOp) -> Option<PoolError> {
        if self.unreachable {
            return Some(PoolError::Transient("connection refused".to_string()));
        }
        self.failures.get_mut(&op).and_then(|queue| queue.pop_front())
    }

    fn holder(&mut self, id: &LeaseId) -> Option<&mut FakePool> {
        self.pools.values_mut().find(|p| p.leased.contains(id))
    }
}

/// In-memory pool authority
///
/// Lease ids are `{resource_type}-{n}`, numbered per type from zero.
#[derive(Clone, Default)]
pub struct FakePoolClient {
    state: Arc<Mutex<FakePoolState>>,
    calls: Arc<Mutex<Vec<PoolCall>>>,
}

impl FakePoolClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder form of [`FakePoolClient::add_pool`]
    pub fn with_pool(self, resource_type: &str, capacity: u32) -> Self {
        self.add_pool(resource_type, capacity);
        self
    }

    pub fn add_pool(&self, resource_type: &str, capacity: u32) {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state
            .pools
            .entry(resource_type.to_string())
            .or_insert_with(|| FakePool::new(resource_type))
            .capacity = capacity;
    }

    /// Get all recorded calls
    pub fn calls(&self) -> Vec<PoolCall> {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Recorded release calls, in order
    pub fn released(&self) -> Vec<LeaseId> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                PoolCall::Release { lease } => Some(lease),
                _ => None,
            })
            .collect()
    }

    pub fn free_count(&self, resource_type: &str) -> u32 {
        let state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state
            .pools
            .get(resource_type)
            .map(|p| p.capacity.saturating_sub(p.leased.len() as u32))
            .unwrap_or(0)
    }

    pub fn leased_count(&self, resource_type: &str) -> u32 {
        let state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state
            .pools
            .get(resource_type)
            .map(|p| p.leased.len() as u32)
            .unwrap_or(0)
    }

    /// Reclaim a lease as the authority would after missed heartbeats
    pub fn expire(&self, id: &LeaseId) {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(pool) = state.holder(id) {
            pool.leased.remove(id);
        }
        state.reclaimed.insert(id.clone());
    }

    /// Fail the next call of `op` with `error`; queued failures are consumed in order
    pub fn fail_next(&self, op: PoolOp, error: PoolError) {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state.failures.entry(op).or_default().push_back(error);
    }

    /// While set, every call fails transiently
    pub fn set_unreachable(&self, unreachable: bool) {
        self.state.lock().unwrap_or_else(|e| e.into_inner()).unreachable = unreachable;
    }

    /// Delay the reply to acquisitions of `resource_type` by `delay`
    ///
    /// The units are granted before the delay, as a slow authority would.
    pub fn set_acquire_delay(&self, resource_type: &str, delay: Duration) {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state
            .acquire_delays
            .insert(resource_type.to_string(), delay);
    }

    fn record(&self, call: PoolCall) {
        self.calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(call);
    }

    fn check_held(&self, op: PoolOp, lease: &Lease) -> Result<(), PoolError> {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(error) = state.take_failure(op) {
            return Err(error);
        }
        if state.reclaimed.contains(&lease.id) || state.holder(&lease.id).is_none() {
            return Err(PoolError::Expired(lease.id.clone()));
        }
        Ok(())
    }
}

#[async_trait]
impl PoolClient for FakePoolClient {
    async fn acquire(&self, resource_type: &str, count: u32) -> Result<Vec<Lease>, PoolError> {
        self.record(PoolCall::Acquire {
            resource_type: resource_type.to_string(),
            count,
        });

        let (granted, delay) = {
            let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
            if let Some(error) = state.take_failure(PoolOp::Acquire) {
                return Err(error);
            }
            let delay = state.acquire_delays.get(resource_type).copied();

            let unavailable = || PoolError::Unavailable {
                resource_type: resource_type.to_string(),
            };
            let pool = state.pools.get_mut(resource_type).ok_or_else(unavailable)?;
            let free = pool.capacity.saturating_sub(pool.leased.len() as u32);
            if free < count {
                return Err(unavailable());
            }

            let now = Utc::now();
            let mut granted = Vec::with_capacity(count as usize);
            for _ in 0..count {
                let lease = Lease::new(pool.ids.next(), resource_type, now);
                pool.leased.insert(lease.id.clone());
                granted.push(lease);
            }
            (granted, delay)
        };

        // Granted already; a caller that stops waiting leaves the units leased
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        Ok(granted)
    }

    async fn heartbeat(&self, lease: &Lease) -> Result<(), PoolError> {
        self.record(PoolCall::Heartbeat {
            lease: lease.id.clone(),
        });
        self.check_held(PoolOp::Heartbeat, lease)
    }

    async fn release(&self, lease: &Lease) -> Result<(), PoolError> {
        self.record(PoolCall::Release {
            lease: lease.id.clone(),
        });
        self.check_held(PoolOp::Release, lease)?;

        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(pool) = state.holder(&lease.id) {
            pool.leased.remove(&lease.id);
        }
        Ok(())
    }

    async fn metrics(&self, resource_type: &str) -> Result<PoolMetrics, PoolError> {
        self.record(PoolCall::Metrics {
            resource_type: resource_type.to_string(),
        });
        if let Some(error) = self
            .state
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take_failure(PoolOp::Metrics)
        {
            return Err(error);
        }
        Ok(PoolMetrics {
            free: self.free_count(resource_type),
            leased: self.leased_count(resource_type),
        })
    }
}

#[cfg(test)]
#[path = "fake_tests.rs"]
mod tests;
