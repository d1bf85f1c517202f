// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Lease coordinator
//!
//! Owns every lease acquired by this process. Acquisition is all-or-nothing
//! per call, release is in declaration order, and a single background task
//! heartbeats whatever is currently tracked.
//!
//! Bookkeeping lives behind a std mutex that is never held across an await.
//! Each tracked lease also has an async slot lock; heartbeat and release of
//! the same lease both take it, so no heartbeat is sent once release begins.
//!
//! Every pool acquisition runs on its own task. A grant that arrives after
//! its caller gave up (cancellation, attempt timeout, dropped future) is
//! released by that task instead of being orphaned.

use crate::cancel::Cancellation;
use crate::error::LeaseError;
use leash_adapters::{PoolClient, PoolError};
use leash_core::{
    retry, validate_specs, Clock, HeartbeatResult, Lease, LeaseGroup, LeaseId, LeaseSet,
    LeaseSetId, LeaseSpec, LossReason, RenewalConfig, RenewalState, RenewalVerdict, RetryError,
    RetryPolicy, SystemClock,
};
use leash_runbook::PoolDef;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;

/// Coordinator tuning
#[derive(Debug, Clone, PartialEq)]
pub struct CoordinatorConfig {
    pub acquire_retry: RetryPolicy,
    pub release_retry: RetryPolicy,
    pub renewal: RenewalConfig,
    /// Deadline for a single heartbeat
    pub call_timeout: Duration,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self::from_pool(&PoolDef::default())
    }
}

impl CoordinatorConfig {
    pub fn from_pool(pool: &PoolDef) -> Self {
        Self {
            acquire_retry: pool.acquire_policy(),
            release_retry: pool.release_policy(),
            renewal: pool.renewal(),
            call_timeout: pool.call_timeout,
        }
    }
}

/// A tracked lease that the pool authority no longer honors
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeaseExpiry {
    pub lease: LeaseId,
    pub resource_type: String,
    pub reason: LossReason,
}

/// Outcome of releasing one or more lease sets
///
/// Failures are abandoned to the authority's own reclamation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReleaseReport {
    pub released: Vec<LeaseId>,
    pub failed: Vec<(LeaseId, String)>,
}

impl ReleaseReport {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }

    pub fn is_empty(&self) -> bool {
        self.released.is_empty() && self.failed.is_empty()
    }

    fn merge(&mut self, other: ReleaseReport) {
        self.released.extend(other.released);
        self.failed.extend(other.failed);
    }
}

struct Slot {
    lease: Lease,
    set: LeaseSetId,
    renewal: RenewalState,
    released: bool,
    /// Declared lost; no longer heartbeated but still owed a release unless expired
    lost: bool,
}

struct SetEntry {
    /// Granted leases in declaration order
    leases: Vec<Lease>,
    expiry: watch::Sender<Option<LeaseExpiry>>,
}

#[derive(Default)]
struct Registry {
    slots: HashMap<LeaseId, Arc<tokio::sync::Mutex<Slot>>>,
    sets: BTreeMap<LeaseSetId, SetEntry>,
    closed: bool,
}

struct Inner<P, C> {
    pool: P,
    config: CoordinatorConfig,
    clock: C,
    next_set: AtomicU64,
    registry: Mutex<Registry>,
    renewal_task: Mutex<Option<JoinHandle<()>>>,
}

/// Shared, internally synchronized owner of this process's leases
pub struct LeaseCoordinator<P, C = SystemClock> {
    inner: Arc<Inner<P, C>>,
}

impl<P, C> Clone for LeaseCoordinator<P, C> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<P: PoolClient> LeaseCoordinator<P, SystemClock> {
    pub fn new(pool: P, config: CoordinatorConfig) -> Self {
        Self::with_clock(pool, config, SystemClock)
    }
}

impl<P: PoolClient, C: Clock> LeaseCoordinator<P, C> {
    pub fn with_clock(pool: P, config: CoordinatorConfig, clock: C) -> Self {
        Self {
            inner: Arc::new(Inner {
                pool,
                config,
                clock,
                next_set: AtomicU64::new(1),
                registry: Mutex::new(Registry::default()),
                renewal_task: Mutex::new(None),
            }),
        }
    }

    fn registry(&self) -> std::sync::MutexGuard<'_, Registry> {
        self.inner
            .registry
            .lock()
            .unwrap_or_else(|e| e.into_inner())
    }

    /// Number of leases acquired and not yet released
    pub fn tracked(&self) -> usize {
        self.registry().slots.len()
    }

    /// Whether `release_all` has run
    pub fn is_closed(&self) -> bool {
        self.registry().closed
    }

    /// Acquire every spec, in declaration order, or nothing
    pub async fn acquire(&self, specs: &[LeaseSpec]) -> Result<LeaseSet, LeaseError> {
        self.acquire_cancellable(specs, &Cancellation::new()).await
    }

    /// Like [`LeaseCoordinator::acquire`], aborting when `cancel` fires
    ///
    /// Leases granted before a failure or cancellation are released before
    /// the error is returned. If the returned future is dropped instead, the
    /// partial set is released in the background.
    pub async fn acquire_cancellable(
        &self,
        specs: &[LeaseSpec],
        cancel: &Cancellation,
    ) -> Result<LeaseSet, LeaseError> {
        validate_specs(specs)?;

        // One budget for the whole request, shared by its specs
        let deadline = Instant::now() + self.inner.config.acquire_retry.budget;
        let set_id = LeaseSetId(self.inner.next_set.fetch_add(1, Ordering::SeqCst));
        {
            let mut registry = self.registry();
            if registry.closed {
                return Err(LeaseError::ShutDown);
            }
            let (expiry, _) = watch::channel(None);
            registry.sets.insert(
                set_id,
                SetEntry {
                    leases: Vec::new(),
                    expiry,
                },
            );
        }

        let mut guard = RollbackGuard {
            coordinator: Some(self.clone()),
            set: set_id,
        };

        let mut groups = Vec::with_capacity(specs.len());
        for spec in specs {
            match self.acquire_group(set_id, spec, deadline, cancel).await {
                Ok(group) => groups.push(group),
                Err(err) => {
                    guard.disarm();
                    let report = self.release_set(set_id).await;
                    if !report.is_empty() {
                        tracing::info!(
                            set = %set_id,
                            released = report.released.len(),
                            "rolled back partial acquisition"
                        );
                    }
                    return Err(err);
                }
            }
        }

        guard.disarm();
        if !groups.is_empty() {
            self.ensure_renewal();
        }
        Ok(LeaseSet::new(set_id, groups))
    }

    async fn acquire_group(
        &self,
        set_id: LeaseSetId,
        spec: &LeaseSpec,
        deadline: Instant,
        cancel: &Cancellation,
    ) -> Result<LeaseGroup, LeaseError> {
        let resource_type = spec.resource_type();
        let count = spec.count();
        tracing::info!("Acquiring {} lease(s) for {:?}", count, resource_type);

        let policy = self.group_policy(count, deadline);
        let attempt = retry(&policy, |_| self.begin_acquire(resource_type, count).wait());

        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                tracing::warn!(resource_type, "acquisition cancelled");
                return Err(LeaseError::Cancelled {
                    resource_type: resource_type.to_string(),
                });
            }
            result = attempt => result,
        };

        let leases = match result {
            Ok(leases) => leases,
            Err(err) => {
                let err = acquire_error(resource_type, err);
                if matches!(err, LeaseError::Unavailable { .. }) {
                    self.log_usage(resource_type).await;
                }
                return Err(err);
            }
        };

        self.register(set_id, &leases).await?;

        let ids: Vec<&str> = leases.iter().map(|l| l.id.as_str()).collect();
        tracing::info!("Acquired lease(s) for {:?}: {:?}", resource_type, ids);

        Ok(LeaseGroup {
            spec: spec.clone(),
            leases,
        })
    }

    /// Retry policy for one spec: whatever is left of the request's budget,
    /// and an attempt deadline long enough for `count` pool calls
    fn group_policy(&self, count: u32, deadline: Instant) -> RetryPolicy {
        let policy = &self.inner.config.acquire_retry;
        policy
            .clone()
            .with_budget(deadline.saturating_duration_since(Instant::now()))
            .with_attempt_timeout(policy.attempt_timeout.saturating_mul(count.max(1)))
    }

    /// Start one acquisition attempt on its own task
    fn begin_acquire(&self, resource_type: &str, count: u32) -> PendingGrant<P, C> {
        let (tx, rx) = oneshot::channel();
        let coordinator = self.clone();
        let resource_type = resource_type.to_string();
        tokio::spawn(async move {
            let result = coordinator.inner.pool.acquire(&resource_type, count).await;
            if let Err(Ok(leases)) = tx.send(result) {
                coordinator.return_late_grant(&leases).await;
            }
        });
        PendingGrant {
            rx: Some(rx),
            coordinator: self.clone(),
        }
    }

    /// Hand back leases nobody is waiting for
    async fn return_late_grant(&self, leases: &[Lease]) {
        let ids: Vec<&str> = leases.iter().map(|l| l.id.as_str()).collect();
        tracing::info!("Returning lease(s) granted after acquisition was abandoned: {:?}", ids);
        for lease in leases {
            // Failures are logged by release_lease and left to the pool's reclamation
            let _ = self.release_lease(lease).await;
        }
    }

    /// Track freshly granted leases under their set
    ///
    /// If the set is gone (`release_all` ran meanwhile) the leases go straight back.
    async fn register(&self, set_id: LeaseSetId, leases: &[Lease]) -> Result<(), LeaseError> {
        let accepted = {
            let mut registry = self.registry();
            let now = RenewalState::new(&self.inner.clock);
            let Registry { slots, sets, closed } = &mut *registry;
            match sets.get_mut(&set_id) {
                Some(entry) if !*closed => {
                    for lease in leases {
                        entry.leases.push(lease.clone());
                        slots.insert(
                            lease.id.clone(),
                            Arc::new(tokio::sync::Mutex::new(Slot {
                                lease: lease.clone(),
                                set: set_id,
                                renewal: now.clone(),
                                released: false,
                                lost: false,
                            })),
                        );
                    }
                    true
                }
                _ => false,
            }
        };

        if accepted {
            return Ok(());
        }
        for lease in leases {
            self.release_lease(lease).await;
        }
        Err(LeaseError::ShutDown)
    }

    async fn log_usage(&self, resource_type: &str) {
        match self.inner.pool.metrics(resource_type).await {
            Ok(usage) => tracing::warn!(
                "no free {:?} resources: {} free, {} leased",
                resource_type,
                usage.free,
                usage.leased
            ),
            Err(e) => tracing::debug!(resource_type, error = %e, "could not read pool usage"),
        }
    }

    /// Release every lease in the set, in declaration order
    ///
    /// Idempotent: a set that was already released makes no pool calls.
    pub async fn release(&self, set: &LeaseSet) -> ReleaseReport {
        self.release_set(set.id()).await
    }

    async fn release_set(&self, set_id: LeaseSetId) -> ReleaseReport {
        let slots: Vec<Arc<tokio::sync::Mutex<Slot>>> = {
            let mut registry = self.registry();
            let Some(entry) = registry.sets.remove(&set_id) else {
                return ReleaseReport::default();
            };
            entry
                .leases
                .iter()
                .filter_map(|lease| registry.slots.get(&lease.id).cloned())
                .collect()
        };

        let mut report = ReleaseReport::default();
        for slot in slots {
            let mut slot = slot.lock().await;
            if slot.released {
                continue;
            }
            slot.released = true;

            let lease = slot.lease.clone();
            match self.release_lease(&lease).await {
                Ok(()) => report.released.push(lease.id.clone()),
                Err(e) => report.failed.push((lease.id.clone(), e)),
            }
            self.registry().slots.remove(&lease.id);
        }
        report
    }

    async fn release_lease(&self, lease: &Lease) -> Result<(), String> {
        tracing::info!("Releasing lease for {:?}: {}", lease.resource_type, lease.id);

        let pool = &self.inner.pool;
        match retry(&self.inner.config.release_retry, |_| pool.release(lease)).await {
            Ok(()) => Ok(()),
            // Already back in the pool
            Err(RetryError::Permanent(PoolError::Expired(_))) => Ok(()),
            Err(e) => {
                tracing::warn!(
                    lease = %lease.id,
                    resource_type = lease.resource_type,
                    error = %e,
                    "failed to release lease, leaving it to the pool's reclamation"
                );
                Err(e.to_string())
            }
        }
    }

    /// Release everything still tracked and refuse new acquisitions
    ///
    /// Sets are released in acquisition order. Safe to call more than once.
    pub async fn release_all(&self) -> ReleaseReport {
        let set_ids: Vec<LeaseSetId> = {
            let mut registry = self.registry();
            registry.closed = true;
            registry.sets.keys().copied().collect()
        };
        if let Some(task) = self
            .inner
            .renewal_task
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take()
        {
            task.abort();
        }

        let mut report = ReleaseReport::default();
        for set_id in set_ids {
            report.merge(self.release_set(set_id).await);
        }
        report
    }

    /// The first lost lease of a set, if any
    pub fn expiry(&self, set: LeaseSetId) -> Option<LeaseExpiry> {
        self.registry()
            .sets
            .get(&set)
            .and_then(|entry| entry.expiry.borrow().clone())
    }

    /// Resolves when a lease of the set is lost; pends forever otherwise
    pub async fn lost(&self, set: LeaseSetId) -> LeaseExpiry {
        let rx = self
            .registry()
            .sets
            .get(&set)
            .map(|entry| entry.expiry.subscribe());

        let expiry = match rx {
            Some(mut rx) => match rx.wait_for(Option::is_some).await {
                Ok(value) => value.clone(),
                Err(_) => None,
            },
            None => None,
        };
        match expiry {
            Some(expiry) => expiry,
            None => std::future::pending().await,
        }
    }

    fn ensure_renewal(&self) {
        let mut task = self
            .inner
            .renewal_task
            .lock()
            .unwrap_or_else(|e| e.into_inner());
        if task.is_some() || self.is_closed() {
            return;
        }
        let inner = Arc::downgrade(&self.inner);
        let interval = self.inner.config.renewal.heartbeat_interval;
        *task = Some(tokio::spawn(renewal_loop(inner, interval)));
    }

    /// Heartbeat every tracked lease once
    pub async fn renew(&self) {
        let slots: Vec<Arc<tokio::sync::Mutex<Slot>>> =
            self.registry().slots.values().cloned().collect();

        for slot in slots {
            // A held slot is being released
            let Ok(mut slot) = slot.try_lock() else {
                continue;
            };
            if slot.released || slot.lost {
                continue;
            }

            let timeout = self.inner.config.call_timeout;
            let result = heartbeat(&self.inner.pool, &slot.lease, timeout).await;
            let verdict = slot
                .renewal
                .record(result, &self.inner.config.renewal, &self.inner.clock);

            match verdict {
                RenewalVerdict::Healthy => {}
                RenewalVerdict::Degraded { failures } => tracing::warn!(
                    lease = %slot.lease.id,
                    failures,
                    since_ok_ms = slot.renewal.age(&self.inner.clock).as_millis() as u64,
                    "heartbeat failed, will retry"
                ),
                RenewalVerdict::Lost { reason } => {
                    slot.lost = true;
                    // Only the authority saying so means it already took the lease back
                    slot.released = matches!(reason, LossReason::Expired);
                    self.invalidate(&slot, reason);
                }
            }
        }
    }

    fn invalidate(&self, slot: &Slot, reason: LossReason) {
        tracing::error!(
            lease = %slot.lease.id,
            set = %slot.set,
            "lease for {:?} lost: {}",
            slot.lease.resource_type,
            reason
        );

        let expiry = LeaseExpiry {
            lease: slot.lease.id.clone(),
            resource_type: slot.lease.resource_type.clone(),
            reason,
        };
        let mut registry = self.registry();
        if slot.released {
            registry.slots.remove(&slot.lease.id);
        }
        if let Some(entry) = registry.sets.get(&slot.set) {
            entry.expiry.send_if_modified(|current| {
                if current.is_none() {
                    *current = Some(expiry);
                    true
                } else {
                    false
                }
            });
        }
    }
}

async fn heartbeat<P: PoolClient>(pool: &P, lease: &Lease, timeout: Duration) -> HeartbeatResult {
    match tokio::time::timeout(timeout, pool.heartbeat(lease)).await {
        Ok(Ok(())) => HeartbeatResult::Ok,
        Ok(Err(PoolError::Expired(_))) => HeartbeatResult::Expired,
        Ok(Err(e)) => HeartbeatResult::Transient(e.to_string()),
        Err(_) => HeartbeatResult::Transient(format!("heartbeat timed out after {:?}", timeout)),
    }
}

async fn renewal_loop<P: PoolClient, C: Clock>(
    inner: std::sync::Weak<Inner<P, C>>,
    interval: Duration,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    // The first tick completes immediately; leases were just granted
    ticker.tick().await;

    loop {
        ticker.tick().await;
        let Some(inner) = inner.upgrade() else {
            break;
        };
        LeaseCoordinator { inner }.renew().await;
    }
    tracing::debug!("renewal loop stopped");
}

fn acquire_error(resource_type: &str, err: RetryError<PoolError>) -> LeaseError {
    let resource_type = resource_type.to_string();
    match err {
        RetryError::Permanent(PoolError::Unavailable { .. }) => {
            LeaseError::Unavailable { resource_type }
        }
        RetryError::Permanent(e) => LeaseError::Rejected {
            resource_type,
            reason: e.to_string(),
        },
        exhausted => LeaseError::AcquireTimeout {
            resource_type,
            attempts: exhausted.attempts(),
            cause: exhausted
                .last_error()
                .map(ToString::to_string)
                .unwrap_or_else(|| "acquisition budget exceeded".to_string()),
        },
    }
}

/// Caller's end of an in-flight pool acquisition
///
/// Dropping it before the reply arrives leaves the release to the acquiring
/// task; a reply that already arrived is released here.
struct PendingGrant<P: PoolClient, C: Clock> {
    rx: Option<oneshot::Receiver<Result<Vec<Lease>, PoolError>>>,
    coordinator: LeaseCoordinator<P, C>,
}

impl<P: PoolClient, C: Clock> PendingGrant<P, C> {
    async fn wait(mut self) -> Result<Vec<Lease>, PoolError> {
        let Some(rx) = self.rx.as_mut() else {
            return Err(PoolError::Transient("acquisition reply already taken".to_string()));
        };
        let reply = rx.await;
        self.rx = None;
        reply.unwrap_or_else(|_| {
            Err(PoolError::Transient(
                "acquisition task ended without a reply".to_string(),
            ))
        })
    }
}

impl<P: PoolClient, C: Clock> Drop for PendingGrant<P, C> {
    fn drop(&mut self) {
        let Some(mut rx) = self.rx.take() else {
            return;
        };
        rx.close();
        let Ok(Ok(leases)) = rx.try_recv() else {
            return;
        };
        let coordinator = self.coordinator.clone();
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    coordinator.return_late_grant(&leases).await;
                });
            }
            Err(_) => tracing::warn!(
                leases = leases.len(),
                "late grant abandoned outside a runtime"
            ),
        }
    }
}

/// Releases a partially acquired set if the acquiring future is dropped
struct RollbackGuard<P: PoolClient, C: Clock> {
    coordinator: Option<LeaseCoordinator<P, C>>,
    set: LeaseSetId,
}

impl<P: PoolClient, C: Clock> RollbackGuard<P, C> {
    fn disarm(&mut self) {
        self.coordinator = None;
    }
}

impl<P: PoolClient, C: Clock> Drop for RollbackGuard<P, C> {
    fn drop(&mut self) {
        let Some(coordinator) = self.coordinator.take() else {
            return;
        };
        let set = self.set;
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    coordinator.release_set(set).await;
                });
            }
            Err(_) => tracing::warn!(%set, "acquisition abandoned outside a runtime"),
        }
    }
}

#[cfg(test)]
#[path = "coordinator_tests.rs"]
mod tests;
