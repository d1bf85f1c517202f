// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! leash-core: data model for pooled resource leases
//!
//! This crate provides:
//! - Lease requirements (`LeaseSpec`) and granted leases (`Lease`, `LeaseSet`)
//! - Heartbeat bookkeeping (`RenewalState`)
//! - Bounded retry with backoff and jitter
//! - Clock and id abstractions so the above can be tested without real time

pub mod clock;
pub mod id;
pub mod lease;
pub mod renewal;
pub mod retry;
pub mod spec;

pub use clock::{Clock, FakeClock, SystemClock};
pub use id::{default_owner, IdGen, SequentialIdGen, UuidIdGen};
pub use lease::{Lease, LeaseGroup, LeaseId, LeaseSet, LeaseSetId};
pub use renewal::{HeartbeatResult, LossReason, RenewalConfig, RenewalState, RenewalVerdict};
pub use retry::{retry, RetryError, RetryPolicy, Retryable};
pub use spec::{validate_specs, LeaseSpec, SpecError};
