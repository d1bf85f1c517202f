// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Error types for lease coordination and step execution

use crate::workload::WorkloadError;
use leash_core::{LeaseId, LossReason, SpecError};
use thiserror::Error;

/// Why a lease set could not be acquired
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LeaseError {
    #[error("invalid lease request: {0}")]
    InvalidSpec(#[from] SpecError),
    /// The pool has no free capacity; not retried
    #[error("resources not found")]
    Unavailable { resource_type: String },
    /// Attempts or the acquisition budget ran out while the pool was slow or unreachable
    #[error("timed out acquiring {resource_type:?} after {attempts} attempts: {cause}")]
    AcquireTimeout {
        resource_type: String,
        attempts: u32,
        cause: String,
    },
    #[error("pool rejected request for {resource_type:?}: {reason}")]
    Rejected {
        resource_type: String,
        reason: String,
    },
    #[error("acquisition of {resource_type:?} was cancelled")]
    Cancelled { resource_type: String },
    #[error("lease coordinator has released all leases and accepts no new requests")]
    ShutDown,
}

impl LeaseError {
    /// The resource type whose acquisition failed, if any
    pub fn resource_type(&self) -> Option<&str> {
        match self {
            LeaseError::Unavailable { resource_type }
            | LeaseError::AcquireTimeout { resource_type, .. }
            | LeaseError::Rejected { resource_type, .. }
            | LeaseError::Cancelled { resource_type } => Some(resource_type),
            LeaseError::InvalidSpec(_) | LeaseError::ShutDown => None,
        }
    }
}

/// Why a step did not succeed
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StepError {
    #[error("a lease client was required but none was provided, add the --lease-... arguments")]
    NoLeaseClient,
    #[error("failed to acquire lease: {0}")]
    AcquireLease(LeaseError),
    #[error("lease {lease} for {resource_type:?} was lost: {reason}")]
    LeaseExpired {
        resource_type: String,
        lease: LeaseId,
        reason: LossReason,
    },
    #[error(transparent)]
    Workload(#[from] WorkloadError),
    #[error("step was cancelled")]
    Cancelled,
}

impl From<LeaseError> for StepError {
    fn from(err: LeaseError) -> Self {
        match err {
            LeaseError::Cancelled { .. } => StepError::Cancelled,
            other => StepError::AcquireLease(other),
        }
    }
}
