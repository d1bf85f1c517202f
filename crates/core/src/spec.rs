// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Lease requirements declared by a step

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use thiserror::Error;

/// Errors in a set of lease requirements
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SpecError {
    #[error("resource type must not be empty")]
    EmptyResourceType,
    #[error("lease count for {0:?} must be at least 1")]
    ZeroCount(String),
    #[error("resource type {0:?} is requested more than once")]
    DuplicateResourceType(String),
}

/// One resource requirement: `count` units of `resource_type`
///
/// Immutable once constructed; construction enforces a non-empty type and a
/// count of at least one.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawLeaseSpec")]
pub struct LeaseSpec {
    resource_type: String,
    count: u32,
}

#[derive(Deserialize)]
struct RawLeaseSpec {
    resource_type: String,
    #[serde(default = "default_count")]
    count: u32,
}

fn default_count() -> u32 {
    1
}

impl TryFrom<RawLeaseSpec> for LeaseSpec {
    type Error = SpecError;

    fn try_from(raw: RawLeaseSpec) -> Result<Self, Self::Error> {
        LeaseSpec::new(raw.resource_type, raw.count)
    }
}

impl LeaseSpec {
    pub fn new(resource_type: impl Into<String>, count: u32) -> Result<Self, SpecError> {
        let resource_type = resource_type.into();
        if resource_type.trim().is_empty() {
            return Err(SpecError::EmptyResourceType);
        }
        if count == 0 {
            return Err(SpecError::ZeroCount(resource_type));
        }
        Ok(Self {
            resource_type,
            count,
        })
    }

    /// A single-unit requirement
    pub fn one(resource_type: impl Into<String>) -> Result<Self, SpecError> {
        Self::new(resource_type, 1)
    }

    pub fn resource_type(&self) -> &str {
        &self.resource_type
    }

    pub fn count(&self) -> u32 {
        self.count
    }
}

impl fmt::Display for LeaseSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.count, self.resource_type)
    }
}

/// Check a request: every type appears at most once
///
/// Individual specs are already valid by construction.
pub fn validate_specs(specs: &[LeaseSpec]) -> Result<(), SpecError> {
    let mut seen = HashSet::new();
    for spec in specs {
        if !seen.insert(spec.resource_type()) {
            return Err(SpecError::DuplicateResourceType(
                spec.resource_type().to_string(),
            ));
        }
    }
    Ok(())
}

#[cfg(test)]
#[path = "spec_tests.rs"]
mod tests;
