// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Leases granted by the pool authority and the per-step sets that hold them

use crate::spec::LeaseSpec;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque lease token issued by the pool authority
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LeaseId(pub String);

impl LeaseId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for LeaseId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One leased unit of a resource type
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lease {
    pub id: LeaseId,
    pub resource_type: String,
    pub acquired_at: DateTime<Utc>,
}

impl Lease {
    pub fn new(
        id: impl Into<String>,
        resource_type: impl Into<String>,
        acquired_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: LeaseId::new(id),
            resource_type: resource_type.into(),
            acquired_at,
        }
    }
}

/// Identifies one acquisition within a coordinator
///
/// Ids are handed out in increasing order, so ordering by id is acquisition order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LeaseSetId(pub u64);

impl fmt::Display for LeaseSetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "set-{}", self.0)
    }
}

/// The leases granted for one spec
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LeaseGroup {
    pub spec: LeaseSpec,
    pub leases: Vec<Lease>,
}

impl LeaseGroup {
    pub fn resource_type(&self) -> &str {
        self.spec.resource_type()
    }

    /// Lease ids joined with commas, the form exposed to step environments
    pub fn joined_ids(&self) -> String {
        self.leases
            .iter()
            .map(|l| l.id.as_str())
            .collect::<Vec<_>>()
            .join(",")
    }
}

/// Leases for one step, one group per spec in declaration order
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LeaseSet {
    id: LeaseSetId,
    groups: Vec<LeaseGroup>,
}

impl LeaseSet {
    pub fn new(id: LeaseSetId, groups: Vec<LeaseGroup>) -> Self {
        Self { id, groups }
    }

    pub fn id(&self) -> LeaseSetId {
        self.id
    }

    pub fn groups(&self) -> &[LeaseGroup] {
        &self.groups
    }

    /// All leases, in declaration order
    pub fn leases(&self) -> impl Iterator<Item = &Lease> {
        self.groups.iter().flat_map(|g| g.leases.iter())
    }

    pub fn len(&self) -> usize {
        self.groups.iter().map(|g| g.leases.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The group granted for a resource type
    pub fn group(&self, resource_type: &str) -> Option<&LeaseGroup> {
        self.groups
            .iter()
            .find(|g| g.resource_type() == resource_type)
    }

    pub fn contains(&self, id: &LeaseId) -> bool {
        self.leases().any(|l| &l.id == id)
    }
}

#[cfg(test)]
#[path = "lease_tests.rs"]
mod tests;
