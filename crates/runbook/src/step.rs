// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Step definitions

use leash_core::LeaseSpec;
use std::collections::BTreeMap;
use std::path::PathBuf;

/// One `[[step.<name>.lease]]` entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeaseDef {
    pub spec: LeaseSpec,
    /// Variable that receives the comma-joined lease ids
    pub env: String,
}

/// A step definition from the runbook
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepDef {
    /// Step name
    pub name: String,
    /// Shell command
    pub run: String,
    /// Working directory, relative to the runbook
    pub cwd: Option<PathBuf>,
    /// Static environment
    pub env: BTreeMap<String, String>,
    /// Lease requirements, in declaration order
    pub leases: Vec<LeaseDef>,
}

impl StepDef {
    pub fn specs(&self) -> Vec<LeaseSpec> {
        self.leases.iter().map(|l| l.spec.clone()).collect()
    }

    pub fn needs_leases(&self) -> bool {
        !self.leases.is_empty()
    }
}

/// Environment variable name for a resource type: `aws-quota-slice` => `AWS_QUOTA_SLICE`
pub fn default_env_name(resource_type: &str) -> String {
    resource_type
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_uppercase()
            } else {
                '_'
            }
        })
        .collect()
}

#[cfg(test)]
#[path = "step_tests.rs"]
mod tests;
