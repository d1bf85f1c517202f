// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Runbook TOML parsing

use crate::{default_env_name, LeaseDef, PoolDef, StepDef};
use leash_core::{validate_specs, LeaseSpec, SpecError};
use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use thiserror::Error;

/// Errors that can occur during runbook parsing
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("missing required field: {0}")]
    MissingField(String),
    #[error("invalid format: {0}")]
    InvalidFormat(String),
    #[error("step.{step}: {source}")]
    Spec { step: String, source: SpecError },
}

/// A parsed runbook
#[derive(Debug, Clone, Default)]
pub struct Runbook {
    pub pool: PoolDef,
    pub steps: BTreeMap<String, StepDef>,
}

impl Runbook {
    /// Get a step definition by name
    pub fn get_step(&self, name: &str) -> Option<&StepDef> {
        self.steps.get(name)
    }
}

/// Read and parse a runbook file
pub fn load_runbook(path: &Path) -> Result<Runbook, ParseError> {
    let content = std::fs::read_to_string(path).map_err(|source| ParseError::Io {
        path: path.display().to_string(),
        source,
    })?;
    parse_runbook(&content)
}

/// Parse a runbook from TOML content
pub fn parse_runbook(content: &str) -> Result<Runbook, ParseError> {
    let raw: toml::Value = toml::from_str(content)?;
    let table = raw
        .as_table()
        .ok_or_else(|| ParseError::InvalidFormat("root must be a table".to_string()))?;

    let mut runbook = Runbook::default();

    if let Some(pool) = table.get("pool") {
        runbook.pool = pool
            .clone()
            .try_into()
            .map_err(|e: toml::de::Error| ParseError::InvalidFormat(format!("pool: {}", e)))?;
    }

    if let Some(steps) = table.get("step") {
        let steps = steps
            .as_table()
            .ok_or_else(|| ParseError::InvalidFormat("step must be a table".to_string()))?;
        for (name, value) in steps {
            let step = parse_step(name, value)?;
            runbook.steps.insert(name.clone(), step);
        }
    }

    Ok(runbook)
}

fn parse_step(name: &str, value: &toml::Value) -> Result<StepDef, ParseError> {
    let table = value
        .as_table()
        .ok_or_else(|| ParseError::InvalidFormat(format!("step.{} must be a table", name)))?;

    let run = table
        .get("run")
        .ok_or_else(|| ParseError::MissingField(format!("step.{}.run", name)))?
        .as_str()
        .ok_or_else(|| ParseError::InvalidFormat(format!("step.{}.run must be a string", name)))?
        .to_string();

    let cwd = table.get("cwd").and_then(|v| v.as_str()).map(Into::into);

    let env = match table.get("env") {
        Some(value) => {
            let env = value.as_table().ok_or_else(|| {
                ParseError::InvalidFormat(format!("step.{}.env must be a table", name))
            })?;
            env.iter()
                .map(|(k, v)| match v.as_str() {
                    Some(s) => Ok((k.clone(), s.to_string())),
                    None => Err(ParseError::InvalidFormat(format!(
                        "step.{}.env.{} must be a string",
                        name, k
                    ))),
                })
                .collect::<Result<BTreeMap<_, _>, _>>()?
        }
        None => BTreeMap::new(),
    };

    let leases = match table.get("lease") {
        Some(value) => {
            let entries = value.as_array().ok_or_else(|| {
                ParseError::InvalidFormat(format!(
                    "step.{}.lease must be an array of tables",
                    name
                ))
            })?;
            entries
                .iter()
                .map(|entry| parse_lease(name, entry))
                .collect::<Result<Vec<_>, _>>()?
        }
        None => Vec::new(),
    };

    let specs: Vec<LeaseSpec> = leases.iter().map(|l| l.spec.clone()).collect();
    validate_specs(&specs).map_err(|source| ParseError::Spec {
        step: name.to_string(),
        source,
    })?;

    let mut env_names = HashSet::new();
    for lease in &leases {
        if !env_names.insert(lease.env.as_str()) {
            return Err(ParseError::InvalidFormat(format!(
                "step.{}: lease variable {} is assigned more than once",
                name, lease.env
            )));
        }
    }

    Ok(StepDef {
        name: name.to_string(),
        run,
        cwd,
        env,
        leases,
    })
}

fn parse_lease(step: &str, value: &toml::Value) -> Result<LeaseDef, ParseError> {
    let table = value
        .as_table()
        .ok_or_else(|| ParseError::InvalidFormat(format!("step.{}.lease must be a table", step)))?;

    let resource_type = table
        .get("resource_type")
        .and_then(|v| v.as_str())
        .ok_or_else(|| ParseError::MissingField(format!("step.{}.lease.resource_type", step)))?;

    let count = match table.get("count") {
        Some(v) => {
            let n = v.as_integer().ok_or_else(|| {
                ParseError::InvalidFormat(format!("step.{}.lease.count must be an integer", step))
            })?;
            u32::try_from(n).map_err(|_| {
                ParseError::InvalidFormat(format!(
                    "step.{}.lease.count out of range: {}",
                    step, n
                ))
            })?
        }
        None => 1,
    };

    let spec = LeaseSpec::new(resource_type, count).map_err(|source| ParseError::Spec {
        step: step.to_string(),
        source,
    })?;

    let env = table
        .get("env")
        .and_then(|v| v.as_str())
        .map(String::from)
        .unwrap_or_else(|| default_env_name(resource_type));

    Ok(LeaseDef { spec, env })
}

#[cfg(test)]
#[path = "parser_tests.rs"]
mod tests;
