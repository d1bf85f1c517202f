// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Pool client construction from runbook settings and `--lease-*` flags

use anyhow::{bail, Context, Result};
use clap::Args;
use leash_adapters::{BoskosConfig, BoskosPoolClient, TracedPoolClient};
use leash_core::default_owner;
use leash_runbook::PoolDef;
use std::path::{Path, PathBuf};

/// The pool client every command talks through
pub type Client = TracedPoolClient<BoskosPoolClient>;

/// Each flag overrides the matching `[pool]` setting
#[derive(Args, Debug, Default, Clone)]
pub struct LeaseArgs {
    /// Base URL of the pool authority
    #[arg(long, value_name = "URL")]
    pub lease_server: Option<String>,

    /// Owner name recorded on leased resources
    #[arg(long, value_name = "NAME")]
    pub lease_owner: Option<String>,

    /// File holding a bearer token for the pool authority
    #[arg(long, value_name = "PATH")]
    pub lease_credentials_file: Option<PathBuf>,
}

impl LeaseArgs {
    /// Layer the flags over `pool`; a relative runbook credentials path is taken from `base_dir`
    pub fn apply(&self, pool: &PoolDef, base_dir: &Path) -> PoolDef {
        let mut pool = pool.clone();
        pool.credentials_file = pool.credentials_file.map(|path| base_dir.join(path));

        if let Some(server) = &self.lease_server {
            pool.server = Some(server.clone());
        }
        if let Some(owner) = &self.lease_owner {
            pool.owner = Some(owner.clone());
        }
        if let Some(path) = &self.lease_credentials_file {
            pool.credentials_file = Some(path.clone());
        }
        pool
    }
}

/// Build the client, or `None` when no server is configured
pub fn connect(pool: &PoolDef) -> Result<Option<Client>> {
    let Some(server) = &pool.server else {
        return Ok(None);
    };

    let token = match &pool.credentials_file {
        Some(path) => Some(read_token(path)?),
        None => None,
    };
    let owner = pool.owner.clone().unwrap_or_else(default_owner);
    tracing::debug!(server, owner, "using pool authority");

    let client = BoskosPoolClient::new(BoskosConfig {
        server: server.clone(),
        owner,
        token,
        call_timeout: pool.call_timeout,
    });
    Ok(Some(TracedPoolClient::new(client)))
}

fn read_token(path: &Path) -> Result<String> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read lease credentials {}", path.display()))?;
    let token = raw.trim();
    if token.is_empty() {
        bail!("lease credentials file {} is empty", path.display());
    }
    Ok(token.to_string())
}

#[cfg(test)]
#[path = "pool_tests.rs"]
mod tests;
