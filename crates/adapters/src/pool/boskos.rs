// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Boskos HTTP pool client
//!
//! Boskos grants one resource per `/acquire` call, so a multi-unit request is
//! a sequence of single acquisitions, rolled back if any of them fails.

use super::{PoolClient, PoolError, PoolMetrics};
use async_trait::async_trait;
use leash_core::{Clock, IdGen, Lease, SystemClock, UuidIdGen};
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

const FREE_STATE: &str = "free";
const LEASED_STATE: &str = "leased";

/// Connection settings for a Boskos server
#[derive(Debug, Clone)]
pub struct BoskosConfig {
    /// Base URL, e.g. `http://boskos.ci:8080`
    pub server: String,
    /// Owner name recorded on every leased resource
    pub owner: String,
    /// Bearer token sent with each request
    pub token: Option<String>,
    /// Deadline for a single HTTP exchange
    pub call_timeout: Duration,
}

#[derive(Deserialize)]
struct BoskosResource {
    name: String,
    #[serde(rename = "type")]
    resource_type: String,
}

#[derive(Deserialize)]
struct BoskosMetric {
    #[serde(default)]
    current: HashMap<String, u32>,
}

struct BoskosInner {
    agent: ureq::Agent,
    base_url: String,
    owner: String,
    token: Option<String>,
    request_ids: UuidIdGen,
    clock: SystemClock,
}

/// Pool client speaking the Boskos REST API
#[derive(Clone)]
pub struct BoskosPoolClient {
    inner: Arc<BoskosInner>,
}

impl BoskosPoolClient {
    pub fn new(config: BoskosConfig) -> Self {
        let agent_config = ureq::Agent::config_builder()
            .timeout_global(Some(config.call_timeout))
            .http_status_as_error(false)
            .build();

        Self {
            inner: Arc::new(BoskosInner {
                agent: agent_config.into(),
                base_url: config.server.trim_end_matches('/').to_string(),
                owner: config.owner,
                token: config.token,
                request_ids: UuidIdGen::new(),
                clock: SystemClock,
            }),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.inner.base_url, path)
    }

    fn post(&self, path: &str, query: &[(&str, &str)]) -> Result<(u16, String), PoolError> {
        let mut request = self.inner.agent.post(self.url(path));
        for (key, value) in query {
            request = request.query(*key, *value);
        }
        if let Some(token) = &self.inner.token {
            request = request.header("Authorization", format!("Bearer {}", token));
        }

        let mut response = request
            .send_empty()
            .map_err(|e| PoolError::Transient(format!("POST /{}: {}", path, e)))?;
        let status = response.status().as_u16();
        let body = response
            .body_mut()
            .read_to_string()
            .map_err(|e| PoolError::Transient(format!("failed to read response: {}", e)))?;
        Ok((status, body))
    }

    fn acquire_one(&self, resource_type: &str) -> Result<Lease, PoolError> {
        let request_id = self.inner.request_ids.next();
        let (status, body) = self.post(
            "acquire",
            &[
                ("type", resource_type),
                ("state", FREE_STATE),
                ("dest", LEASED_STATE),
                ("owner", &self.inner.owner),
                ("request_id", &request_id),
            ],
        )?;

        match status {
            200 => {
                let resource: BoskosResource = serde_json::from_str(&body).map_err(|e| {
                    PoolError::Transient(format!("malformed acquire response: {}", e))
                })?;
                if resource.resource_type != resource_type {
                    tracing::warn!(
                        requested = resource_type,
                        granted = resource.resource_type,
                        "pool granted a different resource type"
                    );
                }
                Ok(Lease::new(
                    resource.name,
                    resource_type,
                    self.inner.clock.utc_now(),
                ))
            }
            404 => Err(PoolError::Unavailable {
                resource_type: resource_type.to_string(),
            }),
            401 | 403 | 409 => Err(PoolError::Rejected(format!(
                "acquire {:?}: status {}: {}",
                resource_type,
                status,
                body.trim()
            ))),
            _ => Err(PoolError::Transient(format!(
                "acquire {:?}: status {}: {}",
                resource_type,
                status,
                body.trim()
            ))),
        }
    }

    fn acquire_blocking(&self, resource_type: &str, count: u32) -> Result<Vec<Lease>, PoolError> {
        let mut granted = Vec::with_capacity(count as usize);
        for _ in 0..count {
            match self.acquire_one(resource_type) {
                Ok(lease) => granted.push(lease),
                Err(e) => {
                    for lease in &granted {
                        if let Err(release_err) = self.release_blocking(lease) {
                            tracing::warn!(
                                lease = %lease.id,
                                error = %release_err,
                                "failed to roll back partial grant"
                            );
                        }
                    }
                    return Err(e);
                }
            }
        }
        Ok(granted)
    }

    fn lease_status(
        &self,
        lease: &Lease,
        op: &str,
        status: u16,
        body: &str,
    ) -> Result<(), PoolError> {
        match status {
            200 => Ok(()),
            404 | 409 => Err(PoolError::Expired(lease.id.clone())),
            401 | 403 => Err(PoolError::Rejected(format!(
                "{} {}: status {}: {}",
                op,
                lease.id,
                status,
                body.trim()
            ))),
            _ => Err(PoolError::Transient(format!(
                "{} {}: status {}: {}",
                op,
                lease.id,
                status,
                body.trim()
            ))),
        }
    }

    fn heartbeat_blocking(&self, lease: &Lease) -> Result<(), PoolError> {
        let (status, body) = self.post(
            "update",
            &[
                ("name", lease.id.as_str()),
                ("owner", &self.inner.owner),
                ("state", LEASED_STATE),
            ],
        )?;
        self.lease_status(lease, "update", status, &body)
    }

    fn release_blocking(&self, lease: &Lease) -> Result<(), PoolError> {
        let (status, body) = self.post(
            "release",
            &[
                ("name", lease.id.as_str()),
                ("dest", FREE_STATE),
                ("owner", &self.inner.owner),
            ],
        )?;
        self.lease_status(lease, "release", status, &body)
    }

    fn metrics_blocking(&self, resource_type: &str) -> Result<PoolMetrics, PoolError> {
        let mut request = self
            .inner
            .agent
            .get(self.url("metric"))
            .query("type", resource_type);
        if let Some(token) = &self.inner.token {
            request = request.header("Authorization", format!("Bearer {}", token));
        }
        let mut response = request
            .call()
            .map_err(|e| PoolError::Transient(format!("GET /metric: {}", e)))?;
        let status = response.status().as_u16();
        let body = response
            .body_mut()
            .read_to_string()
            .map_err(|e| PoolError::Transient(format!("failed to read response: {}", e)))?;
        if status != 200 {
            return Err(PoolError::Transient(format!(
                "metric {:?}: status {}: {}",
                resource_type,
                status,
                body.trim()
            )));
        }

        let metric: BoskosMetric = serde_json::from_str(&body)
            .map_err(|e| PoolError::Transient(format!("malformed metric response: {}", e)))?;
        Ok(PoolMetrics {
            free: metric.current.get(FREE_STATE).copied().unwrap_or(0),
            leased: metric.current.get(LEASED_STATE).copied().unwrap_or(0),
        })
    }

    /// Run a blocking HTTP exchange off the async worker threads
    async fn blocking<T, F>(&self, f: F) -> Result<T, PoolError>
    where
        T: Send + 'static,
        F: FnOnce(BoskosPoolClient) -> Result<T, PoolError> + Send + 'static,
    {
        let this = self.clone();
        tokio::task::spawn_blocking(move || f(this))
            .await
            .map_err(|e| PoolError::Transient(format!("pool worker failed: {}", e)))?
    }
}

#[async_trait]
impl PoolClient for BoskosPoolClient {
    async fn acquire(&self, resource_type: &str, count: u32) -> Result<Vec<Lease>, PoolError> {
        let resource_type = resource_type.to_string();
        self.blocking(move |client| client.acquire_blocking(&resource_type, count))
            .await
    }

    async fn heartbeat(&self, lease: &Lease) -> Result<(), PoolError> {
        let lease = lease.clone();
        self.blocking(move |client| client.heartbeat_blocking(&lease))
            .await
    }

    async fn release(&self, lease: &Lease) -> Result<(), PoolError> {
        let lease = lease.clone();
        self.blocking(move |client| client.release_blocking(&lease))
            .await
    }

    async fn metrics(&self, resource_type: &str) -> Result<PoolMetrics, PoolError> {
        let resource_type = resource_type.to_string();
        self.blocking(move |client| client.metrics_blocking(&resource_type))
            .await
    }
}

impl std::fmt::Debug for BoskosPoolClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BoskosPoolClient")
            .field("server", &self.inner.base_url)
            .field("owner", &self.inner.owner)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[path = "boskos_tests.rs"]
mod tests;
