// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Identifier generation for pool owners, request ids and fake lease names

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Generates unique identifiers
pub trait IdGen: Clone + Send + Sync + 'static {
    fn next(&self) -> String;
}

/// UUID-based generator, optionally prefixed (`leash-<uuid>`)
#[derive(Clone, Debug, Default)]
pub struct UuidIdGen {
    prefix: Option<String>,
}

impl UuidIdGen {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: Some(prefix.into()),
        }
    }
}

impl IdGen for UuidIdGen {
    fn next(&self) -> String {
        let id = uuid::Uuid::new_v4();
        match &self.prefix {
            Some(prefix) => format!("{}-{}", prefix, id),
            None => id.to_string(),
        }
    }
}

/// Owner name used with the pool authority when none is configured
pub fn default_owner() -> String {
    UuidIdGen::with_prefix("leash").next()
}

/// Sequential generator, `<prefix>-0`, `<prefix>-1`, ...
///
/// Clones share the counter.
#[derive(Clone, Debug)]
pub struct SequentialIdGen {
    prefix: String,
    counter: Arc<AtomicU64>,
}

impl SequentialIdGen {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            counter: Arc::new(AtomicU64::new(0)),
        }
    }
}

impl IdGen for SequentialIdGen {
    fn next(&self) -> String {
        let n = self.counter.fetch_add(1, Ordering::SeqCst);
        format!("{}-{}", self.prefix, n)
    }
}

#[cfg(test)]
#[path = "id_tests.rs"]
mod tests;
