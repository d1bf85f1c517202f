// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! Runbook parsing: pool settings and step definitions

mod parser;
mod pool;
mod step;

pub use parser::{load_runbook, parse_runbook, ParseError, Runbook};
pub use pool::PoolDef;
pub use step::{default_env_name, LeaseDef, StepDef};
