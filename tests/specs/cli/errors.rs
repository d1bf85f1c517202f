// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Configuration error specs
//!
//! Bad runbooks and bad arguments are reported before any step runs.

use crate::prelude::*;

#[test]
fn missing_runbook_is_reported() {
    Project::empty()
        .leash()
        .args(&["run"])
        .fails()
        .stderr_has("failed to read leash.toml");
}

#[test]
fn unknown_step_is_reported() {
    Project::with_runbook(MINIMAL_RUNBOOK)
        .leash()
        .args(&["run", "--step", "deploy"])
        .fails()
        .stderr_has("unknown step: deploy");
}

#[test]
fn zero_count_is_rejected() {
    let project = Project::with_runbook(
        r#"
[step.e2e]
run = "touch ran"

[[step.e2e.lease]]
resource_type = "aws-quota-slice"
count = 0
"#,
    );

    project
        .leash()
        .args(&["run"])
        .fails()
        .stderr_has("step.e2e")
        .stderr_has("must be at least 1");
    assert!(!project.path().join("ran").exists());
}

#[test]
fn duplicate_resource_type_is_rejected() {
    Project::with_runbook(
        r#"
[step.e2e]
run = "true"

[[step.e2e.lease]]
resource_type = "aws-quota-slice"

[[step.e2e.lease]]
resource_type = "aws-quota-slice"
env = "OTHER"
"#,
    )
    .leash()
    .args(&["validate"])
    .fails()
    .stderr_has("requested more than once");
}

#[test]
fn unknown_pool_setting_is_rejected() {
    Project::with_runbook(
        r#"
[pool]
sever = "http://typo"
"#,
    )
    .leash()
    .args(&["validate"])
    .fails()
    .stderr_has("sever");
}
