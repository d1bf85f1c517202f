// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `leash validate` specs

use crate::prelude::*;
use similar_asserts::assert_eq;

#[test]
fn validate_lists_steps_and_leases() {
    let project = Project::with_runbook(
        r#"
[pool]
server = "http://boskos.invalid"

[step.e2e]
run = "make e2e"

[[step.e2e.lease]]
resource_type = "aws-quota-slice"
count = 3

[[step.e2e.lease]]
resource_type = "gcp-quota-slice"
count = 5
env = "GCP_LEASES"

[step.unit]
run = "make test"
"#,
    );

    let run = project.leash().args(&["validate"]).passes();

    assert_eq!(
        run.stdout,
        "STEP                 LEASES\n\
         e2e                  aws-quota-slice x3 ($AWS_QUOTA_SLICE), gcp-quota-slice x5 ($GCP_LEASES)\n\
         unit                 -\n"
    );
}

#[test]
fn validate_notes_missing_server() {
    Project::with_runbook(
        r#"
[step.e2e]
run = "true"

[[step.e2e.lease]]
resource_type = "aws-quota-slice"
"#,
    )
    .leash()
    .args(&["validate"])
    .passes()
    .stdout_has("no [pool] server configured");
}

#[test]
fn validate_empty_runbook() {
    Project::with_runbook("")
        .leash()
        .args(&["validate"])
        .passes()
        .stdout_has("No steps");
}

#[test]
fn validate_reads_config_path() {
    let project = Project::empty();
    project.file("ci/leash.toml", MINIMAL_RUNBOOK);

    project
        .leash()
        .args(&["validate", "--config", "ci/leash.toml"])
        .passes()
        .stdout_has("build");
}
