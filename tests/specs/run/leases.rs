// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Lease lifecycle specs against a stub pool authority

use crate::prelude::*;

fn runbook(server: &str, leases: &str, run: &str) -> String {
    format!(
        r#"
[pool]
server = "{}"
owner = "leash-spec"

[pool.retry]
max_attempts = 2
initial_backoff = "10ms"

[step.e2e]
run = "{}"
{}
"#,
        server, run, leases
    )
}

const ONE_AWS: &str = r#"
[[step.e2e.lease]]
resource_type = "aws-quota-slice"
"#;

#[test]
fn missing_lease_client_is_reported_before_acquiring() {
    let project = Project::with_runbook(
        r#"
[step.e2e]
run = "touch ran"

[[step.e2e.lease]]
resource_type = "aws-quota-slice"
"#,
    );

    project.leash().args(&["run"]).fails().stderr_has(
        "a lease client was required but none was provided, add the --lease-... arguments",
    );
    assert!(!project.path().join("ran").exists());
}

#[test]
fn steps_without_leases_need_no_lease_client() {
    Project::with_runbook(
        r#"
[step.e2e]
run = "true"

[[step.e2e.lease]]
resource_type = "aws-quota-slice"

[step.unit]
run = "true"
"#,
    )
    .leash()
    .args(&["run", "--step", "unit"])
    .passes()
    .stdout_has("unit: ok");
}

#[test]
fn lease_is_acquired_injected_and_released() {
    let pool = BoskosStub::start(&[("aws-quota-slice", 2)]);
    let project = Project::with_runbook(&runbook(
        &pool.url,
        ONE_AWS,
        "echo $AWS_QUOTA_SLICE > lease.txt",
    ));

    let run = project
        .leash()
        .args(&["run"])
        .passes()
        .stdout_has("e2e: ok");

    let acquiring = run.stderr_position(r#"Acquiring 1 lease(s) for "aws-quota-slice""#);
    let acquired = run.stderr_position(r#"Acquired lease(s) for "aws-quota-slice""#);
    let releasing = run.stderr_position(r#"Releasing lease for "aws-quota-slice""#);
    assert!(acquiring < acquired && acquired < releasing);

    assert_eq!(project.read("lease.txt").trim(), "aws-quota-slice-1");
    assert_eq!(pool.released(), vec!["aws-quota-slice-1".to_string()]);
    assert_eq!(pool.free("aws-quota-slice"), 2);
}

#[test]
fn unavailable_resource_fails_step_without_running_it() {
    let pool = BoskosStub::start(&[("azure4-quota-slice", 0)]);
    let project = Project::with_runbook(&runbook(
        &pool.url,
        r#"
[[step.e2e.lease]]
resource_type = "azure4-quota-slice"
"#,
        "touch ran",
    ));

    project
        .leash()
        .args(&["run"])
        .fails()
        .stdout_has("e2e: failed: failed to acquire lease: resources not found")
        .stderr_has("step e2e failed: failed to acquire lease: resources not found")
        .stderr_has(r#"no free "azure4-quota-slice" resources: 0 free, 0 leased"#);

    assert!(!project.path().join("ran").exists());
}

#[test]
fn multiple_types_are_acquired_with_their_counts() {
    let pool = BoskosStub::start(&[("aws-quota-slice", 3), ("gcp-quota-slice", 5)]);
    let project = Project::with_runbook(&runbook(
        &pool.url,
        r#"
[[step.e2e.lease]]
resource_type = "aws-quota-slice"
count = 3

[[step.e2e.lease]]
resource_type = "gcp-quota-slice"
count = 5
env = "GCP"
"#,
        "echo $AWS_QUOTA_SLICE > aws.txt; echo $GCP > gcp.txt",
    ));

    let run = project.leash().args(&["run"]).passes();

    assert_eq!(project.read("aws.txt").trim().split(',').count(), 3);
    assert_eq!(project.read("gcp.txt").trim().split(',').count(), 5);

    // Released in declaration order
    let aws = run.stderr_position(r#"Releasing lease for "aws-quota-slice""#);
    let gcp = run.stderr_position(r#"Releasing lease for "gcp-quota-slice""#);
    assert!(aws < gcp);
    assert_eq!(pool.free("aws-quota-slice"), 3);
    assert_eq!(pool.free("gcp-quota-slice"), 5);
}

#[test]
fn partial_grant_is_rolled_back() {
    let pool = BoskosStub::start(&[("aws-quota-slice", 1), ("gcp-quota-slice", 0)]);
    let project = Project::with_runbook(&runbook(
        &pool.url,
        r#"
[[step.e2e.lease]]
resource_type = "aws-quota-slice"

[[step.e2e.lease]]
resource_type = "gcp-quota-slice"
"#,
        "touch ran",
    ));

    project
        .leash()
        .args(&["run"])
        .fails()
        .stdout_has("resources not found");

    assert!(!project.path().join("ran").exists());
    assert_eq!(pool.free("aws-quota-slice"), 1);
}

#[test]
fn leases_are_released_when_step_fails() {
    let pool = BoskosStub::start(&[("aws-quota-slice", 1)]);
    let project = Project::with_runbook(&runbook(&pool.url, ONE_AWS, "exit 1"));

    project
        .leash()
        .args(&["run"])
        .fails()
        .stderr_has(r#"Releasing leases for "e2e""#);

    assert_eq!(pool.free("aws-quota-slice"), 1);
}

#[test]
fn lease_server_flag_overrides_runbook() {
    let pool = BoskosStub::start(&[("aws-quota-slice", 1)]);
    let project = Project::with_runbook(&runbook("http://127.0.0.1:1", ONE_AWS, "true"));

    project
        .leash()
        .args(&["run", "--lease-server", &pool.url])
        .passes()
        .stdout_has("e2e: ok");

    assert_eq!(pool.released().len(), 1);
}

#[test]
fn unreadable_credentials_file_is_reported() {
    let pool = BoskosStub::start(&[("aws-quota-slice", 1)]);
    let project = Project::with_runbook(&runbook(&pool.url, ONE_AWS, "touch ran"));

    project
        .leash()
        .args(&["run", "--lease-credentials-file", "missing-token"])
        .fails()
        .stderr_has("failed to read lease credentials missing-token");

    assert!(!project.path().join("ran").exists());
    assert_eq!(pool.free("aws-quota-slice"), 1);
}
