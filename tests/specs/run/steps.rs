// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Step execution specs without leases

use crate::prelude::*;

const TWO_STEPS: &str = r#"
[step.lint]
run = "touch lint.done"

[step.unit]
run = "echo $GREETING > unit.out"

[step.unit.env]
GREETING = "hello"
"#;

#[test]
fn step_without_leases_runs() {
    Project::with_runbook(MINIMAL_RUNBOOK)
        .leash()
        .args(&["run"])
        .passes()
        .stdout_has("build: ok")
        .stderr_has("step build succeeded");
}

#[test]
fn all_steps_run_by_default() {
    let project = Project::with_runbook(TWO_STEPS);

    project
        .leash()
        .args(&["run"])
        .passes()
        .stdout_has("lint: ok")
        .stdout_has("unit: ok");

    assert!(project.path().join("lint.done").exists());
    assert_eq!(project.read("unit.out"), "hello\n");
}

#[test]
fn step_flag_selects_steps() {
    let project = Project::with_runbook(TWO_STEPS);

    project
        .leash()
        .args(&["run", "--step", "unit"])
        .passes()
        .stdout_has("unit: ok")
        .stdout_lacks("lint");

    assert!(!project.path().join("lint.done").exists());
}

#[test]
fn failing_step_fails_the_run() {
    Project::with_runbook(
        r#"
[step.broken]
run = "exit 3"

[step.fine]
run = "true"
"#,
    )
    .leash()
    .args(&["run"])
    .fails()
    .stdout_has("broken: failed: step exited with code 3")
    .stdout_has("fine: ok")
    .stderr_has("1 of 2 step(s) failed");
}

#[test]
fn step_cwd_is_relative_to_runbook() {
    let project = Project::empty();
    project.file(
        "ci/leash.toml",
        r#"
[step.build]
run = "pwd > where.txt"
cwd = "work"
"#,
    );
    std::fs::create_dir_all(project.path().join("ci/work")).unwrap();

    project
        .leash()
        .args(&["run", "--config", "ci/leash.toml"])
        .passes();

    assert!(project.read("ci/work/where.txt").trim().ends_with("ci/work"));
}
