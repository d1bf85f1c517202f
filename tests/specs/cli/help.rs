// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Help output specs

use crate::prelude::*;

#[test]
fn help_lists_commands() {
    Project::empty()
        .leash()
        .args(&["--help"])
        .passes()
        .stdout_has("run")
        .stdout_has("validate");
}

#[test]
fn run_help_lists_lease_flags() {
    Project::empty()
        .leash()
        .args(&["run", "--help"])
        .passes()
        .stdout_has("--lease-server")
        .stdout_has("--lease-owner")
        .stdout_has("--lease-credentials-file")
        .stdout_has("--step");
}

#[test]
fn no_subcommand_is_a_usage_error() {
    Project::empty().leash().fails().stderr_has("Usage");
}
