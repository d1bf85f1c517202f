// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared fixtures for CLI specs

#![allow(dead_code)]

use std::collections::HashMap;
use std::io::{BufRead, BufReader, Write};
use std::net::TcpListener;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

/// Runbook with one step and no leases
pub const MINIMAL_RUNBOOK: &str = r#"
[step.build]
run = "echo building"
"#;

/// A scratch directory holding a runbook
pub struct Project {
    dir: TempDir,
}

impl Project {
    pub fn empty() -> Self {
        Self {
            dir: tempfile::tempdir().unwrap(),
        }
    }

    /// Project with `leash.toml` already written
    pub fn with_runbook(content: &str) -> Self {
        let project = Self::empty();
        project.file("leash.toml", content);
        project
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn file(&self, path: &str, content: &str) {
        let full = self.dir.path().join(path);
        if let Some(parent) = full.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(full, content).unwrap();
    }

    pub fn read(&self, path: &str) -> String {
        std::fs::read_to_string(self.dir.path().join(path)).unwrap()
    }

    pub fn leash(&self) -> CliBuilder {
        let mut cmd = assert_cmd::Command::cargo_bin("leash").unwrap();
        cmd.current_dir(self.dir.path()).env("RUST_LOG", "info");
        CliBuilder { cmd }
    }
}

pub struct CliBuilder {
    cmd: assert_cmd::Command,
}

impl CliBuilder {
    pub fn args(mut self, args: &[&str]) -> Self {
        self.cmd.args(args);
        self
    }

    pub fn env(mut self, key: &str, value: &str) -> Self {
        self.cmd.env(key, value);
        self
    }

    /// Run and require exit status 0
    pub fn passes(mut self) -> RunAssert {
        let output = self.cmd.output().unwrap();
        let run = RunAssert::from(output.clone());
        assert!(
            output.status.success(),
            "expected success, got {:?}\nstdout:\n{}\nstderr:\n{}",
            output.status.code(),
            run.stdout,
            run.stderr
        );
        run
    }

    /// Run and require a non-zero exit status
    pub fn fails(mut self) -> RunAssert {
        let output = self.cmd.output().unwrap();
        let run = RunAssert::from(output.clone());
        assert!(
            !output.status.success(),
            "expected failure\nstdout:\n{}\nstderr:\n{}",
            run.stdout,
            run.stderr
        );
        run
    }
}

pub struct RunAssert {
    pub stdout: String,
    pub stderr: String,
}

impl From<std::process::Output> for RunAssert {
    fn from(output: std::process::Output) -> Self {
        Self {
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        }
    }
}

impl RunAssert {
    pub fn stdout_has(self, needle: &str) -> Self {
        assert!(
            self.stdout.contains(needle),
            "stdout missing {:?}:\n{}",
            needle,
            self.stdout
        );
        self
    }

    pub fn stdout_lacks(self, needle: &str) -> Self {
        assert!(
            !self.stdout.contains(needle),
            "stdout unexpectedly has {:?}:\n{}",
            needle,
            self.stdout
        );
        self
    }

    pub fn stderr_has(self, needle: &str) -> Self {
        assert!(
            self.stderr.contains(needle),
            "stderr missing {:?}:\n{}",
            needle,
            self.stderr
        );
        self
    }

    pub fn stderr_lacks(self, needle: &str) -> Self {
        assert!(
            !self.stderr.contains(needle),
            "stderr unexpectedly has {:?}:\n{}",
            needle,
            self.stderr
        );
        self
    }

    /// Byte offset of `needle` in stderr, for ordering checks
    pub fn stderr_position(&self, needle: &str) -> usize {
        self.stderr
            .find(needle)
            .unwrap_or_else(|| panic!("stderr missing {:?}:\n{}", needle, self.stderr))
    }
}

#[derive(Default)]
struct PoolState {
    free: HashMap<String, u32>,
    leased: HashMap<String, String>,
    issued: u32,
    released: Vec<String>,
}

/// In-process Boskos stand-in with per-type free counts
pub struct BoskosStub {
    pub url: String,
    state: Arc<Mutex<PoolState>>,
}

impl BoskosStub {
    pub fn start(pools: &[(&str, u32)]) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let url = format!("http://{}", listener.local_addr().unwrap());
        let state = Arc::new(Mutex::new(PoolState {
            free: pools.iter().map(|(t, n)| (t.to_string(), *n)).collect(),
            ..PoolState::default()
        }));
        let shared = Arc::clone(&state);

        std::thread::spawn(move || {
            for stream in listener.incoming() {
                let Ok(mut stream) = stream else { break };
                let mut reader = BufReader::new(stream.try_clone().unwrap());
                let mut request_line = String::new();
                let _ = reader.read_line(&mut request_line);
                loop {
                    let mut line = String::new();
                    if reader.read_line(&mut line).unwrap_or(0) == 0 || line == "\r\n" {
                        break;
                    }
                }

                let (status, body) = route(&mut shared.lock().unwrap(), &request_line);
                let response = format!(
                    "HTTP/1.1 {} Stub\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    status,
                    body.len(),
                    body
                );
                let _ = stream.write_all(response.as_bytes());
            }
        });

        Self { url, state }
    }

    pub fn free(&self, resource_type: &str) -> u32 {
        let state = self.state.lock().unwrap();
        state.free.get(resource_type).copied().unwrap_or(0)
    }

    pub fn released(&self) -> Vec<String> {
        self.state.lock().unwrap().released.clone()
    }
}

fn route(state: &mut PoolState, request_line: &str) -> (u16, String) {
    let target = request_line.split_whitespace().nth(1).unwrap_or_default();
    let (path, query) = target.split_once('?').unwrap_or((target, ""));
    let params: HashMap<&str, &str> = query
        .split('&')
        .filter_map(|pair| pair.split_once('='))
        .collect();
    let param = |key: &str| params.get(key).copied().unwrap_or_default().to_string();

    match path {
        "/acquire" => {
            let resource_type = param("type");
            match state.free.get_mut(&resource_type) {
                Some(free) if *free > 0 => {
                    *free -= 1;
                    state.issued += 1;
                    let name = format!("{}-{}", resource_type, state.issued);
                    state.leased.insert(name.clone(), resource_type.clone());
                    (
                        200,
                        format!(r#"{{"name":"{}","type":"{}","state":"leased"}}"#, name, resource_type),
                    )
                }
                _ => (404, "resource not found".to_string()),
            }
        }
        "/update" => match state.leased.contains_key(&param("name")) {
            true => (200, String::new()),
            false => (404, "resource not found".to_string()),
        },
        "/release" => {
            let name = param("name");
            match state.leased.remove(&name) {
                Some(resource_type) => {
                    *state.free.entry(resource_type).or_default() += 1;
                    state.released.push(name);
                    (200, String::new())
                }
                None => (404, "resource not found".to_string()),
            }
        }
        "/metric" => {
            let resource_type = param("type");
            let free = state.free.get(&resource_type).copied().unwrap_or(0);
            let leased = state
                .leased
                .values()
                .filter(|t| **t == resource_type)
                .count();
            (
                200,
                format!(
                    r#"{{"type":"{}","current":{{"free":{},"leased":{}}}}}"#,
                    resource_type, free, leased
                ),
            )
        }
        _ => (404, String::new()),
    }
}
