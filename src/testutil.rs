//! Shared fixtures for unit tests.

use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::SystemTime;

use crate::config::{RegistryKind, Settings};
use crate::discovery::{BuildUnit, DOCKERFILE, SMOKE_TEST_SCRIPT};
use crate::engine::ContainerEngine;
use crate::error::{DockyardError, Result};
use crate::fingerprint::fingerprint_str;
use crate::plan::{BuildPlanEntry, Decision};

pub const DAY: u64 = 86_400;

/// Engine that records every call and fails the ones it was told to.
#[derive(Debug, Default)]
pub struct RecordingEngine {
    pub calls: Vec<String>,
    fail: HashSet<String>,
}

impl RecordingEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the call rendered as `call` (e.g. `"build python:3.8"`) fail.
    pub fn failing(mut self, call: &str) -> Self {
        self.fail.insert(call.to_string());
        self
    }

    pub fn calls_starting_with(&self, prefix: &str) -> Vec<&str> {
        self.calls
            .iter()
            .map(String::as_str)
            .filter(|call| call.starts_with(prefix))
            .collect()
    }

    fn record(&mut self, call: String) -> Result<()> {
        let failed = self.fail.contains(&call);
        self.calls.push(call.clone());
        if failed {
            return Err(DockyardError::CommandFailed {
                command: call,
                status: "exit status: 1".to_string(),
                stderr: "simulated failure".to_string(),
            });
        }
        Ok(())
    }
}

impl ContainerEngine for RecordingEngine {
    fn build(&mut self, local_tag: &str, _context_dir: &Path) -> Result<()> {
        self.record(format!("build {local_tag}"))
    }

    fn smoke_test(&mut self, script: &Path, _workdir: &Path) -> Result<()> {
        let unit = script
            .parent()
            .and_then(Path::file_name)
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        self.record(format!("test {unit}"))
    }

    fn login(&mut self, username: &str, _password: &str) -> Result<()> {
        self.record(format!("login {username}"))
    }

    fn tag(&mut self, source: &str, target: &str) -> Result<()> {
        self.record(format!("tag {source} {target}"))
    }

    fn push(&mut self, remote: &str) -> Result<()> {
        self.record(format!("push {remote}"))
    }
}

pub fn settings(registry: RegistryKind) -> Settings {
    Settings {
        registry_service: registry,
        docker_hub_username: "shipwright".to_string(),
        image_rebuild_interval: DAY,
        aws_region: Some("us-east-1".to_string()),
        aws_profile: None,
        release_branch: "master".to_string(),
    }
}

/// Creates `root/<repo>/<tag>/Dockerfile`, plus a smoke test when asked.
pub fn add_unit(root: &Path, repo: &str, tag: &str, with_smoke_test: bool) -> PathBuf {
    let dir = root.join(repo).join(tag);
    fs::create_dir_all(&dir).unwrap();
    fs::write(dir.join(DOCKERFILE), format!("FROM {repo}:{tag}\n")).unwrap();
    if with_smoke_test {
        fs::write(dir.join(SMOKE_TEST_SCRIPT), "exit 0\n").unwrap();
    }
    dir
}

/// A first-build plan entry for a unit created by [`add_unit`].
pub fn entry(root: &Path, repo: &str, tag: &str) -> BuildPlanEntry {
    let unit = BuildUnit::load(&root.join(repo), &root.join(repo).join(tag)).unwrap();
    BuildPlanEntry {
        fingerprint: fingerprint_str(&format!("FROM {repo}:{tag}\n")),
        unit,
        record: None,
        decision: Decision::FirstBuild,
    }
}

pub fn now() -> SystemTime {
    SystemTime::now()
}

/// Log sink shared between the subscriber and the test.
#[derive(Clone, Default)]
struct SharedBuf(Arc<Mutex<Vec<u8>>>);

impl io::Write for SharedBuf {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Runs `f` under a plain-text subscriber and returns what it logged.
pub fn capture_logs<R>(f: impl FnOnce() -> R) -> (R, String) {
    let buf = SharedBuf::default();
    let writer = buf.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(move || writer.clone())
        .with_ansi(false)
        .with_max_level(tracing::Level::DEBUG)
        .finish();

    let result = tracing::subscriber::with_default(subscriber, f);
    let logs = String::from_utf8_lossy(&buf.0.lock().unwrap()).into_owned();
    (result, logs)
}
