#![allow(dead_code)]

use std::path::{Path, PathBuf};

use assert_fs::TempDir;
use assert_fs::prelude::*;
use dockyard::config::{RunContext, Runtime, Settings};
use dockyard::engine::ContainerEngine;
use dockyard::error::{DockyardError, Result};

pub const SETTINGS: &str = r#"{
    # registry
    "REGISTRY_SERVICE": "dockerhub",
    "DOCKER_HUB_USERNAME": "shipwright",  // pushed as shipwright/<repo>:<tag>
    "IMAGE_REBUILD_INTERVAL": 86400,
    "AWS_REGION": "us-east-1",
    "AWS_PROFILE": "ci"
}"#;

/// A project root with `config.json` and a `repos/` tree.
pub struct Project {
    pub root: TempDir,
}

impl Project {
    pub fn new() -> Self {
        let root = TempDir::new().unwrap();
        root.child("config.json").write_str(SETTINGS).unwrap();
        root.child("repos").create_dir_all().unwrap();
        Self { root }
    }

    pub fn path(&self) -> &Path {
        self.root.path()
    }

    pub fn repos_dir(&self) -> PathBuf {
        self.root.path().join("repos")
    }

    pub fn settings(&self) -> Settings {
        Settings::load(&self.root.path().join("config.json")).unwrap()
    }

    /// Adds `repos/<repo>/<tag>` with a Dockerfile and a passing smoke test.
    pub fn add_image(&self, repo: &str, tag: &str, dockerfile: &str) -> &Self {
        let tag_dir = self.root.child("repos").child(repo).child(tag);
        tag_dir.child("Dockerfile").write_str(dockerfile).unwrap();
        tag_dir.child("smoke-test.sh").write_str("exit 0\n").unwrap();
        self
    }

    pub fn write_dockerfile(&self, repo: &str, tag: &str, dockerfile: &str) {
        self.root
            .child("repos")
            .child(repo)
            .child(tag)
            .child("Dockerfile")
            .write_str(dockerfile)
            .unwrap();
    }

    /// A CI context on `branch` with the project's settings.
    pub fn ci_context(&self, branch: &str) -> RunContext {
        RunContext::builder(self.settings())
            .runtime(Runtime::CircleCi)
            .region("us-east-1")
            .registry_password("s3cret")
            .branch(branch)
            .build()
    }

    pub fn local_context(&self) -> RunContext {
        RunContext::builder(self.settings()).build()
    }
}

/// Engine fake that records calls and fails those whose rendering starts
/// with one of `fail_prefixes`.
#[derive(Debug, Default)]
pub struct FakeEngine {
    pub calls: Vec<String>,
    pub fail_prefixes: Vec<String>,
}

impl FakeEngine {
    pub fn failing(prefix: &str) -> Self {
        Self {
            calls: Vec::new(),
            fail_prefixes: vec![prefix.to_string()],
        }
    }

    pub fn count(&self, verb: &str) -> usize {
        self.calls
            .iter()
            .filter(|call| call.split(' ').next() == Some(verb))
            .count()
    }

    fn record(&mut self, call: String) -> Result<()> {
        let fail = self
            .fail_prefixes
            .iter()
            .any(|prefix| call.starts_with(prefix.as_str()));
        self.calls.push(call.clone());
        if fail {
            return Err(DockyardError::CommandFailed {
                command: call,
                status: "exit status: 1".to_string(),
                stderr: String::new(),
            });
        }
        Ok(())
    }
}

impl ContainerEngine for FakeEngine {
    fn build(&mut self, local_tag: &str, _context_dir: &Path) -> Result<()> {
        self.record(format!("build {local_tag}"))
    }

    fn smoke_test(&mut self, _script: &Path, workdir: &Path) -> Result<()> {
        self.record(format!("test {}", workdir.display()))
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
