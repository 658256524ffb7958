//! The external container tooling dockyard drives.
//!
//! Building, smoke-testing, authenticating and pushing are delegated to a
//! [`ContainerEngine`]. [`CliEngine`] shells out to a Docker-compatible CLI;
//! tests substitute recording fakes.

use std::ffi::OsStr;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Output, Stdio};

use tracing::{debug, info};

use crate::error::{DockyardError, Result};

/// Operations the pipeline needs from a container engine.
///
/// Every call blocks until the underlying command finishes. Any `Err` is
/// treated by callers as a failure of the current unit only.
pub trait ContainerEngine {
    /// Builds `context_dir` into a local image tagged `local_tag`.
    fn build(&mut self, local_tag: &str, context_dir: &Path) -> Result<()>;

    /// Runs the smoke-test `script` with `workdir` as its working directory.
    fn smoke_test(&mut self, script: &Path, workdir: &Path) -> Result<()>;

    /// Authenticates against the registry.
    fn login(&mut self, username: &str, password: &str) -> Result<()>;

    /// Adds the `target` reference to the local image `source`.
    fn tag(&mut self, source: &str, target: &str) -> Result<()>;

    /// Pushes `remote` to the registry.
    fn push(&mut self, remote: &str) -> Result<()>;
}

/// Engine backed by a Docker-compatible command line (`docker`, `podman`).
#[derive(Debug, Clone)]
pub struct CliEngine {
    program: PathBuf,
    shell: PathBuf,
}

impl Default for CliEngine {
    fn default() -> Self {
        Self::new("docker", "bash")
    }
}

impl CliEngine {
    /// Creates an engine running `program` for image operations and `shell`
    /// for smoke-test scripts.
    pub fn new(program: impl Into<PathBuf>, shell: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            shell: shell.into(),
        }
    }

    fn engine_command<I, S>(&self, args: I) -> Command
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let mut command = Command::new(&self.program);
        command.args(args);
        command
    }
}

impl ContainerEngine for CliEngine {
    fn build(&mut self, local_tag: &str, context_dir: &Path) -> Result<()> {
        info!("Build docker image in context at {} ...", context_dir.display());
        let mut command = self.engine_command(["build", "-t", local_tag]);
        command.arg(context_dir);
        run_and_log(command, None)
    }

    fn smoke_test(&mut self, script: &Path, workdir: &Path) -> Result<()> {
        info!("Run smoke test script {} ...", script.display());
        let mut command = Command::new(&self.shell);
        command.arg(script).current_dir(workdir);
        run_and_log(command, None)
    }

    fn login(&mut self, username: &str, password: &str) -> Result<()> {
        info!("Log in to registry as {username} ...");
        let command =
            self.engine_command(["login", "--username", username, "--password-stdin"]);
        run_and_log(command, Some(password))
    }

    fn tag(&mut self, source: &str, target: &str) -> Result<()> {
        run_and_log(self.engine_command(["tag", source, target]), None)
    }

    fn push(&mut self, remote: &str) -> Result<()> {
        info!("Push docker image {remote} ...");
        run_and_log(self.engine_command(["push", remote]), None)
    }
}

fn render(command: &Command) -> String {
    std::iter::once(command.get_program())
        .chain(command.get_args())
        .map(|part| part.to_string_lossy())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Runs `command` to completion, feeding `stdin` if given.
///
/// Standard output is logged at debug level; a non-zero exit becomes
/// [`DockyardError::CommandFailed`] carrying the captured stderr.
fn run_and_log(mut command: Command, stdin: Option<&str>) -> Result<()> {
    let rendered = render(&command);
    info!("Run >>> {rendered}");

    command
        .stdin(if stdin.is_some() {
            Stdio::piped()
        } else {
            Stdio::null()
        })
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    let spawn_error = |source: std::io::Error| DockyardError::CommandSpawn {
        command: rendered.clone(),
        source,
    };

    let mut child = command.spawn().map_err(spawn_error)?;
    if let Some(input) = stdin
        && let Some(mut pipe) = child.stdin.take()
    {
        pipe.write_all(input.as_bytes()).map_err(spawn_error)?;
    }
    let output = child.wait_with_output().map_err(spawn_error)?;

    check_output(&rendered, &output)
}

fn check_output(rendered: &str, output: &Output) -> Result<()> {
    let stdout = String::from_utf8_lossy(&output.stdout);
    for line in stdout.lines().filter(|line| !line.trim().is_empty()) {
        debug!("  | {line}");
    }

    if output.status.success() {
        return Ok(());
    }

    Err(DockyardError::CommandFailed {
        command: rendered.to_string(),
        status: output.status.to_string(),
        stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
    })
}
