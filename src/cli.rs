//! Command-line interface definitions for dockyard.
//!
//! Every global option can also be set through a `DOCKYARD_*` environment
//! variable, which is how CI jobs usually configure it.
//!
//! # Example
//!
//! ```no_run
//! use dockyard::cli::{Cli, Commands};
//!
//! let cli = Cli::parse_args();
//! match cli.command() {
//!     Commands::Plan => println!("planning only"),
//!     Commands::Show { identifier } => println!("showing {identifier:?}"),
//!     _ => {}
//! }
//! ```

use std::path::{Component, Path, PathBuf};

use clap::{Parser, Subcommand};

use crate::error::{DockyardError, Result};
use crate::logging::LogFormat;
use crate::store::table_file_name;

/// Directory under the root holding the state table.
pub const STATE_DIR: &str = ".dockyard";

/// Main command-line interface for dockyard.
#[derive(Parser)]
#[command(
    name = "dockyard",
    bin_name = "dockyard",
    author,
    version,
    about = "Rebuild, smoke-test and publish container images when their Dockerfiles change",
    long_about = None,
    propagate_version = true
)]
pub struct Cli {
    #[command(flatten)]
    global_opts: GlobalOpts,

    #[command(subcommand)]
    command: Commands,
}

/// Options shared by every subcommand.
///
/// Paths left unset are derived from `--root`.
#[derive(Parser)]
pub struct GlobalOpts {
    /// Project root holding the settings file and the repos directory
    #[arg(long, global = true, default_value = ".", env = "DOCKYARD_ROOT")]
    root: PathBuf,

    /// Settings file (defaults to `<root>/config.json`)
    #[arg(long, global = true, env = "DOCKYARD_CONFIG")]
    config: Option<PathBuf>,

    /// Local registry credentials (defaults to `<root>/docker-hub-secret.json`)
    #[arg(long, global = true, env = "DOCKYARD_SECRETS")]
    secrets: Option<PathBuf>,

    /// Directory of `<repo>/<tag>/Dockerfile` trees (defaults to `<root>/repos`)
    #[arg(long, global = true, env = "DOCKYARD_REPOS_DIR")]
    repos_dir: Option<PathBuf>,

    /// State table file (defaults to
    /// `<root>/.dockyard/docker-image-state[.<region>].metadata`)
    #[arg(long, global = true, env = "DOCKYARD_STATE_PATH")]
    state_path: Option<PathBuf>,

    /// Docker-compatible CLI used to build, tag and push
    #[arg(long, global = true, default_value = "docker", env = "DOCKYARD_ENGINE")]
    engine: PathBuf,

    /// Interpreter for smoke-test scripts
    #[arg(long, global = true, default_value = "bash", env = "DOCKYARD_SHELL")]
    shell: PathBuf,

    /// Enable verbose output (use multiple times for more verbosity)
    #[arg(short, long, global = true, action = clap::ArgAction::Count, env = "DOCKYARD_VERBOSE")]
    verbose: u8,

    /// Silence all output except for errors
    #[arg(
        short,
        long,
        global = true,
        conflicts_with = "verbose",
        env = "DOCKYARD_QUIET"
    )]
    quiet: bool,

    /// Log output format
    #[arg(
        long,
        global = true,
        value_enum,
        default_value_t = LogFormat::Text,
        env = "DOCKYARD_LOG_FORMAT"
    )]
    log_format: LogFormat,
}

/// Absolute locations of everything a run touches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Paths {
    pub root: PathBuf,
    pub config: PathBuf,
    pub secrets: PathBuf,
    pub repos_dir: PathBuf,
    state_path: Option<PathBuf>,
}

impl Paths {
    /// The state table for `region`, unless one was given explicitly.
    pub fn state_path(&self, region: Option<&str>) -> PathBuf {
        self.state_path.clone().unwrap_or_else(|| {
            self.root
                .join(STATE_DIR)
                .join(table_file_name(region))
        })
    }
}

impl GlobalOpts {
    /// Create a new builder for constructing `GlobalOpts` programmatically.
    pub fn builder() -> GlobalOptsBuilder {
        GlobalOptsBuilder::default()
    }

    /// Resolves every path against `base`.
    pub fn paths(&self, base: &Path) -> Paths {
        let root = normalize_path_from(base, &self.root);
        let under_root = |explicit: &Option<PathBuf>, default: &str| match explicit {
            Some(path) => normalize_path_from(base, path),
            None => root.join(default),
        };

        Paths {
            config: under_root(&self.config, "config.json"),
            secrets: under_root(&self.secrets, "docker-hub-secret.json"),
            repos_dir: under_root(&self.repos_dir, "repos"),
            state_path: self
                .state_path
                .as_ref()
                .map(|path| normalize_path_from(base, path)),
            root,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn engine(&self) -> &Path {
        &self.engine
    }

    pub fn shell(&self) -> &Path {
        &self.shell
    }

    /// Get the verbose level
    pub fn verbose(&self) -> u8 {
        self.verbose
    }

    /// Check if quiet mode is enabled
    pub fn quiet(&self) -> bool {
        self.quiet
    }

    pub fn log_format(&self) -> LogFormat {
        self.log_format
    }
}

/// Builder for constructing `GlobalOpts` without going through argument
/// parsing.
#[derive(Debug, Default)]
pub struct GlobalOptsBuilder {
    root: Option<PathBuf>,
    config: Option<PathBuf>,
    secrets: Option<PathBuf>,
    repos_dir: Option<PathBuf>,
    state_path: Option<PathBuf>,
    engine: Option<PathBuf>,
    shell: Option<PathBuf>,
    verbose: u8,
    quiet: bool,
    log_format: LogFormat,
}

impl GlobalOptsBuilder {
    pub fn root(mut self, root: impl Into<PathBuf>) -> Self {
        self.root = Some(root.into());
        self
    }

    pub fn config(mut self, path: impl Into<PathBuf>) -> Self {
        self.config = Some(path.into());
        self
    }

    pub fn secrets(mut self, path: impl Into<PathBuf>) -> Self {
        self.secrets = Some(path.into());
        self
    }

    pub fn repos_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.repos_dir = Some(path.into());
        self
    }

    pub fn state_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.state_path = Some(path.into());
        self
    }

    pub fn engine(mut self, program: impl Into<PathBuf>) -> Self {
        self.engine = Some(program.into());
        self
    }

    pub fn shell(mut self, shell: impl Into<PathBuf>) -> Self {
        self.shell = Some(shell.into());
        self
    }

    /// Set the verbosity level (0 = normal, 1+ = verbose).
    pub fn verbose(mut self, level: u8) -> Self {
        self.verbose = level;
        self
    }

    /// Enable or disable quiet mode.
    pub fn quiet(mut self, quiet: bool) -> Self {
        self.quiet = quiet;
        self
    }

    pub fn log_format(mut self, format: LogFormat) -> Self {
        self.log_format = format;
        self
    }

    /// Build the `GlobalOpts` instance with the configured values.
    pub fn build(self) -> GlobalOpts {
        GlobalOpts {
            root: self.root.unwrap_or_else(|| PathBuf::from(".")),
            config: self.config,
            secrets: self.secrets,
            repos_dir: self.repos_dir,
            state_path: self.state_path,
            engine: self.engine.unwrap_or_else(|| PathBuf::from("docker")),
            shell: self.shell.unwrap_or_else(|| PathBuf::from("bash")),
            verbose: self.verbose,
            quiet: self.quiet,
            log_format: self.log_format,
        }
    }
}

impl Cli {
    /// Get the global options
    pub fn global_opts(&self) -> &GlobalOpts {
        &self.global_opts
    }

    /// Get the command
    pub fn command(&self) -> &Commands {
        &self.command
    }

    /// Create a builder for programmatic construction
    pub fn builder() -> CliBuilder {
        CliBuilder::default()
    }

    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

/// Builder for [`Cli`]
#[derive(Debug, Default)]
pub struct CliBuilder {
    global_opts: GlobalOptsBuilder,
    command: Option<Commands>,
}

impl CliBuilder {
    /// Replace the global options wholesale
    pub fn global_opts(mut self, opts: GlobalOptsBuilder) -> Self {
        self.global_opts = opts;
        self
    }

    /// Set the project root
    pub fn root(mut self, root: impl Into<PathBuf>) -> Self {
        self.global_opts = self.global_opts.root(root);
        self
    }

    /// Set the verbose level
    pub fn verbose(mut self, level: u8) -> Self {
        self.global_opts = self.global_opts.verbose(level);
        self
    }

    /// Enable quiet mode
    pub fn quiet(mut self, enabled: bool) -> Self {
        self.global_opts = self.global_opts.quiet(enabled);
        self
    }

    /// Set the command
    pub fn command(mut self, command: Commands) -> Self {
        self.command = Some(command);
        self
    }

    /// Build the Cli instance
    pub fn build(self) -> Result<Cli> {
        let command = self.command.ok_or(DockyardError::ConfigError {
            message: "Command is required".to_string(),
        })?;

        Ok(Cli {
            global_opts: self.global_opts.build(),
            command,
        })
    }
}

/// Normalize a path to be absolute and clean, without requiring it to exist.
///
/// Relative paths are joined onto `base`. `.` components are dropped and
/// `..` pops the previous component where there is one. Symlinks are not
/// resolved.
pub(crate) fn normalize_path_from(base: &Path, path: &Path) -> PathBuf {
    let absolute = if path.is_relative() {
        base.join(path)
    } else {
        path.to_path_buf()
    };

    let mut components = Vec::new();
    for component in absolute.components() {
        match component {
            Component::ParentDir => {
                if let Some(last) = components.last()
                    && !matches!(last, Component::ParentDir | Component::RootDir)
                {
                    components.pop();
                    continue;
                }
                if matches!(components.last(), Some(Component::RootDir)) {
                    continue;
                }
                components.push(component);
            }
            Component::CurDir => continue,
            _ => components.push(component),
        }
    }

    components.into_iter().collect()
}

/// Available dockyard subcommands.
#[derive(Debug, Clone, PartialEq, Eq, Subcommand)]
pub enum Commands {
    /// Scan the repos directory and print which images need a rebuild
    ///
    /// Reads the state table but never builds, pushes or writes anything.
    Plan,

    /// Plan, then build and smoke-test every scheduled image
    ///
    /// Nothing is pushed and the state table is left untouched.
    Build,

    /// Plan, build, smoke-test and push (the CI entry point)
    ///
    /// Images are only pushed from the release branch under CI. Each pushed
    /// image has its fingerprint and push time recorded in the state table.
    Run,

    /// Print stored build records
    Show {
        /// Image identifier (`repo:tag`); all records when omitted
        identifier: Option<String>,
    },
}
