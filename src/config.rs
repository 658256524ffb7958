//! Settings, secrets and runtime resolution.
//!
//! Everything dockyard needs from files and the environment is resolved once
//! into a [`RunContext`] at start-up and passed by reference to each phase.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::{debug, warn};

use crate::error::{DockyardError, Result};
use crate::jsonc::read_json;


/// Environment variable whose presence marks a CircleCI job.
pub const ENV_CI_FLAG: &str = "CIRCLECI";
/// Region of the state table in CI.
pub const ENV_REGION: &str = "AWS_DEFAULT_REGION";
/// Registry password in CI.
pub const ENV_REGISTRY_PASSWORD: &str = "DOCKER_HUB_PASS";
/// Branch being built in CI.
pub const ENV_BRANCH: &str = "CIRCLE_BRANCH";

fn default_release_branch() -> String {
    "master".to_string()
}

/// Registry that built images are pushed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RegistryKind {
    /// Docker Hub, images addressed as `<username>/<repo>:<tag>`
    DockerHub,
    /// AWS Elastic Container Registry, not supported
    AwsEcr,
}

impl RegistryKind {
    /// Fails unless images can actually be addressed in this registry.
    pub fn ensure_supported(self) -> Result<()> {
        match self {
            RegistryKind::DockerHub => Ok(()),
            RegistryKind::AwsEcr => Err(DockyardError::UnsupportedRegistry {
                kind: self.to_string(),
            }),
        }
    }

    /// Remote reference for a repo/tag pair pushed by `username`.
    pub fn remote_identifier(self, username: &str, repo: &str, tag: &str) -> Result<String> {
        self.ensure_supported()?;
        Ok(format!("{username}/{repo}:{tag}"))
    }
}

impl fmt::Display for RegistryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegistryKind::DockerHub => f.write_str("dockerhub"),
            RegistryKind::AwsEcr => f.write_str("awsecr"),
        }
    }
}

/// Contents of the global settings file.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct Settings {
    /// Registry images are pushed to
    pub registry_service: RegistryKind,
    /// Account that owns the pushed repositories
    pub docker_hub_username: String,
    /// Maximum age in seconds before an unchanged image is rebuilt anyway
    pub image_rebuild_interval: u64,
    /// Region of the state table when running locally
    #[serde(default)]
    pub aws_region: Option<String>,
    /// Credential profile when running locally
    #[serde(default)]
    pub aws_profile: Option<String>,
    /// Only pushes from this branch reach the registry
    #[serde(default = "default_release_branch")]
    pub release_branch: String,
}

impl Settings {
    /// Loads settings from a JSON file that may contain `#` or `//` comments.
    pub fn load(path: &Path) -> Result<Self> {
        read_json(path)
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
struct Secrets {
    #[serde(default)]
    password: String,
}

/// Reads the registry password from the local secrets file.
///
/// A missing or malformed file yields an empty password, which is fine for
/// local runs since they never push.
fn load_local_password(path: &Path) -> String {
    if !path.exists() {
        debug!(path = %path.display(), "no secrets file, using empty registry password");
        return String::new();
    }
    match read_json::<Secrets>(path) {
        Ok(secrets) => secrets.password,
        Err(err) => {
            warn!(path = %path.display(), error = %err, "ignoring unreadable secrets file");
            String::new()
        }
    }
}

/// Where the process is running.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Runtime {
    /// A developer machine
    Local,
    /// A CircleCI job
    CircleCi,
}

impl Runtime {
    /// Detects the runtime from the CI flag variable.
    pub fn detect(env: &dyn Fn(&str) -> Option<String>) -> Self {
        match env(ENV_CI_FLAG) {
            Some(value) if !value.is_empty() => Runtime::CircleCi,
            _ => Runtime::Local,
        }
    }
}

impl fmt::Display for Runtime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Runtime::Local => f.write_str("local"),
            Runtime::CircleCi => f.write_str("circleci"),
        }
    }
}

/// Fully resolved configuration for one run.
#[derive(Clone)]
pub struct RunContext {
    settings: Settings,
    runtime: Runtime,
    region: Option<String>,
    profile: Option<String>,
    registry_password: String,
    branch: String,
}

impl fmt::Debug for RunContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RunContext")
            .field("settings", &self.settings)
            .field("runtime", &self.runtime)
            .field("region", &self.region)
            .field("profile", &self.profile)
            .field("registry_password", &"<redacted>")
            .field("branch", &self.branch)
            .finish()
    }
}

impl RunContext {
    /// Creates a new builder for [`RunContext`]
    pub fn builder(settings: Settings) -> RunContextBuilder {
        RunContextBuilder::new(settings)
    }

    /// Resolves the run configuration from the process environment.
    pub fn from_env(settings: Settings, secrets_path: &Path, git_dir: &Path) -> Result<Self> {
        let env = |name: &str| std::env::var(name).ok();
        Self::resolve(settings, secrets_path, git_dir, &env)
    }

    /// Resolves the run configuration using `env` for variable lookups.
    ///
    /// Locally, region and profile come from the settings file, the password
    /// from the secrets file and the branch is left empty. Under CI, region,
    /// password and branch come from the environment; the branch falls back to
    /// the checked-out branch of the repository containing `git_dir`.
    pub fn resolve(
        settings: Settings,
        secrets_path: &Path,
        git_dir: &Path,
        env: &dyn Fn(&str) -> Option<String>,
    ) -> Result<Self> {
        let runtime = Runtime::detect(env);
        let required = |name: &'static str| {
            env(name)
                .filter(|value| !value.is_empty())
                .ok_or(DockyardError::MissingEnv { name })
        };

        let context = match runtime {
            Runtime::Local => RunContext {
                region: settings.aws_region.clone(),
                profile: settings.aws_profile.clone(),
                registry_password: load_local_password(secrets_path),
                branch: String::new(),
                runtime,
                settings,
            },
            Runtime::CircleCi => {
                let branch = match env(ENV_BRANCH).filter(|value| !value.is_empty()) {
                    Some(branch) => branch,
                    None => current_branch(git_dir)?,
                };
                RunContext {
                    region: Some(required(ENV_REGION)?),
                    profile: None,
                    registry_password: required(ENV_REGISTRY_PASSWORD)?,
                    branch,
                    runtime,
                    settings,
                }
            }
        };
        Ok(context)
    }

    /// Global settings
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Detected runtime
    pub fn runtime(&self) -> Runtime {
        self.runtime
    }

    /// State table region, if any
    pub fn region(&self) -> Option<&str> {
        self.region.as_deref()
    }

    /// Credential profile, if any
    pub fn profile(&self) -> Option<&str> {
        self.profile.as_deref()
    }

    /// Registry password
    pub fn registry_password(&self) -> &str {
        &self.registry_password
    }

    /// Branch being built; empty for local runs
    pub fn branch(&self) -> &str {
        &self.branch
    }

    /// Whether this run is allowed to push to the registry
    pub fn is_release_build(&self) -> bool {
        self.runtime == Runtime::CircleCi && self.branch == self.settings.release_branch
    }
}

/// Builder for constructing a [`RunContext`] without touching files or the
/// environment. Used by tests and library callers.
pub struct RunContextBuilder {
    settings: Settings,
    runtime: Runtime,
    region: Option<String>,
    profile: Option<String>,
    registry_password: String,
    branch: String,
}

impl RunContextBuilder {
    fn new(settings: Settings) -> Self {
        Self {
            region: settings.aws_region.clone(),
            profile: settings.aws_profile.clone(),
            settings,
            runtime: Runtime::Local,
            registry_password: String::new(),
            branch: String::new(),
        }
    }

    /// Set the runtime
    pub fn runtime(mut self, runtime: Runtime) -> Self {
        self.runtime = runtime;
        self
    }

    /// Set the state table region
    pub fn region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }

    /// Set the registry password
    pub fn registry_password(mut self, password: impl Into<String>) -> Self {
        self.registry_password = password.into();
        self
    }

    /// Set the branch being built
    pub fn branch(mut self, branch: impl Into<String>) -> Self {
        self.branch = branch.into();
        self
    }

    /// Build the [`RunContext`]
    pub fn build(self) -> RunContext {
        RunContext {
            settings: self.settings,
            runtime: self.runtime,
            region: self.region,
            profile: self.profile,
            registry_password: self.registry_password,
            branch: self.branch,
        }
    }
}

/// Returns the short name of the branch checked out in the repository that
/// contains `path`.
pub fn current_branch(path: &Path) -> Result<String> {
    let repo = git2::Repository::discover(path)?;
    let head = repo.head()?;
    if !head.is_branch() {
        return Err(DockyardError::ConfigError {
            message: format!(
                "HEAD of '{}' is detached and {ENV_BRANCH} is not set",
                repo.workdir().unwrap_or_else(|| repo.path()).display()
            ),
        });
    }
    head.shorthand()
        .map(str::to_string)
        .ok_or_else(|| DockyardError::InvalidUtf8Path(PathBuf::from(repo.path())))
}
