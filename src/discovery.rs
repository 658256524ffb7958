use std::path::{Path, PathBuf};

use tracing::warn;
use walkdir::WalkDir;

use crate::error::{DockyardError, Result};

/// Build definition expected in every tag directory.
pub const DOCKERFILE: &str = "Dockerfile";
/// Optional file in a repo directory overriding the repository name.
pub const REPO_NAME_FILE: &str = "repo_name";
/// Optional file in a tag directory overriding the tag name.
pub const TAG_NAME_FILE: &str = "tag_name";
/// Optional smoke test run after a successful build.
pub const SMOKE_TEST_SCRIPT: &str = "smoke-test.sh";

/// One repo/tag combination found on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildUnit {
    /// Image repository name
    pub repo_name: String,
    /// Image tag
    pub tag_name: String,
    /// Tag directory, used as the build context
    pub tag_dir: PathBuf,
    /// Path of the Dockerfile inside the tag directory
    pub dockerfile: PathBuf,
    /// Path of the smoke-test script inside the tag directory
    pub smoke_test: PathBuf,
    /// Whether the Dockerfile exists
    pub has_dockerfile: bool,
}

impl BuildUnit {
    /// Reads names and paths for the tag directory `tag_dir` of `repo_dir`.
    ///
    /// Names fall back to the directory names when the name files are absent
    /// or blank.
    pub fn load(repo_dir: &Path, tag_dir: &Path) -> Result<Self> {
        let repo_name = read_name(repo_dir, REPO_NAME_FILE)?;
        let tag_name = read_name(tag_dir, TAG_NAME_FILE)?;

        if !is_valid_repo_name(&repo_name) {
            return Err(DockyardError::InvalidReference {
                component: "repo",
                name: repo_name,
                path: repo_dir.to_path_buf(),
            });
        }
        if !is_valid_tag_name(&tag_name) {
            return Err(DockyardError::InvalidReference {
                component: "tag",
                name: tag_name,
                path: tag_dir.to_path_buf(),
            });
        }

        let dockerfile = tag_dir.join(DOCKERFILE);
        Ok(Self {
            repo_name,
            tag_name,
            has_dockerfile: dockerfile.is_file(),
            dockerfile,
            smoke_test: tag_dir.join(SMOKE_TEST_SCRIPT),
            tag_dir: tag_dir.to_path_buf(),
        })
    }

    /// `<repo>:<tag>`, the key of the unit's build record and its local image
    /// reference.
    pub fn identifier(&self) -> String {
        format!("{}:{}", self.repo_name, self.tag_name)
    }
}

/// A tag directory that has a Dockerfile but could not become a unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RejectedUnit {
    /// The offending tag directory
    pub tag_dir: PathBuf,
    /// Why it was left out
    pub reason: String,
}

/// Result of scanning the repos directory.
#[derive(Debug, Clone, Default)]
pub struct Discovery {
    /// Buildable units, sorted by directory name
    pub units: Vec<BuildUnit>,
    /// Units whose names are not valid image references
    pub rejected: Vec<RejectedUnit>,
}

/// Discovers every buildable unit below `repos_dir`.
///
/// The layout is `repos_dir/<repo>/<tag>/Dockerfile`. Symlinked directories
/// and Dockerfiles are followed. Tag directories without a Dockerfile are
/// skipped, as are plain files at either level. Units are returned sorted
/// by directory name so plans are reproducible.
///
/// A unit whose repo or tag name is not a valid image reference is logged
/// and listed in [`Discovery::rejected`]; its siblings are unaffected.
///
/// # Errors
///
/// Returns an error if:
/// - `repos_dir` does not exist or cannot be read
/// - A name file cannot be read
pub fn discover_units(repos_dir: &Path) -> Result<Discovery> {
    let mut discovery = Discovery::default();

    let walker = WalkDir::new(repos_dir)
        .min_depth(2)
        .max_depth(2)
        .follow_links(true)
        .sort_by_file_name();

    for entry in walker {
        let entry = entry.map_err(|source| DockyardError::ScanError {
            path: repos_dir.to_path_buf(),
            source,
        })?;

        if !entry.file_type().is_dir() {
            continue;
        }

        let tag_dir = entry.path();
        if !tag_dir.join(DOCKERFILE).is_file() {
            continue;
        }

        let Some(repo_dir) = tag_dir.parent() else {
            continue;
        };

        match BuildUnit::load(repo_dir, tag_dir) {
            Ok(unit) => discovery.units.push(unit),
            Err(
                err @ (DockyardError::InvalidReference { .. }
                | DockyardError::InvalidUtf8Path(_)),
            ) => {
                warn!("  Skipping {}: {err}", tag_dir.display());
                discovery.rejected.push(RejectedUnit {
                    tag_dir: tag_dir.to_path_buf(),
                    reason: err.to_string(),
                });
            }
            Err(err) => return Err(err),
        }
    }

    Ok(discovery)
}

fn read_name(dir: &Path, file_name: &str) -> Result<String> {
    let path = dir.join(file_name);
    if path.is_file() {
        let content = std::fs::read_to_string(&path).map_err(|source| DockyardError::IoError {
            path: path.clone(),
            source,
        })?;
        let name = content.trim();
        if !name.is_empty() {
            return Ok(name.to_string());
        }
    }

    dir.file_name()
        .and_then(|name| name.to_str())
        .map(str::to_string)
        .ok_or_else(|| DockyardError::InvalidUtf8Path(dir.to_path_buf()))
}

/// Repository path component: lowercase alphanumerics separated by single
/// `.`, `_`, `__` or `-` runs.
fn is_valid_repo_name(name: &str) -> bool {
    static RE: std::sync::OnceLock<regex::Regex> = std::sync::OnceLock::new();
    let re = RE.get_or_init(|| {
        regex::Regex::new(r"^[a-z0-9]+(?:(?:[._]|__|-+)[a-z0-9]+)*$")
            .expect("repo name regex should compile")
    });
    re.is_match(name)
}

fn is_valid_tag_name(name: &str) -> bool {
    static RE: std::sync::OnceLock<regex::Regex> = std::sync::OnceLock::new();
    let re = RE.get_or_init(|| {
        regex::Regex::new(r"^[A-Za-z0-9_][A-Za-z0-9_.-]{0,127}$")
            .expect("tag name regex should compile")
    });
    re.is_match(name)
}
