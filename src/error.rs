//! Error types for dockyard.
//!
//! This module defines all error types used throughout dockyard, using
//! a combination of `thiserror` for ergonomic error definitions and `miette`
//! for rich diagnostic output.
//!
//! # Error Handling Strategy
//!
//! - All errors derive from [`DockyardError`]
//! - Per-unit failures (build, smoke test, push) are caught by the pipeline
//!   and push phases and only logged; everything else propagates to `main`
//! - Errors are automatically converted to `miette::Result` for CLI output
//!
//! # Example
//!
//! ```no_run
//! use std::path::Path;
//!
//! use dockyard::error::{DockyardError, Result};
//!
//! fn check_repos(path: &Path) -> Result<()> {
//!     if !path.is_dir() {
//!         return Err(DockyardError::ConfigError {
//!             message: format!("'{}' is not a directory", path.display()),
//!         });
//!     }
//!     Ok(())
//! }
//! ```

use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

/// Error types that can occur in dockyard operations
#[derive(Error, Debug, Diagnostic)]
pub enum DockyardError {
    /// File system I/O error.
    ///
    /// Common causes: permission denied, file not found, or memory mapping
    /// failures. Used for config files, Dockerfiles and the state file.
    #[error("I/O error accessing '{path}'")]
    #[diagnostic(code(dockyard::io_error))]
    IoError {
        /// The path that caused the I/O error
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// A JSON settings or secrets file could not be parsed after comments
    /// were stripped.
    #[error("Failed to parse '{path}'")]
    #[diagnostic(
        code(dockyard::config::parse_error),
        help("Only whole-line or trailing '#' and '//' comments are allowed in JSON files.")
    )]
    ConfigParse {
        /// The file that failed to parse
        path: PathBuf,
        /// The underlying JSON error
        #[source]
        source: serde_json::Error,
    },

    /// Invalid or inconsistent configuration.
    #[error("Configuration error: {message}")]
    #[diagnostic(
        code(dockyard::config::error),
        help("Check the settings file and command line options.")
    )]
    ConfigError {
        /// Description of the configuration error
        message: String,
    },

    /// A variable required in the CI runtime is not set.
    #[error("Environment variable '{name}' is required when running under CI")]
    #[diagnostic(
        code(dockyard::config::missing_env),
        help("Export the variable in the CI project settings.")
    )]
    MissingEnv {
        /// Name of the missing variable
        name: &'static str,
    },

    /// Failed to serialize the state table to rkyv format.
    #[error("Failed to serialize build state")]
    #[diagnostic(code(dockyard::store::serialization_error))]
    SerializationError(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// The state file exists but cannot be decoded.
    ///
    /// Records are never dropped silently since losing them would force a
    /// rebuild and re-push of every image.
    #[error("Failed to deserialize build state from '{path}'")]
    #[diagnostic(
        code(dockyard::store::deserialization_error),
        help("The state file may be corrupted. Move it aside to rebuild every image.")
    )]
    DeserializationError {
        /// The state file
        path: PathBuf,
        /// The underlying deserialization error
        #[source]
        source: rkyv::rancor::BoxedError,
    },

    /// The state file was written by a newer dockyard.
    #[error("State file version {found} is newer than supported version {supported}")]
    #[diagnostic(code(dockyard::store::version), help("Please update dockyard."))]
    StoreVersion {
        /// Version recorded in the file
        found: u32,
        /// Highest version this build understands
        supported: u32,
    },

    /// Walking the repository tree failed.
    #[error("Failed to scan '{path}'")]
    #[diagnostic(code(dockyard::scan::error))]
    ScanError {
        /// Root of the scan
        path: PathBuf,
        /// The underlying walkdir error
        #[source]
        source: walkdir::Error,
    },

    /// Git lookup of the current branch failed.
    #[error("Failed to determine the current git branch")]
    #[diagnostic(
        code(dockyard::git::branch),
        help("Set CIRCLE_BRANCH or run from a checked-out branch.")
    )]
    GitError(#[from] git2::Error),

    /// An external command could not be started.
    #[error("Failed to run '{command}'")]
    #[diagnostic(
        code(dockyard::engine::spawn),
        help("Ensure the container engine and shell are installed and on PATH.")
    )]
    CommandSpawn {
        /// The command line that was attempted
        command: String,
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// An external command exited unsuccessfully.
    #[error("'{command}' exited with {status}: {stderr}")]
    #[diagnostic(code(dockyard::engine::failed))]
    CommandFailed {
        /// The command line that failed
        command: String,
        /// Exit status description
        status: String,
        /// Captured standard error, trimmed
        stderr: String,
    },

    /// The configured registry kind has no identifier scheme.
    #[error("Registry service '{kind}' is not supported")]
    #[diagnostic(
        code(dockyard::registry::unsupported),
        help("Set REGISTRY_SERVICE to \"dockerhub\".")
    )]
    UnsupportedRegistry {
        /// The configured registry kind
        kind: String,
    },

    /// A repo or tag name is not a valid image reference component.
    #[error("Invalid {component} name '{name}' in '{path}'")]
    #[diagnostic(
        code(dockyard::scan::invalid_reference),
        help(
            "Repository names use lowercase letters, digits and single '.', '_' or '-' \
             separators; tags use letters, digits, '_', '.' and '-' (max 128 characters)."
        )
    )]
    InvalidReference {
        /// Either "repo" or "tag"
        component: &'static str,
        /// The rejected name
        name: String,
        /// Directory the name was read for
        path: PathBuf,
    },

    /// Path cannot be represented as UTF-8.
    #[error("Invalid UTF-8 in path: {0}")]
    #[diagnostic(code(dockyard::path::invalid_utf8))]
    InvalidUtf8Path(
        /// The path containing invalid UTF-8
        PathBuf,
    ),

    /// Attempted to fingerprint a non-regular file.
    #[error("Invalid file type for '{path}': {message}")]
    #[diagnostic(
        code(dockyard::file::invalid_type),
        help("Dockerfiles must be regular files, not symlinks or directories.")
    )]
    InvalidFileType {
        /// The offending path
        path: PathBuf,
        /// Description of the file type issue
        message: String,
    },
}

/// Type alias for Results in this crate
pub type Result<T> = std::result::Result<T, DockyardError>;
