//! # dockyard
//!
//! A CI orchestrator for a tree of container images. It rebuilds an image
//! only when its Dockerfile changed in a meaningful way or when the last
//! published build is older than a configured interval, smoke-tests what it
//! built, and publishes the survivors from the release branch.
//!
//! ## Overview
//!
//! Images live under a repos directory as `<repo>/<tag>/Dockerfile`. A run
//! goes through three phases:
//!
//! 1. **Plan**: every Dockerfile is fingerprinted (BLAKE3 over the text with
//!    comments and blank lines removed) and compared against the last pushed
//!    record in the state table.
//! 2. **Build**: scheduled images are built and their optional
//!    `smoke-test.sh` is run. A failure only affects its own image.
//! 3. **Push**: under CI on the release branch, tested images are tagged,
//!    pushed and recorded. Nothing else ever writes to the state table.
//!
//! ## Architecture
//!
//! - [`cli`]: Command-line interface definitions using clap
//! - [`commands`]: Subcommand dispatch and the phase driver
//! - [`config`]: Settings file, secrets and the resolved run context
//! - [`engine`]: The container CLI abstraction
//! - [`store`]: Build records and their on-disk table
//! - [`plan`], [`pipeline`], [`push`]: The three phases
//! - [`error`]: Error types with thiserror + miette
//!
//! ## Library Usage
//!
//! ```no_run
//! use dockyard::cli::{Cli, Commands};
//! use dockyard::commands;
//!
//! let cli = Cli::builder()
//!     .root("ci")
//!     .verbose(1)
//!     .command(Commands::Plan)
//!     .build()?;
//!
//! commands::execute(&cli)?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod cli;
pub mod commands;
pub mod config;
pub mod discovery;
pub mod engine;
pub mod error;
pub mod fingerprint;
pub mod logging;
pub mod pipeline;
pub mod plan;
pub mod push;
pub mod store;

// Internal modules
mod jsonc;
mod timestamp;

#[cfg(test)]
mod testutil;
