//! Implementation of dockyard subcommands.
//!
//! `mod.rs` is a thin dispatcher: it resolves paths, settings and the run
//! context once, opens the state table, then hands over to [`Run`] or
//! [`show`].
//!
//! # Example
//!
//! ```no_run
//! use dockyard::cli::Cli;
//! use dockyard::commands;
//!
//! let cli = Cli::parse_args();
//! if let Err(e) = commands::execute(&cli) {
//!     eprintln!("Error: {e:?}");
//! }
//! ```

use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use tracing::debug;

use crate::cli::{Cli, Commands};
use crate::config::{RunContext, Settings};
use crate::engine::CliEngine;
use crate::error::{DockyardError, Result};
use crate::store::FileStore;

pub(crate) mod run;
pub(crate) mod show;

pub use run::{Phase, Run, RunBuilder, RunOutcome, write_plan};
pub use show::show;


/// Execute commands based on the parsed CLI arguments.
pub fn execute(cli: &Cli) -> Result<()> {
    execute_with_dir(cli, None)
}

/// Execute commands with an explicit working directory.
///
/// Relative paths in the CLI options are resolved against `working_dir`, or
/// the process working directory when `None`.
pub fn execute_with_dir(cli: &Cli, working_dir: Option<&Path>) -> Result<()> {
    let current_dir = if let Some(dir) = working_dir {
        dir.to_path_buf()
    } else {
        std::env::current_dir().map_err(|source| DockyardError::IoError {
            path: PathBuf::from("."),
            source,
        })?
    };

    let opts = cli.global_opts();
    let paths = opts.paths(&current_dir);
    let settings = Settings::load(&paths.config)?;
    let context = RunContext::from_env(settings, &paths.secrets, &paths.root)?;
    let state_path = paths.state_path(context.region());
    debug!(?context, state = %state_path.display(), "Resolved run context");

    let mut store = FileStore::open(&state_path)?;
    let mut stdout = io::stdout().lock();

    let phase = match cli.command() {
        Commands::Show { identifier } => {
            return show(&store, identifier.as_deref(), SystemTime::now(), &mut stdout);
        }
        Commands::Plan => Phase::Plan,
        Commands::Build => Phase::Build,
        Commands::Run => Phase::Full,
    };

    let mut engine = CliEngine::new(opts.engine(), opts.shell());
    let outcome = Run::builder()
        .context(&context)
        .repos_dir(&paths.repos_dir)
        .engine(&mut engine)
        .store(&mut store)
        .phase(phase)
        .build()?
        .execute()?;

    match phase {
        Phase::Plan => write_plan(&outcome.plan, &mut stdout),
        Phase::Build => Ok(()),
        Phase::Full => writeln!(stdout, "Finished.").map_err(write_error),
    }
}

pub(crate) fn write_error(source: io::Error) -> DockyardError {
    DockyardError::IoError {
        path: PathBuf::from("<stdout>"),
        source,
    }
}
