//! # dockyard CLI
//!
//! ## Commands
//!
//! - **plan**: Print which images need a rebuild and why
//! - **build**: Build and smoke-test scheduled images without pushing
//! - **run**: Plan, build, test and push (the CI entry point)
//! - **show**: Print stored build records
//!
//! ## Quick Start
//!
//! ```bash
//! # Locally: see what would be rebuilt, then try the builds
//! dockyard plan
//! dockyard build
//!
//! # In CI (CIRCLECI, AWS_DEFAULT_REGION and DOCKER_HUB_PASS set)
//! dockyard run
//! ```
//!
//! ## Environment Variables
//!
//! - `DOCKYARD_ROOT`: Project root (default: .)
//! - `DOCKYARD_STATE_PATH`: Custom state table location
//! - `DOCKYARD_ENGINE`: Container CLI (default: docker)
//! - `DOCKYARD_VERBOSE`, `DOCKYARD_QUIET`, `DOCKYARD_LOG_FORMAT`: Log output
//! - `RUST_LOG`: Overrides the log filter entirely

use std::io::IsTerminal;

use dockyard::cli::Cli;
use dockyard::logging::{self, LoggingConfig};

fn main() -> miette::Result<()> {
    miette::set_panic_hook();

    if std::io::stderr().is_terminal() {
        miette::set_hook(Box::new(|_| {
            Box::new(
                miette::GraphicalReportHandler::new()
                    .with_theme(miette::GraphicalTheme::unicode_nocolor())
                    .with_context_lines(3),
            )
        }))?;
    } else {
        // CI logs: no box drawing
        miette::set_hook(Box::new(|_| {
            Box::new(
                miette::GraphicalReportHandler::new()
                    .with_theme(miette::GraphicalTheme::none())
                    .with_context_lines(0),
            )
        }))?;
    }

    let cli = Cli::parse_args();
    let opts = cli.global_opts();
    logging::init(&LoggingConfig::from_flags(
        opts.verbose(),
        opts.quiet(),
        opts.log_format(),
    ));

    dockyard::commands::execute(&cli).map_err(Into::into)
}
