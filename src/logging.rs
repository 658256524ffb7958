//! Tracing subscriber setup.
//!
//! All output goes to stderr so `plan` and `show` can print to stdout
//! cleanly. `RUST_LOG` overrides the level picked from `-v`/`-q`.

use std::sync::Once;

use clap::ValueEnum;
use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

static INIT: Once = Once::new();

/// Output format for log events.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    /// Human readable lines
    #[default]
    Text,
    /// One JSON object per event
    Json,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingConfig {
    pub level: Level,
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            format: LogFormat::Text,
        }
    }
}

impl LoggingConfig {
    /// Derives the level from the CLI flags. Quiet wins over verbose.
    pub fn from_flags(verbose: u8, quiet: bool, format: LogFormat) -> Self {
        Self {
            level: level_for(verbose, quiet),
            format,
        }
    }
}

/// Maps `-v` occurrences and `-q` to a level.
pub fn level_for(verbose: u8, quiet: bool) -> Level {
    if quiet {
        return Level::ERROR;
    }
    match verbose {
        0 => Level::INFO,
        1 => Level::DEBUG,
        _ => Level::TRACE,
    }
}

/// Installs the global subscriber. Later calls are ignored.
pub fn init(config: &LoggingConfig) {
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(config.level.as_str().to_lowercase()));

        let registry = tracing_subscriber::registry().with(filter);
        // try_init: a test harness may already own the global default
        let _ = match config.format {
            LogFormat::Text => registry
                .with(
                    fmt::layer()
                        .with_writer(std::io::stderr)
                        .with_target(false),
                )
                .try_init(),
            LogFormat::Json => registry
                .with(fmt::layer().json().with_writer(std::io::stderr))
                .try_init(),
        };
    });
}
