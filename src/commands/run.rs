//! Plan, build and push phases driven as one run.

use std::fmt;
use std::io::Write;
use std::path::Path;
use std::time::SystemTime;

use tracing::info;

use crate::commands::write_error;
use crate::config::RunContext;
use crate::discovery::discover_units;
use crate::engine::ContainerEngine;
use crate::error::{DockyardError, Result};
use crate::pipeline::{PipelineResult, build_and_test};
use crate::plan::{BuildPlan, plan_builds};
use crate::push::{PushReport, push_all};
use crate::store::StateStore;

/// How far a run goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Scan and decide only
    Plan,
    /// Plan, then build and smoke-test
    Build,
    /// Plan, build, smoke-test and push
    Full,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Plan => f.write_str("plan"),
            Phase::Build => f.write_str("build"),
            Phase::Full => f.write_str("run"),
        }
    }
}

/// What each phase produced. Later phases are `None` when the run stopped
/// before them.
#[derive(Debug)]
pub struct RunOutcome {
    pub plan: BuildPlan,
    pub pipeline: Option<PipelineResult>,
    pub push: Option<PushReport>,
}

pub struct Run<'a> {
    pub(crate) context: &'a RunContext,
    pub(crate) repos_dir: &'a Path,
    pub(crate) engine: &'a mut dyn ContainerEngine,
    pub(crate) store: &'a mut dyn StateStore,
    pub(crate) phase: Phase,
    pub(crate) now: Option<SystemTime>,
}

pub struct RunBuilder<'a> {
    context: Option<&'a RunContext>,
    repos_dir: Option<&'a Path>,
    engine: Option<&'a mut dyn ContainerEngine>,
    store: Option<&'a mut dyn StateStore>,
    phase: Phase,
    now: Option<SystemTime>,
}

impl Default for RunBuilder<'_> {
    fn default() -> Self {
        Self {
            context: None,
            repos_dir: None,
            engine: None,
            store: None,
            phase: Phase::Full,
            now: None,
        }
    }
}

impl<'a> Run<'a> {
    pub fn builder() -> RunBuilder<'a> {
        RunBuilder::new()
    }

    /// Runs the phases up to and including `phase`.
    ///
    /// Unit failures during build, test or push are reported in the outcome;
    /// only run-level failures (scan, store, registry login) are errors.
    pub fn execute(self) -> Result<RunOutcome> {
        let Run {
            context,
            repos_dir,
            engine,
            store,
            phase,
            now,
        } = self;
        let clock = || now.unwrap_or_else(SystemTime::now);
        let settings = context.settings();

        info!(
            runtime = %context.runtime(),
            region = context.region().unwrap_or("-"),
            profile = context.profile().unwrap_or("-"),
            branch = context.branch(),
            "Starting {phase} ..."
        );

        let discovery = discover_units(repos_dir)?;
        let plan = plan_builds(discovery, &*store, settings.image_rebuild_interval, clock())?;
        if phase == Phase::Plan {
            return Ok(RunOutcome {
                plan,
                pipeline: None,
                push: None,
            });
        }

        info!("--- docker build ---");
        let pipeline = build_and_test(plan.clone().into_pending(), &mut *engine);
        if phase == Phase::Build {
            return Ok(RunOutcome {
                plan,
                pipeline: Some(pipeline),
                push: None,
            });
        }

        let push = push_all(context, &pipeline.succeeded, engine, store, clock())?;
        Ok(RunOutcome {
            plan,
            pipeline: Some(pipeline),
            push: Some(push),
        })
    }
}

impl<'a> RunBuilder<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn context(mut self, context: &'a RunContext) -> Self {
        self.context = Some(context);
        self
    }

    pub fn repos_dir(mut self, path: &'a Path) -> Self {
        self.repos_dir = Some(path);
        self
    }

    pub fn engine(mut self, engine: &'a mut dyn ContainerEngine) -> Self {
        self.engine = Some(engine);
        self
    }

    pub fn store(mut self, store: &'a mut dyn StateStore) -> Self {
        self.store = Some(store);
        self
    }

    pub fn phase(mut self, phase: Phase) -> Self {
        self.phase = phase;
        self
    }

    /// Pins the clock used for staleness checks and push records.
    pub fn now(mut self, now: SystemTime) -> Self {
        self.now = Some(now);
        self
    }

    pub fn build(self) -> Result<Run<'a>> {
        let missing = |field: &str| DockyardError::ConfigError {
            message: format!("{field} is required to start a run"),
        };

        Ok(Run {
            context: self.context.ok_or_else(|| missing("context"))?,
            repos_dir: self.repos_dir.ok_or_else(|| missing("repos_dir"))?,
            engine: self.engine.ok_or_else(|| missing("engine"))?,
            store: self.store.ok_or_else(|| missing("store"))?,
            phase: self.phase,
            now: self.now,
        })
    }
}

/// Prints one line per scanned unit: identifier, verdict and reason.
///
/// Rejected directories follow, keyed by their path.
pub fn write_plan(plan: &BuildPlan, out: &mut impl Write) -> Result<()> {
    for entry in plan.entries() {
        let verdict = if entry.needs_build() { "build" } else { "skip" };
        writeln!(out, "{}\t{verdict}\t{}", entry.identifier(), entry.decision)
            .map_err(write_error)?;
    }
    for rejected in plan.rejected() {
        writeln!(out, "{}\treject\t{}", rejected.tag_dir.display(), rejected.reason)
            .map_err(write_error)?;
    }
    Ok(())
}
