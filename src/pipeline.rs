//! Sequential build and smoke-test of planned images.

use std::fmt;

use tracing::{info, warn};

use crate::engine::ContainerEngine;
use crate::plan::BuildPlanEntry;

/// Pipeline step at which a unit failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Build,
    SmokeTest,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Build => f.write_str("build"),
            Stage::SmokeTest => f.write_str("smoke test"),
        }
    }
}

/// A planned unit that did not make it through the pipeline.
#[derive(Debug, Clone)]
pub struct FailedUnit {
    pub entry: BuildPlanEntry,
    pub stage: Stage,
    pub reason: String,
}

/// Partition of the planned units after build and test.
#[derive(Debug, Clone, Default)]
pub struct PipelineResult {
    /// Built and tested, in plan order
    pub succeeded: Vec<BuildPlanEntry>,
    /// Failed at build or test, in plan order
    pub failed: Vec<FailedUnit>,
}

impl PipelineResult {
    /// Logs which images succeeded and which failed.
    pub fn log_summary(&self) {
        info!("--- docker build summary ---");
        info!("following image succeed:");
        for entry in &self.succeeded {
            info!("  {}", entry.identifier());
        }
        info!("following image failed:");
        for failed in &self.failed {
            info!("  {} ({} failed)", failed.entry.identifier(), failed.stage);
        }
    }
}

/// Builds and smoke-tests each entry in order.
///
/// A failed build skips the smoke test. Failures are recorded and the next
/// entry proceeds; nothing is retried. A unit without a smoke-test script
/// passes the test step.
pub fn build_and_test(
    entries: Vec<BuildPlanEntry>,
    engine: &mut dyn ContainerEngine,
) -> PipelineResult {
    let mut result = PipelineResult::default();

    for entry in entries {
        let unit = &entry.unit;
        let identifier = unit.identifier();

        if let Err(err) = engine.build(&identifier, &unit.tag_dir) {
            warn!("  Build failed! {identifier}: {err}");
            result.failed.push(FailedUnit {
                reason: err.to_string(),
                stage: Stage::Build,
                entry,
            });
            continue;
        }
        info!("  Build success! {identifier}");

        if !unit.smoke_test.is_file() {
            info!("  No smoke test for {identifier}, skipping test step");
            result.succeeded.push(entry);
            continue;
        }

        if let Err(err) = engine.smoke_test(&unit.smoke_test, &unit.tag_dir) {
            warn!("  Test failed! {identifier}: {err}");
            result.failed.push(FailedUnit {
                reason: err.to_string(),
                stage: Stage::SmokeTest,
                entry,
            });
            continue;
        }
        info!("  Test passed! {identifier}");
        result.succeeded.push(entry);
    }

    result.log_summary();
    result
}

#[cfg(test)]
mod tests;
