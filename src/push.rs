//! Publishing tested images and recording what was pushed.

use std::time::SystemTime;

use tracing::{info, warn};

use crate::config::{RunContext, Runtime};
use crate::engine::ContainerEngine;
use crate::error::Result;
use crate::plan::BuildPlanEntry;
use crate::store::{BuildRecord, StateStore};
use crate::timestamp::system_time_to_nanos;

/// Whether the push phase runs, and if not, why.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PushGate {
    /// Release build with images to push
    Open,
    /// Not running under CI
    LocalRuntime,
    /// Nothing survived build and test
    NothingToPush,
    /// CI build of a branch other than the release branch
    NotReleaseBranch {
        branch: String,
        release: String,
    },
}

impl PushGate {
    /// Checks the gates in order: runtime, pending images, branch.
    pub fn evaluate(context: &RunContext, succeeded: &[BuildPlanEntry]) -> Self {
        if context.runtime() == Runtime::Local {
            return PushGate::LocalRuntime;
        }
        if succeeded.is_empty() {
            return PushGate::NothingToPush;
        }
        if !context.is_release_build() {
            return PushGate::NotReleaseBranch {
                branch: context.branch().to_string(),
                release: context.settings().release_branch.clone(),
            };
        }
        PushGate::Open
    }
}

/// Outcome of the push phase.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PushReport {
    /// Identifiers pushed and recorded
    pub pushed: Vec<String>,
    /// Identifiers whose tag, push or record update failed
    pub failed: Vec<String>,
    /// Set when the phase did not run
    pub stopped: Option<String>,
}

/// Pushes every successfully built image and records it in `store`.
///
/// Does nothing unless [`PushGate::evaluate`] opens. The registry kind is
/// checked before logging in, so an unsupported registry fails the run
/// without touching any image. Per-image failures are logged and the
/// remaining images still go out.
///
/// # Errors
///
/// Returns an error if the registry kind is unsupported or login fails.
pub fn push_all(
    context: &RunContext,
    succeeded: &[BuildPlanEntry],
    engine: &mut dyn ContainerEngine,
    store: &mut dyn StateStore,
    now: SystemTime,
) -> Result<PushReport> {
    info!("--- push image to registry ---");

    let stop = |message: String| -> Result<PushReport> {
        info!("{message}");
        Ok(PushReport {
            stopped: Some(message),
            ..PushReport::default()
        })
    };

    match PushGate::evaluate(context, succeeded) {
        PushGate::Open => {}
        PushGate::LocalRuntime => return stop("Detected local runtime, stop here.".to_string()),
        PushGate::NothingToPush => return stop("No success image to push, stop here.".to_string()),
        PushGate::NotReleaseBranch { branch, release } => {
            return stop(format!("Not {release} branch ({branch}), stop here."));
        }
    }

    let settings = context.settings();
    settings.registry_service.ensure_supported()?;
    engine.login(&settings.docker_hub_username, context.registry_password())?;

    let mut report = PushReport::default();
    for entry in succeeded {
        let identifier = entry.identifier();
        match push_one(context, entry, engine, store, now) {
            Ok(()) => {
                info!("  Success! {identifier}");
                report.pushed.push(identifier);
            }
            Err(err) => {
                warn!("  Push failed! {identifier}: {err}");
                report.failed.push(identifier);
            }
        }
    }

    Ok(report)
}

fn push_one(
    context: &RunContext,
    entry: &BuildPlanEntry,
    engine: &mut dyn ContainerEngine,
    store: &mut dyn StateStore,
    now: SystemTime,
) -> Result<()> {
    let settings = context.settings();
    let unit = &entry.unit;
    let local = unit.identifier();
    let remote = settings.registry_service.remote_identifier(
        &settings.docker_hub_username,
        &unit.repo_name,
        &unit.tag_name,
    )?;

    engine.tag(&local, &remote)?;
    engine.push(&remote)?;
    store.put(BuildRecord {
        identifier: local,
        fingerprint: entry.fingerprint.clone(),
        last_update_nanos: system_time_to_nanos(now),
    })
}

#[cfg(test)]
mod tests;
