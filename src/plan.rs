//! Deciding which images need a rebuild.

use std::fmt;
use std::time::{Duration, SystemTime};

use tracing::{info, warn};

use crate::discovery::{BuildUnit, Discovery, RejectedUnit};
use crate::error::Result;
use crate::fingerprint::fingerprint_file;
use crate::store::{BuildRecord, StateStore};
use crate::timestamp::{age_since, format_age, is_stale};

/// Why a unit is, or is not, scheduled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// No record exists yet
    FirstBuild,
    /// The Dockerfile fingerprint differs from the recorded one
    ContentChanged,
    /// Unchanged, but last pushed longer ago than the rebuild interval
    Stale {
        /// Time since the last push
        age: Duration,
    },
    /// Unchanged and recent enough
    UpToDate {
        /// Time since the last push
        age: Duration,
    },
}

impl Decision {
    /// Applies the rebuild rules to one unit.
    pub fn decide(
        fingerprint: &str,
        record: Option<&BuildRecord>,
        interval_secs: u64,
        now: SystemTime,
    ) -> Self {
        let Some(record) = record else {
            return Decision::FirstBuild;
        };
        if record.fingerprint != fingerprint {
            return Decision::ContentChanged;
        }
        let age = age_since(record.last_update_nanos, now);
        if is_stale(age, interval_secs) {
            Decision::Stale { age }
        } else {
            Decision::UpToDate { age }
        }
    }

    pub fn needs_build(&self) -> bool {
        !matches!(self, Decision::UpToDate { .. })
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Decision::FirstBuild => f.write_str("no previous state, first build"),
            Decision::ContentChanged => f.write_str("Dockerfile changed, rebuild"),
            Decision::Stale { age } => write!(
                f,
                "Dockerfile unchanged but last built {} ago, past the rebuild interval",
                format_age(*age)
            ),
            Decision::UpToDate { age } => write!(
                f,
                "Dockerfile unchanged and built {} ago, skip",
                format_age(*age)
            ),
        }
    }
}

/// A discovered unit together with everything the planner learned about it.
#[derive(Debug, Clone)]
pub struct BuildPlanEntry {
    /// The unit on disk
    pub unit: BuildUnit,
    /// Fingerprint of its current Dockerfile
    pub fingerprint: String,
    /// Record fetched from the state store, if any
    pub record: Option<BuildRecord>,
    /// Outcome of the rebuild rules
    pub decision: Decision,
}

impl BuildPlanEntry {
    pub fn identifier(&self) -> String {
        self.unit.identifier()
    }

    pub fn needs_build(&self) -> bool {
        self.decision.needs_build()
    }
}

/// Every scanned unit in discovery order, scheduled or not.
#[derive(Debug, Clone, Default)]
pub struct BuildPlan {
    entries: Vec<BuildPlanEntry>,
    rejected: Vec<RejectedUnit>,
}

impl BuildPlan {
    /// All entries, including those that are up to date
    pub fn entries(&self) -> &[BuildPlanEntry] {
        &self.entries
    }

    /// Tag directories left out because their names are invalid
    pub fn rejected(&self) -> &[RejectedUnit] {
        &self.rejected
    }

    /// Entries that need a build, in discovery order
    pub fn pending(&self) -> impl Iterator<Item = &BuildPlanEntry> {
        self.entries.iter().filter(|entry| entry.needs_build())
    }

    /// Consumes the plan, keeping only entries that need a build
    pub fn into_pending(self) -> Vec<BuildPlanEntry> {
        self.entries
            .into_iter()
            .filter(BuildPlanEntry::needs_build)
            .collect()
    }

    /// Logs which images will be built.
    pub fn log_summary(&self) {
        info!("--- build plan summary ---");
        let pending: Vec<_> = self.pending().collect();
        if pending.is_empty() {
            info!("we got NO image to build");
        } else {
            info!("we got these images to build");
            for entry in pending {
                info!("  {}", entry.identifier());
            }
        }
        if !self.rejected.is_empty() {
            warn!("these directories were skipped");
            for rejected in &self.rejected {
                warn!("  {}: {}", rejected.tag_dir.display(), rejected.reason);
            }
        }
    }
}

/// Fingerprints each discovered unit and compares it with its stored record.
///
/// Rejected directories are carried into the plan for reporting. This pass
/// only reads from the store.
///
/// # Errors
///
/// Returns an error if a Dockerfile cannot be read or the store fails. A
/// missing record is not an error.
pub fn plan_builds(
    discovery: Discovery,
    store: &dyn StateStore,
    interval_secs: u64,
    now: SystemTime,
) -> Result<BuildPlan> {
    info!("Scan code repo to schedule docker build ...");
    let Discovery { units, rejected } = discovery;
    let mut entries = Vec::with_capacity(units.len());

    for unit in units {
        let identifier = unit.identifier();
        info!("  Detected '{identifier}' image");

        let fingerprint = fingerprint_file(&unit.dockerfile)?;
        let record = store.get(&identifier)?;
        let decision = Decision::decide(&fingerprint, record.as_ref(), interval_secs, now);
        info!("    {decision}");

        entries.push(BuildPlanEntry {
            unit,
            fingerprint,
            record,
            decision,
        });
    }

    let plan = BuildPlan { entries, rejected };
    plan.log_summary();
    Ok(plan)
}
