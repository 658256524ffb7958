use std::time::Duration;

use tempfile::TempDir;

use crate::config::{RegistryKind, RunContext, Runtime};
use crate::error::DockyardError;
use crate::plan::BuildPlanEntry;
use crate::push::{PushGate, push_all};
use crate::store::{MemoryStore, StateStore};
use crate::testutil::{RecordingEngine, add_unit, capture_logs, entry, now, settings};
use crate::timestamp::system_time_to_nanos;

fn ci_context(registry: RegistryKind, branch: &str) -> RunContext {
    RunContext::builder(settings(registry))
        .runtime(Runtime::CircleCi)
        .registry_password("s3cret")
        .branch(branch)
        .build()
}

fn two_entries(root: &std::path::Path) -> Vec<BuildPlanEntry> {
    add_unit(root, "node", "16", true);
    add_unit(root, "python", "3.8", true);
    vec![entry(root, "node", "16"), entry(root, "python", "3.8")]
}

#[test]
fn test_gate_order() {
    let temp_dir = TempDir::new().unwrap();
    let entries = two_entries(temp_dir.path());
    let local = RunContext::builder(settings(RegistryKind::DockerHub)).build();

    assert_eq!(PushGate::evaluate(&local, &entries), PushGate::LocalRuntime);
    assert_eq!(PushGate::evaluate(&local, &[]), PushGate::LocalRuntime);
    assert_eq!(
        PushGate::evaluate(&ci_context(RegistryKind::DockerHub, "master"), &[]),
        PushGate::NothingToPush
    );
    assert_eq!(
        PushGate::evaluate(&ci_context(RegistryKind::DockerHub, "feature"), &entries),
        PushGate::NotReleaseBranch {
            branch: "feature".to_string(),
            release: "master".to_string()
        }
    );
    assert_eq!(
        PushGate::evaluate(&ci_context(RegistryKind::DockerHub, "master"), &entries),
        PushGate::Open
    );
}

#[test]
fn test_local_runtime_never_pushes() {
    let temp_dir = TempDir::new().unwrap();
    let entries = two_entries(temp_dir.path());
    let context = RunContext::builder(settings(RegistryKind::DockerHub)).build();
    let mut engine = RecordingEngine::new();
    let mut store = MemoryStore::new();

    let report = push_all(&context, &entries, &mut engine, &mut store, now()).unwrap();

    assert_eq!(
        report.stopped.as_deref(),
        Some("Detected local runtime, stop here.")
    );
    assert!(report.pushed.is_empty());
    assert!(engine.calls.is_empty());
    assert!(store.is_empty());
}

#[test]
fn test_feature_branch_never_pushes() {
    let temp_dir = TempDir::new().unwrap();
    let entries = two_entries(temp_dir.path());
    let context = ci_context(RegistryKind::DockerHub, "feature/x");
    let mut engine = RecordingEngine::new();
    let mut store = MemoryStore::new();

    let report = push_all(&context, &entries, &mut engine, &mut store, now()).unwrap();

    assert!(report.stopped.unwrap().starts_with("Not master branch"));
    assert!(engine.calls.is_empty());
    assert!(store.is_empty());
}

#[test]
fn test_release_push_records_state() {
    let temp_dir = TempDir::new().unwrap();
    let entries = two_entries(temp_dir.path());
    let context = ci_context(RegistryKind::DockerHub, "master");
    let mut engine = RecordingEngine::new();
    let mut store = MemoryStore::new();
    let pushed_at = now();

    let report = push_all(&context, &entries, &mut engine, &mut store, pushed_at).unwrap();

    assert_eq!(report.pushed, vec!["node:16", "python:3.8"]);
    assert!(report.failed.is_empty());
    assert_eq!(
        engine.calls,
        vec![
            "login shipwright",
            "tag node:16 shipwright/node:16",
            "push shipwright/node:16",
            "tag python:3.8 shipwright/python:3.8",
            "push shipwright/python:3.8",
        ]
    );

    let record = store.get("python:3.8").unwrap().unwrap();
    assert_eq!(record.fingerprint, entries[1].fingerprint);
    assert_eq!(record.last_update_nanos, system_time_to_nanos(pushed_at));
}

#[test]
fn test_push_failure_is_isolated() {
    let temp_dir = TempDir::new().unwrap();
    let entries = two_entries(temp_dir.path());
    let context = ci_context(RegistryKind::DockerHub, "master");
    let mut engine = RecordingEngine::new().failing("push shipwright/node:16");
    let mut store = MemoryStore::new();

    let report = push_all(&context, &entries, &mut engine, &mut store, now()).unwrap();

    assert_eq!(report.failed, vec!["node:16"]);
    assert_eq!(report.pushed, vec!["python:3.8"]);
    assert_eq!(store.get("node:16").unwrap(), None);
    assert!(store.get("python:3.8").unwrap().is_some());
}

#[test]
fn test_existing_record_is_updated() {
    let temp_dir = TempDir::new().unwrap();
    let entries = two_entries(temp_dir.path());
    let context = ci_context(RegistryKind::DockerHub, "master");
    let mut engine = RecordingEngine::new();
    let mut store = MemoryStore::new();
    let earlier = now() - Duration::from_secs(3 * 86_400);
    store
        .put(crate::store::BuildRecord {
            identifier: "node:16".to_string(),
            fingerprint: "stale".to_string(),
            last_update_nanos: system_time_to_nanos(earlier),
        })
        .unwrap();

    push_all(&context, &entries[..1], &mut engine, &mut store, now()).unwrap();

    let record = store.get("node:16").unwrap().unwrap();
    assert_eq!(record.fingerprint, entries[0].fingerprint);
    assert!(record.last_update_nanos > system_time_to_nanos(earlier));
    assert_eq!(store.len(), 1);
}

#[test]
fn test_unsupported_registry_fails_before_login() {
    let temp_dir = TempDir::new().unwrap();
    let entries = two_entries(temp_dir.path());
    let context = ci_context(RegistryKind::AwsEcr, "master");
    let mut engine = RecordingEngine::new();
    let mut store = MemoryStore::new();

    let err = push_all(&context, &entries, &mut engine, &mut store, now()).unwrap_err();

    assert!(matches!(err, DockyardError::UnsupportedRegistry { .. }));
    assert!(engine.calls.is_empty());
    assert!(store.is_empty());
}

#[test]
fn test_login_failure_is_fatal() {
    let temp_dir = TempDir::new().unwrap();
    let entries = two_entries(temp_dir.path());
    let context = ci_context(RegistryKind::DockerHub, "master");
    let mut engine = RecordingEngine::new().failing("login shipwright");
    let mut store = MemoryStore::new();

    let err = push_all(&context, &entries, &mut engine, &mut store, now()).unwrap_err();

    assert!(matches!(err, DockyardError::CommandFailed { .. }));
    assert_eq!(engine.calls, vec!["login shipwright"]);
}

#[test]
fn test_closed_gates_log_why_they_stopped() {
    let temp_dir = TempDir::new().unwrap();
    let entries = two_entries(temp_dir.path());
    let local = RunContext::builder(settings(RegistryKind::DockerHub)).build();
    let feature = ci_context(RegistryKind::DockerHub, "feature/x");
    let master = ci_context(RegistryKind::DockerHub, "master");
    let mut engine = RecordingEngine::new();
    let mut store = MemoryStore::new();

    let (_, logs) = capture_logs(|| {
        push_all(&local, &entries, &mut engine, &mut store, now()).unwrap();
        push_all(&feature, &entries, &mut engine, &mut store, now()).unwrap();
        push_all(&master, &[], &mut engine, &mut store, now()).unwrap();
    });

    assert_eq!(logs.matches("--- push image to registry ---").count(), 3);
    assert!(logs.contains("Detected local runtime, stop here."), "{logs}");
    assert!(logs.contains("Not master branch (feature/x), stop here."), "{logs}");
    assert!(logs.contains("No success image to push, stop here."), "{logs}");
    assert!(engine.calls.is_empty());
}

#[test]
fn test_push_outcomes_are_logged_per_image() {
    let temp_dir = TempDir::new().unwrap();
    let entries = two_entries(temp_dir.path());
    let context = ci_context(RegistryKind::DockerHub, "master");
    let mut engine = RecordingEngine::new().failing("push shipwright/node:16");
    let mut store = MemoryStore::new();

    let (report, logs) =
        capture_logs(|| push_all(&context, &entries, &mut engine, &mut store, now()).unwrap());

    assert_eq!(report.failed, vec!["node:16"]);
    assert!(logs.contains("Push failed! node:16: "), "{logs}");
    assert!(logs.contains("simulated failure"), "{logs}");
    assert!(logs.contains("Success! python:3.8"), "{logs}");
    assert!(!logs.contains("Success! node:16"), "{logs}");
}
