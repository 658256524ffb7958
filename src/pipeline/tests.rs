use tempfile::TempDir;

use crate::pipeline::{Stage, build_and_test};
use crate::testutil::{RecordingEngine, add_unit, capture_logs, entry};

#[test]
fn test_build_and_test_success() {
    let temp_dir = TempDir::new().unwrap();
    add_unit(temp_dir.path(), "python", "3.8", true);
    let mut engine = RecordingEngine::new();

    let result = build_and_test(vec![entry(temp_dir.path(), "python", "3.8")], &mut engine);

    assert_eq!(result.succeeded.len(), 1);
    assert!(result.failed.is_empty());
    assert_eq!(engine.calls, vec!["build python:3.8", "test 3.8"]);
}

#[test]
fn test_build_failure_skips_smoke_test() {
    let temp_dir = TempDir::new().unwrap();
    add_unit(temp_dir.path(), "python", "3.8", true);
    let mut engine = RecordingEngine::new().failing("build python:3.8");

    let result = build_and_test(vec![entry(temp_dir.path(), "python", "3.8")], &mut engine);

    assert!(result.succeeded.is_empty());
    assert_eq!(result.failed.len(), 1);
    assert_eq!(result.failed[0].stage, Stage::Build);
    assert!(result.failed[0].reason.contains("simulated failure"));
    assert!(engine.calls_starting_with("test").is_empty());
}

#[test]
fn test_smoke_test_failure_marks_unit_failed() {
    let temp_dir = TempDir::new().unwrap();
    add_unit(temp_dir.path(), "python", "3.8", true);
    let mut engine = RecordingEngine::new().failing("test 3.8");

    let result = build_and_test(vec![entry(temp_dir.path(), "python", "3.8")], &mut engine);

    assert!(result.succeeded.is_empty());
    assert_eq!(result.failed[0].stage, Stage::SmokeTest);
}

#[test]
fn test_one_failure_does_not_stop_the_batch() {
    let temp_dir = TempDir::new().unwrap();
    add_unit(temp_dir.path(), "node", "16", true);
    add_unit(temp_dir.path(), "python", "3.8", true);
    let mut engine = RecordingEngine::new().failing("build python:3.8");

    let result = build_and_test(
        vec![
            entry(temp_dir.path(), "node", "16"),
            entry(temp_dir.path(), "python", "3.8"),
        ],
        &mut engine,
    );

    let succeeded: Vec<String> = result.succeeded.iter().map(|e| e.identifier()).collect();
    let failed: Vec<String> = result.failed.iter().map(|f| f.entry.identifier()).collect();
    assert_eq!(succeeded, vec!["node:16"]);
    assert_eq!(failed, vec!["python:3.8"]);
    assert_eq!(
        engine.calls,
        vec!["build node:16", "test 16", "build python:3.8"]
    );
}

#[test]
fn test_missing_smoke_test_passes() {
    let temp_dir = TempDir::new().unwrap();
    add_unit(temp_dir.path(), "python", "3.8", false);
    let mut engine = RecordingEngine::new();

    let result = build_and_test(vec![entry(temp_dir.path(), "python", "3.8")], &mut engine);

    assert_eq!(result.succeeded.len(), 1);
    assert_eq!(engine.calls, vec!["build python:3.8"]);
}

#[test]
fn test_empty_plan() {
    let mut engine = RecordingEngine::new();
    let result = build_and_test(Vec::new(), &mut engine);
    assert!(result.succeeded.is_empty());
    assert!(result.failed.is_empty());
    assert!(engine.calls.is_empty());
}

#[test]
fn test_unit_failures_are_logged_and_summarised() {
    let temp_dir = TempDir::new().unwrap();
    add_unit(temp_dir.path(), "node", "16", true);
    add_unit(temp_dir.path(), "python", "3.8", true);
    add_unit(temp_dir.path(), "ruby", "3.1", true);
    let mut engine = RecordingEngine::new()
        .failing("build python:3.8")
        .failing("test 3.1");

    let (result, logs) = capture_logs(|| {
        build_and_test(
            vec![
                entry(temp_dir.path(), "node", "16"),
                entry(temp_dir.path(), "python", "3.8"),
                entry(temp_dir.path(), "ruby", "3.1"),
            ],
            &mut engine,
        )
    });

    assert_eq!(result.failed.len(), 2);
    assert!(logs.contains("Build success! node:16"), "{logs}");
    assert!(logs.contains("Test passed! node:16"), "{logs}");
    assert!(logs.contains("WARN"), "{logs}");
    assert!(
        logs.contains("Build failed! python:3.8: ") && logs.contains("simulated failure"),
        "{logs}"
    );
    assert!(logs.contains("Test failed! ruby:3.1"), "{logs}");
    assert!(logs.contains("--- docker build summary ---"), "{logs}");
    assert!(logs.contains("python:3.8 (build failed)"), "{logs}");
    assert!(logs.contains("ruby:3.1 (smoke test failed)"), "{logs}");
}
