#[path = "common/mod.rs"]
mod common;

use std::{thread, time::Duration};

use pipemgr::{
    error::RunnerError,
    pipeline::PipelineIdentity,
    runner::PipelineRunner,
    slot::RunState,
    trigger::TriggerResult,
};
use tempfile::tempdir;

#[test]
fn scenario_invalid_service_spawns_nothing() {
    let dir = tempdir().unwrap();
    let config = common::harness_config(dir.path(), common::READY_SCRIPT);
    let runner = PipelineRunner::new(config);

    let err = runner.start("bogus", "dev").unwrap_err();
    assert!(matches!(err, RunnerError::InvalidService(name) if name == "bogus"));
    assert_eq!(runner.slot().snapshot().unwrap().state, RunState::Idle);
}

#[test]
fn scenario_missing_build_descriptor() {
    let dir = tempdir().unwrap();
    let mut config = common::harness_config(dir.path(), common::READY_SCRIPT);
    std::fs::remove_file(dir.path().join("Makefile")).unwrap();
    config.project_dir = Some(dir.path().to_string_lossy().into_owned());
    let runner = PipelineRunner::new(config);

    let err = runner.start("notion", "dev").unwrap_err();
    assert!(matches!(err, RunnerError::MissingPrerequisite));
    assert_eq!(runner.slot().snapshot().unwrap().state, RunState::Idle);
}

#[test]
fn scenario_start_status_stop_cycle() {
    let dir = tempdir().unwrap();
    let config = common::harness_config(dir.path(), common::READY_SCRIPT);
    let port = config.port;
    let runner = PipelineRunner::new(config);

    let report = runner.start("notion", "dev").unwrap();
    assert_eq!(
        report,
        format!("✅ notion-dev started successfully on port {port}")
    );

    let status = runner.status().unwrap();
    assert!(status.starts_with("✅ Running: notion-dev"), "got: {status}");

    assert_eq!(runner.stop().unwrap(), "✅ Stopped notion-dev");
    assert_eq!(runner.status().unwrap(), "⭕ No pipeline running");
    assert_eq!(runner.slot().snapshot().unwrap().state, RunState::Idle);
}

#[test]
fn start_while_running_reports_conflict_and_keeps_state() {
    let dir = tempdir().unwrap();
    let config = common::harness_config(dir.path(), common::READY_SCRIPT);
    let runner = PipelineRunner::new(config);

    runner.start("notion", "dev").unwrap();

    let err = runner.start("gsheets", "prod").unwrap_err();
    let expected = PipelineIdentity::parse("notion", "dev").unwrap();
    assert!(matches!(err, RunnerError::Conflict { current } if current == expected));

    let snapshot = runner.slot().snapshot().unwrap();
    assert_eq!(snapshot.state, RunState::Running);
    assert_eq!(snapshot.pipeline, Some(expected));

    runner.stop().unwrap();
}

#[test]
fn early_exit_releases_the_slot() {
    let dir = tempdir().unwrap();
    let config = common::harness_config(dir.path(), common::EARLY_EXIT_SCRIPT);
    let runner = PipelineRunner::new(config);

    let err = runner.start("notion", "dev").unwrap_err();
    match err {
        RunnerError::EarlyExit { pipeline, output } => {
            assert_eq!(pipeline, PipelineIdentity::parse("notion", "dev").unwrap());
            assert!(output.contains("boom"));
        }
        other => panic!("expected early exit, got {other}"),
    }

    assert_eq!(runner.slot().snapshot().unwrap().state, RunState::Idle);
}

#[test]
fn readiness_timeout_releases_the_slot() {
    let dir = tempdir().unwrap();
    let mut config = common::harness_config(dir.path(), common::SILENT_SCRIPT);
    config.startup_timeout_secs = 1;
    let runner = PipelineRunner::new(config);

    let err = runner.start("notion", "dev").unwrap_err();
    assert!(matches!(
        err,
        RunnerError::StartTimeout { timeout_secs: 1, .. }
    ));
    assert_eq!(runner.slot().snapshot().unwrap().state, RunState::Idle);
}

#[test]
fn double_stop_is_a_noop() {
    let dir = tempdir().unwrap();
    let config = common::harness_config(dir.path(), common::READY_SCRIPT);
    let runner = PipelineRunner::new(config);

    runner.start("notion", "dev").unwrap();
    assert_eq!(runner.stop().unwrap(), "✅ Stopped notion-dev");
    assert_eq!(runner.stop().unwrap(), "⭕ No pipeline running");
}

#[test]
fn runner_is_reusable_after_a_stop() {
    let dir = tempdir().unwrap();
    let config = common::harness_config(dir.path(), common::READY_SCRIPT);
    let runner = PipelineRunner::new(config);

    runner.start("notion", "dev").unwrap();
    runner.stop().unwrap();
    runner.start("gsheets", "dev").unwrap();

    let status = runner.status().unwrap();
    assert!(status.starts_with("✅ Running: gsheets-dev"));

    runner.stop().unwrap();
}

#[test]
fn crash_is_detected_lazily_on_status() {
    let dir = tempdir().unwrap();
    let script = "#!/bin/sh\n\
        echo \"Running on http://0.0.0.0:${PORT}\"\n\
        sleep 0.2\n\
        exit 1\n";
    let config = common::harness_config(dir.path(), script);
    let runner = PipelineRunner::new(config);

    runner.start("notion", "dev").unwrap();
    thread::sleep(Duration::from_millis(600));

    assert_eq!(
        runner.status().unwrap(),
        "❌ notion-dev process died unexpectedly"
    );
    // The release ran as part of crash detection.
    assert_eq!(runner.status().unwrap(), "⭕ No pipeline running");
    assert_eq!(runner.slot().snapshot().unwrap().state, RunState::Idle);
}

#[test]
fn crash_is_detected_lazily_on_trigger() {
    let dir = tempdir().unwrap();
    let script = "#!/bin/sh\n\
        echo \"Running on http://0.0.0.0:${PORT}\"\n\
        sleep 0.2\n\
        exit 1\n";
    let config = common::harness_config(dir.path(), script);
    let runner = PipelineRunner::new(config);

    runner.start("notion", "dev").unwrap();
    thread::sleep(Duration::from_millis(600));

    let err = runner.trigger().unwrap_err();
    assert!(matches!(err, RunnerError::CrashDetected { .. }));
    assert_eq!(runner.slot().snapshot().unwrap().state, RunState::Idle);
}

#[test]
fn trigger_posts_to_the_configured_port() {
    let dir = tempdir().unwrap();
    let mut config = common::harness_config(dir.path(), common::READY_SCRIPT);
    config.port = common::one_shot_http_server("pipeline complete");
    let runner = PipelineRunner::new(config);

    runner.start("notion", "dev").unwrap();

    match runner.trigger().unwrap() {
        TriggerResult::Success { status, body } => {
            assert_eq!(status, 200);
            assert_eq!(body, "pipeline complete");
        }
        other => panic!("expected success, got {other:?}"),
    }

    runner.stop().unwrap();
}

#[test]
fn trigger_without_listener_is_a_connection_error() {
    let dir = tempdir().unwrap();
    let mut config = common::harness_config(dir.path(), common::READY_SCRIPT);
    config.port = common::free_port();
    let runner = PipelineRunner::new(config);

    runner.start("notion", "dev").unwrap();
    assert!(matches!(
        runner.trigger().unwrap(),
        TriggerResult::ConnectionError(_)
    ));
    runner.stop().unwrap();
}

#[test]
fn scenario_composite_run_returns_three_reports_and_ends_idle() {
    let dir = tempdir().unwrap();
    let mut config = common::harness_config(dir.path(), common::READY_SCRIPT);
    config.port = common::one_shot_http_server("42 expenses loaded");
    let runner = PipelineRunner::new(config);

    let report = runner.run("notion", "dev");
    let lines: Vec<&str> = report.lines().collect();

    assert_eq!(lines.len(), 3);
    assert!(lines[0].starts_with("Start: ✅"), "got: {}", lines[0]);
    assert!(
        lines[1].starts_with("Trigger: ✅ Pipeline triggered successfully:"),
        "got: {}",
        lines[1]
    );
    assert!(lines[2].starts_with("Stop: ✅ Stopped notion-dev"), "got: {}", lines[2]);

    assert_eq!(runner.slot().snapshot().unwrap().state, RunState::Idle);
}

#[test]
fn composite_run_stops_even_when_the_trigger_fails() {
    let dir = tempdir().unwrap();
    let mut config = common::harness_config(dir.path(), common::READY_SCRIPT);
    config.port = common::free_port();
    let runner = PipelineRunner::new(config);

    let report = runner.run("notion", "dev");
    let lines: Vec<&str> = report.lines().collect();

    assert_eq!(lines.len(), 3);
    assert!(lines[1].starts_with("Trigger: ❌"), "got: {}", lines[1]);
    assert!(lines[2].starts_with("Stop: ✅"), "got: {}", lines[2]);
    assert_eq!(runner.slot().snapshot().unwrap().state, RunState::Idle);
}

#[test]
fn status_json_reflects_a_running_pipeline() {
    let dir = tempdir().unwrap();
    let config = common::harness_config(dir.path(), common::READY_SCRIPT);
    let port = config.port;
    let runner = PipelineRunner::new(config);

    runner.start("notion", "dev").unwrap();

    let value: serde_json::Value =
        serde_json::from_str(&runner.status_json().unwrap()).unwrap();
    assert_eq!(value["state"], "running");
    assert_eq!(value["pipeline"]["service"], "notion");
    assert_eq!(value["pipeline"]["environment"], "dev");
    assert_eq!(value["port"], port);
    assert!(value["started_at"].is_string());

    runner.stop().unwrap();
}

#[test]
fn cleanup_terminates_a_running_pipeline() {
    let dir = tempdir().unwrap();
    let config = common::harness_config(dir.path(), common::READY_SCRIPT);
    let runner = PipelineRunner::new(config);

    runner.start("notion", "dev").unwrap();
    runner.cleanup();

    assert_eq!(runner.slot().snapshot().unwrap().state, RunState::Idle);
    // Calling it again must be safe.
    runner.cleanup();
}
