#[path = "common/mod.rs"]
mod common;

use std::{fs, process::Command as StdCommand, thread, time::Duration};

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::tempdir;

#[test]
fn help_lists_the_operation_surface() {
    Command::new(assert_cmd::cargo::cargo_bin!("pmg"))
        .arg("--help")
        .assert()
        .success()
        .stdout(
            predicate::str::contains("start")
                .and(predicate::str::contains("trigger"))
                .and(predicate::str::contains("stop"))
                .and(predicate::str::contains("run"))
                .and(predicate::str::contains("status")),
        );
}

#[test]
fn unknown_subcommand_is_rejected() {
    Command::new(assert_cmd::cargo::cargo_bin!("pmg"))
        .arg("restart")
        .assert()
        .failure();
}

#[test]
fn status_without_a_supervisor_is_neutral() {
    let temp = tempdir().expect("failed to create tempdir");
    let home = temp.path().join("home");
    fs::create_dir_all(&home).expect("failed to create home dir");

    Command::new(assert_cmd::cargo::cargo_bin!("pmg"))
        .env("HOME", &home)
        .arg("status")
        .assert()
        .success()
        .stdout(predicate::str::contains("⭕ No supervisor running"));
}

#[test]
fn stop_without_a_supervisor_reports_failure_line() {
    let temp = tempdir().expect("failed to create tempdir");
    let home = temp.path().join("home");
    fs::create_dir_all(&home).expect("failed to create home dir");

    Command::new(assert_cmd::cargo::cargo_bin!("pmg"))
        .env("HOME", &home)
        .arg("stop")
        .assert()
        .success()
        .stdout(predicate::str::contains("❌ No supervisor running"));
}

#[test]
fn serve_answers_status_and_shuts_down() {
    let temp = tempdir().expect("failed to create tempdir");
    let home = temp.path().join("home");
    fs::create_dir_all(&home).expect("failed to create home dir");
    let project = temp.path().join("project");
    fs::create_dir_all(&project).expect("failed to create project dir");
    fs::write(project.join("Makefile"), "run-notion-dev:\n\t@true\n")
        .expect("failed to write Makefile");

    let config_path = temp.path().join("pipemgr.yaml");
    fs::write(
        &config_path,
        format!("project_dir: \"{}\"\n", project.display()),
    )
    .expect("failed to write config");

    let mut supervisor = StdCommand::new(assert_cmd::cargo::cargo_bin!("pmg"))
        .env("HOME", &home)
        .arg("serve")
        .arg("--config")
        .arg(&config_path)
        .spawn()
        .expect("failed to spawn supervisor");

    common::wait_for_path(&home.join(".local/share/pipemgr/control.sock"));

    Command::new(assert_cmd::cargo::cargo_bin!("pmg"))
        .env("HOME", &home)
        .arg("status")
        .assert()
        .success()
        .stdout(predicate::str::contains("⭕ No pipeline running"));

    Command::new(assert_cmd::cargo::cargo_bin!("pmg"))
        .env("HOME", &home)
        .arg("shutdown")
        .assert()
        .success()
        .stdout(predicate::str::contains("Supervisor shutting down"));

    // The supervisor exits on its own after the shutdown response.
    let deadline = std::time::Instant::now() + Duration::from_secs(5);
    loop {
        if supervisor
            .try_wait()
            .expect("failed to poll supervisor")
            .is_some()
        {
            break;
        }
        if std::time::Instant::now() >= deadline {
            supervisor.kill().ok();
            supervisor.wait().ok();
            panic!("supervisor did not exit after shutdown");
        }
        thread::sleep(Duration::from_millis(100));
    }
}
