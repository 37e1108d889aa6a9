#![allow(dead_code)]

use std::{
    fs,
    net::TcpListener,
    path::Path,
    thread,
    time::{Duration, Instant},
};

use nix::{sys::signal, unistd::Pid};
use pipemgr::config::RunnerConfig;

/// Writes a fake pipeline harness into `dir`: the build descriptor plus a
/// stand-in build script whose behavior is the given shell body.
///
/// The returned config launches jobs through the stand-in script, so tests
/// do not depend on `make` being installed.
pub fn harness_config(dir: &Path, script_body: &str) -> RunnerConfig {
    fs::write(dir.join("Makefile"), "run-notion-dev:\n\t@true\n").unwrap();
    fs::write(dir.join("fake-make.sh"), script_body).unwrap();

    RunnerConfig {
        project_dir: Some(dir.to_string_lossy().into_owned()),
        build_command: "sh fake-make.sh".into(),
        startup_timeout_secs: 5,
        settle_delay_ms: 50,
        ..RunnerConfig::default()
    }
}

/// A job that becomes ready immediately and then idles.
pub const READY_SCRIPT: &str = "#!/bin/sh\n\
    echo \"Running on http://0.0.0.0:${PORT}\"\n\
    exec sleep 30\n";

/// A job that dies before emitting the readiness marker.
pub const EARLY_EXIT_SCRIPT: &str = "#!/bin/sh\n\
    echo \"boom: credentials missing\"\n\
    exit 1\n";

/// A job that never emits the readiness marker and produces no output.
pub const SILENT_SCRIPT: &str = "#!/bin/sh\nexec sleep 30\n";

/// Returns a port with nothing listening on it.
pub fn free_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap().port()
}

/// Serves a single canned 200 response on an OS-assigned port.
pub fn one_shot_http_server(body: &'static str) -> u16 {
    use std::io::{Read, Write};

    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();

    thread::spawn(move || {
        if let Ok((mut stream, _)) = listener.accept() {
            let mut buf = [0u8; 4096];
            let _ = stream.read(&mut buf);
            let response = format!(
                "HTTP/1.1 200 OK\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len()
            );
            let _ = stream.write_all(response.as_bytes());
        }
    });

    port
}

pub fn is_process_alive(pid: u32) -> bool {
    signal::kill(Pid::from_raw(pid as i32), None).is_ok()
}

pub fn wait_for_path(path: &Path) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while Instant::now() < deadline {
        if path.exists() {
            return;
        }
        thread::sleep(Duration::from_millis(100));
    }
    panic!("Timed out waiting for {:?} to exist", path);
}

pub fn wait_for_process_exit(pid: u32) {
    let deadline = Instant::now() + Duration::from_secs(10);
    while Instant::now() < deadline {
        if !is_process_alive(pid) {
            return;
        }
        thread::sleep(Duration::from_millis(100));
    }
    panic!("Timed out waiting for PID {} to exit", pid);
}
