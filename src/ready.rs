//! Readiness detection for freshly launched pipeline jobs.
//!
//! A job is considered ready once a line of its combined output contains the
//! readiness marker. Detection is a bounded poll: it never blocks past the
//! deadline, even if the job produces no output at all.

use std::time::{Duration, Instant};

use tracing::debug;

use crate::constants::{EARLY_EXIT_CAPTURE, READY_MARKER, READY_POLL_INTERVAL};
use crate::process::PipelineProcess;
use crate::trigger::clip;

/// Outcome of waiting for a pipeline job to become ready.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadinessResult {
    /// The readiness marker was observed within the deadline.
    Ready,
    /// The job exited before emitting the marker; carries truncated output.
    FailedEarlyExit(String),
    /// The deadline elapsed; a termination signal has been sent to the job.
    Timeout,
}

/// Polls `process` until it is ready, dead, or the deadline elapses.
///
/// Each iteration first checks for an early exit, then reads one line of
/// combined output with a short timeout. On `Ready` the remaining deadline
/// is not waited out. On `Timeout` the half-started job has been sent
/// SIGTERM; the caller still owns the handle and runs the full escalation.
pub fn await_ready(process: &mut PipelineProcess, deadline: Duration) -> ReadinessResult {
    let started = Instant::now();
    let mut seen: Vec<String> = Vec::new();

    loop {
        if let Some(status) = process.poll_exit() {
            debug!(
                "Pipeline '{}' exited with {status} before becoming ready",
                process.identity()
            );
            seen.extend(process.drain_output());
            return ReadinessResult::FailedEarlyExit(clip(
                &seen.join("\n"),
                EARLY_EXIT_CAPTURE,
            ));
        }

        if let Some(line) = process.read_line(READY_POLL_INTERVAL) {
            if line.contains(READY_MARKER) {
                debug!("Pipeline '{}' reported ready: {line}", process.identity());
                return ReadinessResult::Ready;
            }
            seen.push(line);
        }

        if started.elapsed() >= deadline {
            debug!(
                "Pipeline '{}' did not become ready within {deadline:?}",
                process.identity()
            );
            process.send_term();
            return ReadinessResult::Timeout;
        }
    }
}
