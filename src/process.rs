//! Pipeline job process management.
//!
//! A [`PipelineProcess`] wraps the OS child running a pipeline job together
//! with its combined output stream. The child is spawned in its own process
//! group so the whole build-invoked tree can be signalled during shutdown.

use std::{
    io::{BufRead, BufReader, Read},
    os::unix::process::CommandExt,
    process::{Child, Command, ExitStatus, Stdio},
    sync::mpsc::{self, Receiver, RecvTimeoutError, Sender},
    thread,
    time::{Duration, Instant},
};

use nix::{
    errno::Errno,
    sys::signal::{self, Signal},
    unistd::Pid,
};
use tracing::{debug, trace, warn};

use crate::config::RunnerConfig;
use crate::constants::{
    DEFAULT_SHELL, PORT_ENV_VAR, SHELL_COMMAND_FLAG, SHUTDOWN_CHECK_INTERVAL,
    SHUTDOWN_GRACE_CHECKS,
};
use crate::error::RunnerError;
use crate::pipeline::PipelineIdentity;

/// How long to keep draining output after the child is known to be dead.
const DRAIN_DEADLINE: Duration = Duration::from_millis(500);

/// Interval of silence after which the output stream is considered drained.
const DRAIN_QUIET_INTERVAL: Duration = Duration::from_millis(50);

/// Exclusive handle to a launched pipeline job.
///
/// Created by [`PipelineProcess::launch`], owned by the lifecycle slot while
/// the pipeline runs, and consumed by [`PipelineProcess::terminate`].
pub struct PipelineProcess {
    child: Child,
    output: Receiver<String>,
    identity: PipelineIdentity,
}

impl PipelineProcess {
    /// Launches the pipeline job for `identity`.
    ///
    /// Runs `{build_command} run-{service}-{env}` via the shell from the
    /// project root, with the configured port injected as `PORT` on top of
    /// the inherited environment. stdout and stderr are piped and merged
    /// into a single line stream.
    ///
    /// A spawn failure surfaces as [`RunnerError::LaunchError`]; nothing has
    /// been committed anywhere at that point.
    pub fn launch(
        identity: PipelineIdentity,
        config: &RunnerConfig,
    ) -> Result<Self, RunnerError> {
        let command = format!("{} {}", config.build_command, identity.build_target());
        debug!("Launching pipeline '{identity}' with command: `{command}`");

        let mut cmd = Command::new(DEFAULT_SHELL);
        cmd.arg(SHELL_COMMAND_FLAG).arg(&command);
        cmd.current_dir(config.project_root());
        cmd.env(PORT_ENV_VAR, config.port.to_string());
        cmd.stdout(Stdio::piped()).stderr(Stdio::piped());

        unsafe {
            cmd.pre_exec(move || {
                // Place the job in its own process group so the whole build
                // tree can be signalled without touching the supervisor's
                // group.
                if libc::setpgid(0, 0) < 0 {
                    return Err(std::io::Error::last_os_error());
                }

                // Ensure the job gets killed on parent death (Linux only).
                #[cfg(target_os = "linux")]
                {
                    use libc::{PR_SET_PDEATHSIG, SIGTERM, prctl};
                    if prctl(PR_SET_PDEATHSIG, SIGTERM, 0, 0, 0) < 0 {
                        return Err(std::io::Error::last_os_error());
                    }
                }

                Ok(())
            });
        }

        let mut child = cmd.spawn().map_err(|source| RunnerError::LaunchError {
            pipeline: identity,
            source,
        })?;
        debug!("Pipeline '{identity}' started with PID: {}", child.id());

        let (tx, output) = mpsc::channel();
        if let Some(stdout) = child.stdout.take() {
            spawn_output_reader(identity, stdout, tx.clone());
        }
        if let Some(stderr) = child.stderr.take() {
            spawn_output_reader(identity, stderr, tx);
        }

        Ok(Self {
            child,
            output,
            identity,
        })
    }

    /// PID of the underlying child process.
    pub fn pid(&self) -> u32 {
        self.child.id()
    }

    /// Identity of the pipeline this process was launched for.
    pub fn identity(&self) -> PipelineIdentity {
        self.identity
    }

    /// Non-blocking exit probe; reaps the child when it has exited.
    pub fn poll_exit(&mut self) -> Option<ExitStatus> {
        match self.child.try_wait() {
            Ok(status) => status,
            Err(err) => {
                debug!("Failed to poll pipeline '{}': {err}", self.identity);
                None
            }
        }
    }

    /// Whether the child is still alive.
    pub fn is_alive(&mut self) -> bool {
        self.poll_exit().is_none()
    }

    /// Reads one line of combined output, waiting at most `timeout`.
    ///
    /// Returns `None` on timeout or once both output pipes are closed. Never
    /// blocks past `timeout`, even if the child produces no output at all.
    pub fn read_line(&self, timeout: Duration) -> Option<String> {
        match self.output.recv_timeout(timeout) {
            Ok(line) => Some(line),
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => None,
        }
    }

    /// Collects whatever combined output is still buffered or in flight.
    ///
    /// Used for the early-exit diagnostic; bounded so a straggling
    /// grandchild holding the pipe open cannot stall the caller.
    pub fn drain_output(&self) -> Vec<String> {
        let mut lines: Vec<String> = self.output.try_iter().collect();

        let deadline = Instant::now() + DRAIN_DEADLINE;
        while Instant::now() < deadline {
            match self.output.recv_timeout(DRAIN_QUIET_INTERVAL) {
                Ok(line) => lines.push(line),
                Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => {
                    break;
                }
            }
        }

        lines
    }

    /// Sends a graceful termination signal without waiting.
    ///
    /// Used when the readiness deadline expires; the full escalation still
    /// runs via [`PipelineProcess::terminate`] afterwards.
    pub fn send_term(&self) {
        let pid = Pid::from_raw(self.child.id() as i32);
        if let Err(err) = signal::kill(pid, Signal::SIGTERM)
            && err != Errno::ESRCH
        {
            debug!("Failed to send SIGTERM to '{}': {err}", self.identity);
        }
    }

    /// Escalating shutdown: SIGTERM, bounded wait, SIGKILL, unconditional
    /// reap.
    ///
    /// Consumes the handle, so no live reference can outlive the
    /// termination. Every step is best-effort; a process that is already
    /// dead at any point is not an error.
    pub fn terminate(mut self) {
        let identity = self.identity;
        debug!("Stopping pipeline '{identity}' (PID {})", self.pid());

        if self.reap_if_exited() {
            return;
        }

        self.signal_group_or_pid(Signal::SIGTERM);

        for _ in 0..SHUTDOWN_GRACE_CHECKS {
            thread::sleep(SHUTDOWN_CHECK_INTERVAL);
            if self.reap_if_exited() {
                return;
            }
        }

        warn!("Pipeline '{identity}' did not exit after SIGTERM; sending SIGKILL");
        self.signal_group_or_pid(Signal::SIGKILL);

        if let Err(err) = self.child.wait() {
            debug!("Failed to reap pipeline '{identity}' after SIGKILL: {err}");
        }
    }

    /// Reaps the child if it has already exited.
    fn reap_if_exited(&mut self) -> bool {
        match self.child.try_wait() {
            Ok(Some(status)) => {
                debug!("Pipeline '{}' exited with {status}", self.identity);
                true
            }
            Ok(None) => false,
            Err(err) => {
                debug!("Failed to poll pipeline '{}': {err}", self.identity);
                false
            }
        }
    }

    /// Signals the job's process group, falling back to the direct PID when
    /// the group is gone or shared with the supervisor.
    fn signal_group_or_pid(&self, sig: Signal) {
        let pid = self.child.id() as i32;
        let supervisor_pgid = unsafe { libc::getpgid(0) };
        let child_pgid = unsafe { libc::getpgid(pid) };

        if child_pgid >= 0 && child_pgid != supervisor_pgid {
            if unsafe { libc::killpg(child_pgid, sig as i32) } == 0 {
                debug!(
                    "Sent {sig:?} to process group {child_pgid} for '{}'",
                    self.identity
                );
                return;
            }
            let err = std::io::Error::last_os_error();
            debug!(
                "Failed to signal process group {child_pgid} for '{}': {err}; \
                 falling back to direct signal",
                self.identity
            );
        }

        if let Err(err) = signal::kill(Pid::from_raw(pid), sig)
            && err != Errno::ESRCH
        {
            debug!("Failed to signal pipeline '{}' directly: {err}", self.identity);
        }
    }
}

/// Forwards one of the child's output pipes into the merged line channel.
fn spawn_output_reader<R: Read + Send + 'static>(
    identity: PipelineIdentity,
    stream: R,
    tx: Sender<String>,
) {
    thread::spawn(move || {
        let reader = BufReader::new(stream);
        for line in reader.lines().map_while(Result::ok) {
            trace!("[{identity}] {line}");
            if tx.send(line).is_err() {
                break;
            }
        }
    });
}
