//! The pipeline runner facade.
//!
//! Sequences every operation through the lifecycle slot: validate, occupy,
//! launch, await readiness, commit; and later trigger, stop, or probe. Also
//! renders the one-line glyph-prefixed reports the calling agent sees.

use std::{sync::Arc, thread};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, warn};

use crate::config::RunnerConfig;
use crate::constants::{GLYPH_ERR, GLYPH_IDLE, GLYPH_OK};
use crate::error::RunnerError;
use crate::pipeline::{self, PipelineIdentity};
use crate::process::PipelineProcess;
use crate::ready::{self, ReadinessResult};
use crate::slot::{PipelineSlot, RunState, SlotProbe};
use crate::trigger::{TriggerClient, TriggerResult};

/// Machine-readable status view.
#[derive(Debug, Serialize)]
struct StatusReport {
    state: RunState,
    pipeline: Option<PipelineIdentity>,
    port: u16,
    started_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    crashed: Option<PipelineIdentity>,
}

/// Drives at most one pipeline job at a time.
pub struct PipelineRunner {
    config: RunnerConfig,
    slot: Arc<PipelineSlot>,
}

impl PipelineRunner {
    /// Creates a runner with an empty slot.
    pub fn new(config: RunnerConfig) -> Self {
        Self {
            config,
            slot: Arc::new(PipelineSlot::new()),
        }
    }

    /// The shared slot, for registering the signal-handler cleanup path.
    pub fn slot(&self) -> Arc<PipelineSlot> {
        Arc::clone(&self.slot)
    }

    /// The configuration the runner was built with.
    pub fn config(&self) -> &RunnerConfig {
        &self.config
    }

    /// Starts a pipeline: validate, claim the slot, launch, await readiness.
    ///
    /// Any failure after the slot was claimed releases it and terminates the
    /// half-started job, so the runner is reusable immediately.
    pub fn start(
        &self,
        service: &str,
        environment: &str,
    ) -> Result<String, RunnerError> {
        let identity = PipelineIdentity::parse(service, environment)?;
        pipeline::check_build_descriptor(&self.config.project_root())?;

        self.slot.try_occupy(identity)?;

        let mut process = match PipelineProcess::launch(identity, &self.config) {
            Ok(process) => process,
            Err(err) => {
                self.slot.release();
                return Err(err);
            }
        };

        match ready::await_ready(&mut process, self.config.startup_timeout()) {
            ReadinessResult::Ready => {
                if let Err((process, err)) = self.slot.commit_running(process) {
                    // A concurrent stop or shutdown won the slot; the fresh
                    // process was never committed and must not leak.
                    warn!("Discarding freshly started '{identity}': {err}");
                    process.terminate();
                    return Err(err);
                }
                info!("Pipeline '{identity}' is running");
                Ok(format!(
                    "{GLYPH_OK} {identity} started successfully on port {}",
                    self.config.port
                ))
            }
            ReadinessResult::FailedEarlyExit(output) => {
                process.terminate();
                self.slot.release();
                Err(RunnerError::EarlyExit {
                    pipeline: identity,
                    output,
                })
            }
            ReadinessResult::Timeout => {
                process.terminate();
                self.slot.release();
                Err(RunnerError::StartTimeout {
                    pipeline: identity,
                    timeout_secs: self.config.startup_timeout_secs,
                })
            }
        }
    }

    /// Triggers the running pipeline.
    ///
    /// Requires the slot to be `Running`; otherwise no network call is made.
    /// A dead process discovered here is released exactly like a stop.
    pub fn trigger(&self) -> Result<TriggerResult, RunnerError> {
        match self.slot.probe()? {
            SlotProbe::Running { .. } => {
                let client =
                    TriggerClient::new(self.config.port, self.config.trigger_timeout());
                Ok(client.trigger())
            }
            SlotProbe::Crashed { identity, process } => {
                process.terminate();
                Err(RunnerError::CrashDetected { pipeline: identity })
            }
            SlotProbe::Idle | SlotProbe::Pending { .. } => {
                Err(RunnerError::NoPipelineRunning)
            }
        }
    }

    /// Stops the active pipeline; a stop with nothing running is a no-op.
    pub fn stop(&self) -> Result<String, RunnerError> {
        match self.slot.begin_stop()? {
            None => Ok(format!("{GLYPH_IDLE} No pipeline running")),
            Some((identity, process)) => {
                if let Some(process) = process {
                    process.terminate();
                }
                self.slot.release();
                info!("Pipeline '{identity}' stopped");
                Ok(format!("{GLYPH_OK} Stopped {identity}"))
            }
        }
    }

    /// Reports the runner status, lazily detecting a crashed process.
    pub fn status(&self) -> Result<String, RunnerError> {
        match self.slot.probe()? {
            SlotProbe::Idle => Ok(format!("{GLYPH_IDLE} No pipeline running")),
            SlotProbe::Pending { state, identity } => {
                Ok(format!("{GLYPH_IDLE} {identity} is {state}"))
            }
            SlotProbe::Running { identity, since } => Ok(format!(
                "{GLYPH_OK} Running: {identity} (port {}, up {})",
                self.config.port,
                format_uptime(since)
            )),
            SlotProbe::Crashed { identity, process } => {
                process.terminate();
                warn!("Pipeline '{identity}' died unexpectedly");
                Ok(format!(
                    "{GLYPH_ERR} {identity} process died unexpectedly"
                ))
            }
        }
    }

    /// Machine-readable status; the same crash detection as [`status`].
    ///
    /// [`status`]: PipelineRunner::status
    pub fn status_json(&self) -> Result<String, RunnerError> {
        let crashed = match self.slot.probe()? {
            SlotProbe::Crashed { identity, process } => {
                process.terminate();
                Some(identity)
            }
            _ => None,
        };

        let snapshot = self.slot.snapshot()?;
        let report = StatusReport {
            state: snapshot.state,
            pipeline: snapshot.pipeline,
            port: self.config.port,
            started_at: snapshot.started_at,
            crashed,
        };

        Ok(serde_json::to_string(&report)?)
    }

    /// Composite run: start, settle, trigger, stop; three labelled reports.
    ///
    /// The stop runs unconditionally once the start succeeded, whatever the
    /// trigger outcome, so the slot is always left `Idle`.
    pub fn run(&self, service: &str, environment: &str) -> String {
        let start_result = self.start(service, environment);
        let started = start_result.is_ok();
        let mut reports = vec![format!("Start: {}", render(start_result))];

        if !started {
            return reports.join("\n");
        }

        thread::sleep(self.config.settle_delay());

        reports.push(format!("Trigger: {}", self.trigger_report()));
        reports.push(format!("Stop: {}", render(self.stop())));
        reports.join("\n")
    }

    /// One-line report for a start request.
    pub fn start_report(&self, service: &str, environment: &str) -> String {
        render(self.start(service, environment))
    }

    /// One-line report for a trigger request.
    pub fn trigger_report(&self) -> String {
        match self.trigger() {
            Ok(result) => render_trigger(&result),
            Err(err) => format!("{GLYPH_ERR} {err}"),
        }
    }

    /// One-line report for a stop request.
    pub fn stop_report(&self) -> String {
        render(self.stop())
    }

    /// Status report, human-readable or JSON.
    pub fn status_report(&self, json: bool) -> String {
        if json {
            render(self.status_json())
        } else {
            render(self.status())
        }
    }

    /// Idempotent cleanup used by explicit shutdown and the signal path.
    pub fn cleanup(&self) {
        if let Some(process) = self.slot.release() {
            process.terminate();
        }
    }
}

/// Renders an operation result as one status line.
fn render(result: Result<String, RunnerError>) -> String {
    match result {
        Ok(line) => line,
        Err(err) => format!("{GLYPH_ERR} {err}"),
    }
}

/// Renders a trigger outcome as one status line.
fn render_trigger(result: &TriggerResult) -> String {
    match result {
        TriggerResult::Success { body, .. } => {
            format!("{GLYPH_OK} Pipeline triggered successfully: {body}")
        }
        TriggerResult::HttpError { status, body } => {
            format!("{GLYPH_ERR} Pipeline trigger failed: HTTP {status} - {body}")
        }
        TriggerResult::ConnectionError(message) => {
            format!("{GLYPH_ERR} Failed to connect to pipeline: {message}")
        }
    }
}

/// Compact uptime rendering for the status line.
fn format_uptime(since: DateTime<Utc>) -> String {
    let secs = (Utc::now() - since).num_seconds().max(0);
    if secs >= 3600 {
        format!("{}h{}m", secs / 3600, (secs % 3600) / 60)
    } else if secs >= 60 {
        format!("{}m{}s", secs / 60, secs % 60)
    } else {
        format!("{secs}s")
    }
}
