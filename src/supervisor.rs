//! Resident supervisor that owns the pipeline runner and reacts to CLI
//! commands over the control socket.

use std::{
    fs, io,
    os::unix::net::UnixListener,
    sync::Arc,
};

use tracing::{debug, error, info, warn};

use crate::{
    config::RunnerConfig,
    error::RunnerError,
    ipc::{self, ControlCommand, ControlResponse},
    runner::PipelineRunner,
};

use thiserror::Error;

/// Errors emitted by the resident supervisor runtime.
#[derive(Debug, Error)]
pub enum SupervisorError {
    #[error(transparent)]
    Runner(#[from] RunnerError),
    #[error(transparent)]
    Control(#[from] ipc::ControlError),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error("failed to register signal handler: {0}")]
    Signal(#[from] ctrlc::Error),
}

/// Long-lived supervisor holding the single pipeline slot.
pub struct PipelineSupervisor {
    runner: Arc<PipelineRunner>,
}

impl PipelineSupervisor {
    /// Creates a supervisor with a fresh runner.
    pub fn new(config: RunnerConfig) -> Self {
        Self {
            runner: Arc::new(PipelineRunner::new(config)),
        }
    }

    /// Runs the supervisor event loop until a shutdown command arrives.
    ///
    /// Binds the control socket, records the supervisor PID, registers the
    /// termination-signal hook, then serves one command per connection.
    pub fn run(&self) -> Result<(), SupervisorError> {
        ipc::cleanup_runtime()?;
        let socket_path = ipc::socket_path()?;
        if socket_path.exists() {
            fs::remove_file(&socket_path)?;
        }

        let listener = UnixListener::bind(&socket_path)?;
        ipc::write_supervisor_pid(unsafe { libc::getpid() })?;

        self.register_signal_handler()?;
        self.runner.cleanup();

        info!("pipemgr supervisor listening on {:?}", socket_path);

        let mut shutdown_requested = false;
        while !shutdown_requested {
            match listener.accept() {
                Ok((mut stream, _addr)) => match ipc::read_command(&mut stream) {
                    Ok(command) => {
                        let should_shutdown =
                            matches!(command, ControlCommand::Shutdown);
                        debug!("Supervisor received command: {:?}", command);
                        let response = self.handle_command(command);
                        let _ = ipc::write_response(&mut stream, &response);
                        if should_shutdown {
                            shutdown_requested = true;
                        }
                    }
                    Err(err) => {
                        warn!("Invalid supervisor command: {err}");
                        let _ = ipc::write_response(
                            &mut stream,
                            &ControlResponse::Error(err.to_string()),
                        );
                    }
                },
                Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
                Err(err) => {
                    error!("Supervisor listener error: {err}");
                    shutdown_requested = true;
                }
            }
        }

        self.shutdown_runtime();
        Ok(())
    }

    /// Dispatches one control command to the runner.
    ///
    /// Every operation folds into a one-line report; only transport-level
    /// problems become [`ControlResponse::Error`].
    fn handle_command(&self, command: ControlCommand) -> ControlResponse {
        match command {
            ControlCommand::Start {
                service,
                environment,
            } => ControlResponse::Message(
                self.runner.start_report(&service, &environment),
            ),
            ControlCommand::Trigger => {
                ControlResponse::Message(self.runner.trigger_report())
            }
            ControlCommand::Stop => ControlResponse::Message(self.runner.stop_report()),
            ControlCommand::Run {
                service,
                environment,
            } => ControlResponse::Message(self.runner.run(&service, &environment)),
            ControlCommand::Status { json } => {
                ControlResponse::Message(self.runner.status_report(json))
            }
            ControlCommand::Shutdown => {
                self.runner.cleanup();
                ControlResponse::Message("Supervisor shutting down".into())
            }
        }
    }

    /// Registers the termination-signal hook.
    ///
    /// The hook runs the same idempotent release path as an explicit stop,
    /// clears the runtime files, and exits.
    fn register_signal_handler(&self) -> Result<(), SupervisorError> {
        let slot = self.runner.slot();
        ctrlc::set_handler(move || {
            info!("pipemgr supervisor shutting down");
            if let Some(process) = slot.release() {
                process.terminate();
            }
            let _ = ipc::cleanup_runtime();
            std::process::exit(0);
        })?;
        Ok(())
    }

    /// Tears down the active pipeline and the runtime files.
    fn shutdown_runtime(&self) {
        self.runner.cleanup();
        let _ = ipc::cleanup_runtime();
    }
}
