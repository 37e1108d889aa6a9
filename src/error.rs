//! Error handling for pipemgr.
use thiserror::Error;

use crate::pipeline::PipelineIdentity;
use crate::slot::RunState;

/// Defines all possible errors that can occur in the pipeline runner.
#[derive(Debug, Error)]
pub enum RunnerError {
    /// Error reading or accessing a configuration file.
    #[error("Failed to read config file: {0}")]
    ConfigReadError(#[from] std::io::Error),

    /// Error parsing YAML configuration.
    #[error("Invalid YAML format: {0}")]
    ConfigParseError(#[from] serde_yaml::Error),

    /// The requested service is not one of the known pipeline services.
    #[error("Invalid service '{0}'. Use: notion, gsheets")]
    InvalidService(String),

    /// The requested environment is not one of the known environments.
    #[error("Invalid environment '{0}'. Use: dev, prod")]
    InvalidEnvironment(String),

    /// The build descriptor needed to launch a pipeline job is missing.
    #[error("Makefile not found. Run from the project root directory")]
    MissingPrerequisite,

    /// Error spawning a pipeline job process.
    #[error("Failed to start {pipeline}: {source}")]
    LaunchError {
        /// The pipeline that failed to launch.
        pipeline: PipelineIdentity,
        /// The underlying error that occurred.
        #[source]
        source: std::io::Error,
    },

    /// A pipeline already occupies the single slot.
    #[error("{current} is running. Stop it first with stop")]
    Conflict {
        /// The pipeline currently occupying the slot.
        current: PipelineIdentity,
    },

    /// The pipeline process exited before emitting its readiness marker.
    #[error("{pipeline} process exited early. Output: {output}")]
    EarlyExit {
        /// The pipeline that died during startup.
        pipeline: PipelineIdentity,
        /// Truncated combined output captured from the dead process.
        output: String,
    },

    /// The pipeline never became ready within the startup deadline.
    #[error("{pipeline} failed to start within {timeout_secs} seconds")]
    StartTimeout {
        /// The pipeline that timed out.
        pipeline: PipelineIdentity,
        /// The deadline that elapsed.
        timeout_secs: u64,
    },

    /// An operation that requires a running pipeline found the slot empty.
    #[error("No pipeline running. Start one first with start")]
    NoPipelineRunning,

    /// A dead process was lazily discovered on the status or trigger path.
    #[error("{pipeline} process died unexpectedly")]
    CrashDetected {
        /// The pipeline whose process died.
        pipeline: PipelineIdentity,
    },

    /// The slot was observed in a state that the requested transition forbids.
    #[error("Pipeline slot is {state} while committing a running pipeline")]
    SlotOutOfSync {
        /// The state the slot was actually in.
        state: RunState,
    },

    /// Error encoding the machine-readable status report.
    #[error("Failed to encode status report: {0}")]
    StatusEncodeError(#[from] serde_json::Error),

    /// Error for poisoned mutex.
    #[error("Mutex is poisoned: {0}")]
    MutexPoisonError(String),
}

/// Implement the `From` trait to convert a `std::sync::PoisonError` into a `RunnerError`.
impl<T> From<std::sync::PoisonError<T>> for RunnerError {
    /// Converts a `std::sync::PoisonError` into a `RunnerError`.
    fn from(err: std::sync::PoisonError<T>) -> Self {
        RunnerError::MutexPoisonError(err.to_string())
    }
}
