//! Pipemgr is a single-slot supervisor for expense tracker pipeline jobs. It
//! launches at most one pipeline at a time, watches its output for a
//! readiness marker, triggers it over HTTP, and tears it down with an
//! escalating termination sequence. A resident supervisor owns the slot and
//! serves the start/trigger/stop/run/status operations over a unix control
//! socket.

/// CLI interface.
pub mod cli;

/// Configuration management.
pub mod config;

/// Shared constants.
pub mod constants;

/// Error handling.
pub mod error;

/// IPC helpers for communicating with the resident supervisor.
pub mod ipc;

/// Pipeline identity types and input validation.
pub mod pipeline;

/// Pipeline job process management.
pub mod process;

/// Readiness detection for launched jobs.
pub mod ready;

/// The pipeline runner facade.
pub mod runner;

/// The single process-wide pipeline slot.
pub mod slot;

/// Resident supervisor runtime.
pub mod supervisor;

/// Trigger client for running jobs.
pub mod trigger;
