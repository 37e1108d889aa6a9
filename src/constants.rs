//! Constants and configuration values for the pipeline runner.
//!
//! This module centralizes the magic numbers and strings used throughout the
//! runner to improve maintainability and clarity.

use std::time::Duration;

// ============================================================================
// Pipeline Job Boundary
// ============================================================================

/// Port injected into every launched pipeline job via the `PORT` environment
/// variable; the trigger client POSTs to this port on localhost.
pub const PIPELINE_PORT: u16 = 8080;

/// Name of the environment variable carrying the injected port.
pub const PORT_ENV_VAR: &str = "PORT";

/// Build descriptor that must exist in the project root before a job can be
/// launched.
pub const BUILD_DESCRIPTOR: &str = "Makefile";

/// Default build-style command used to invoke a pipeline job target.
pub const DEFAULT_BUILD_COMMAND: &str = "make";

/// Literal substring a pipeline job prints once it is accepting requests.
pub const READY_MARKER: &str = "Running on http://";

// ============================================================================
// Shell Execution Constants
// ============================================================================

/// Default shell used for executing pipeline job commands.
pub const DEFAULT_SHELL: &str = "sh";

/// Shell argument flag for executing command strings.
pub const SHELL_COMMAND_FLAG: &str = "-c";

// ============================================================================
// Startup and Shutdown Timing
// ============================================================================

/// Maximum time to wait for a pipeline job to emit its readiness marker.
pub const STARTUP_TIMEOUT: Duration = Duration::from_secs(10);

/// Polling interval while waiting for readiness or process exit.
pub const READY_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Number of liveness probes performed across the 5 second grace period
/// between SIGTERM and SIGKILL.
pub const SHUTDOWN_GRACE_CHECKS: usize = 50;

/// Interval between liveness probes during the shutdown grace period.
pub const SHUTDOWN_CHECK_INTERVAL: Duration = Duration::from_millis(100);

/// Delay between a successful start and the trigger call in a composite run.
pub const SETTLE_DELAY: Duration = Duration::from_millis(500);

// ============================================================================
// Trigger Client Constants
// ============================================================================

/// Bound on a single trigger request, connection establishment included.
pub const TRIGGER_TIMEOUT: Duration = Duration::from_secs(30);

/// Characters of a successful trigger response body kept for reporting.
pub const TRIGGER_BODY_LIMIT: usize = 200;

/// Characters of a failed trigger response body kept for reporting.
pub const TRIGGER_ERROR_BODY_LIMIT: usize = 100;

/// Characters of combined output captured when a job dies during startup.
pub const EARLY_EXIT_CAPTURE: usize = 200;

/// Marker appended to truncated response bodies.
pub const ELLIPSIS: &str = "...";

// ============================================================================
// Report Glyphs
// ============================================================================

/// Prefix for successful operation reports.
pub const GLYPH_OK: &str = "✅";

/// Prefix for failed operation reports.
pub const GLYPH_ERR: &str = "❌";

/// Prefix for neutral status reports.
pub const GLYPH_IDLE: &str = "⭕";
