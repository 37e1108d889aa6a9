//! The single process-wide pipeline slot.
//!
//! At most one pipeline occupies the slot at any instant. Every lifecycle
//! transition goes through this module, and each transition is one critical
//! section under the slot mutex, so two concurrent starts can never both
//! succeed.

use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::Serialize;
use strum_macros::Display;

use crate::error::RunnerError;
use crate::pipeline::PipelineIdentity;
use crate::process::PipelineProcess;

/// Lifecycle state of the slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum RunState {
    /// No pipeline is active.
    Idle,
    /// A pipeline has claimed the slot and is waiting to become ready.
    Starting,
    /// A pipeline is running and accepting trigger requests.
    Running,
    /// A pipeline is being torn down.
    Stopping,
}

/// Slot contents; the variant shape guarantees an identity exists exactly
/// when the slot is occupied and a process handle exactly when running.
enum SlotState {
    Idle,
    Starting {
        identity: PipelineIdentity,
    },
    Running {
        identity: PipelineIdentity,
        process: PipelineProcess,
        started_at: DateTime<Utc>,
    },
    Stopping {
        identity: PipelineIdentity,
    },
}

impl SlotState {
    fn run_state(&self) -> RunState {
        match self {
            SlotState::Idle => RunState::Idle,
            SlotState::Starting { .. } => RunState::Starting,
            SlotState::Running { .. } => RunState::Running,
            SlotState::Stopping { .. } => RunState::Stopping,
        }
    }

    fn identity(&self) -> Option<PipelineIdentity> {
        match self {
            SlotState::Idle => None,
            SlotState::Starting { identity }
            | SlotState::Running { identity, .. }
            | SlotState::Stopping { identity } => Some(*identity),
        }
    }
}

/// Read-only copy of the slot for status and reporting.
#[derive(Debug, Clone, Serialize)]
pub struct SlotSnapshot {
    /// Current lifecycle state.
    pub state: RunState,
    /// Identity of the occupying pipeline, if any.
    pub pipeline: Option<PipelineIdentity>,
    /// When the running pipeline was committed, if any.
    pub started_at: Option<DateTime<Utc>>,
}

/// Outcome of a liveness probe on the slot.
pub enum SlotProbe {
    /// The slot is empty.
    Idle,
    /// The slot is mid-transition (starting or stopping).
    Pending {
        /// The transitional state.
        state: RunState,
        /// The pipeline in transition.
        identity: PipelineIdentity,
    },
    /// The pipeline is running and its process is alive.
    Running {
        /// The running pipeline.
        identity: PipelineIdentity,
        /// When it was committed.
        since: DateTime<Utc>,
    },
    /// The process died behind the slot's back; the slot is already Idle
    /// again and the dead handle is returned for reaping.
    Crashed {
        /// The pipeline that died.
        identity: PipelineIdentity,
        /// The dead process handle, to be terminated/reaped by the caller.
        process: PipelineProcess,
    },
}

/// The single slot holding at most one `(identity, process)` pair.
pub struct PipelineSlot {
    inner: Mutex<SlotState>,
}

impl Default for PipelineSlot {
    fn default() -> Self {
        Self::new()
    }
}

impl PipelineSlot {
    /// Creates an empty slot.
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(SlotState::Idle),
        }
    }

    /// Claims the slot for `identity`.
    ///
    /// Succeeds only from `Idle`; the check and the transition to
    /// `Starting` happen atomically under the lock. An occupied slot yields
    /// [`RunnerError::Conflict`] carrying the current occupant.
    pub fn try_occupy(&self, identity: PipelineIdentity) -> Result<(), RunnerError> {
        let mut guard = self.inner.lock()?;
        match guard.identity() {
            None => {
                *guard = SlotState::Starting { identity };
                Ok(())
            }
            Some(current) => Err(RunnerError::Conflict { current }),
        }
    }

    /// Commits a ready process, transitioning `Starting` to `Running`.
    ///
    /// When the slot is no longer `Starting` (a concurrent stop or shutdown
    /// won it), the uncommitted process is handed back so the caller can
    /// terminate it instead of leaking it.
    pub fn commit_running(
        &self,
        process: PipelineProcess,
    ) -> Result<(), (PipelineProcess, RunnerError)> {
        let guard = self.inner.lock();
        let mut guard = match guard {
            Ok(guard) => guard,
            Err(err) => return Err((process, err.into())),
        };
        match &*guard {
            SlotState::Starting { identity } => {
                *guard = SlotState::Running {
                    identity: *identity,
                    process,
                    started_at: Utc::now(),
                };
                Ok(())
            }
            other => {
                let state = other.run_state();
                Err((process, RunnerError::SlotOutOfSync { state }))
            }
        }
    }

    /// Begins a stop: marks the slot `Stopping` and hands back the occupant.
    ///
    /// Returns `None` when there is nothing to stop. The caller terminates
    /// the returned process outside the lock, then calls [`release`].
    ///
    /// [`release`]: PipelineSlot::release
    pub fn begin_stop(
        &self,
    ) -> Result<Option<(PipelineIdentity, Option<PipelineProcess>)>, RunnerError> {
        let mut guard = self.inner.lock()?;
        let state = std::mem::replace(&mut *guard, SlotState::Idle);
        match state {
            SlotState::Idle => Ok(None),
            SlotState::Starting { identity } => {
                *guard = SlotState::Stopping { identity };
                Ok(Some((identity, None)))
            }
            SlotState::Running {
                identity, process, ..
            } => {
                *guard = SlotState::Stopping { identity };
                Ok(Some((identity, Some(process))))
            }
            // A concurrent stop is already tearing the pipeline down; treat
            // this one as a no-op.
            stopping @ SlotState::Stopping { .. } => {
                *guard = stopping;
                Ok(None)
            }
        }
    }

    /// Clears the slot back to `Idle` from any state.
    ///
    /// Idempotent; returns the process handle if one was still stored so
    /// the caller can terminate it outside the lock. Recovers a poisoned
    /// mutex, since this is the cleanup path invoked from the signal
    /// handler.
    pub fn release(&self) -> Option<PipelineProcess> {
        let mut guard = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        match std::mem::replace(&mut *guard, SlotState::Idle) {
            SlotState::Running { process, .. } => Some(process),
            _ => None,
        }
    }

    /// Read-only snapshot of the slot.
    pub fn snapshot(&self) -> Result<SlotSnapshot, RunnerError> {
        let guard = self.inner.lock()?;
        let started_at = match &*guard {
            SlotState::Running { started_at, .. } => Some(*started_at),
            _ => None,
        };
        Ok(SlotSnapshot {
            state: guard.run_state(),
            pipeline: guard.identity(),
            started_at,
        })
    }

    /// Probes the slot, lazily detecting a crashed process.
    ///
    /// A `Running` slot whose process has died is released to `Idle` under
    /// the same lock, and the dead handle is returned for reaping.
    pub fn probe(&self) -> Result<SlotProbe, RunnerError> {
        let mut guard = self.inner.lock()?;
        let state = std::mem::replace(&mut *guard, SlotState::Idle);
        match state {
            SlotState::Idle => Ok(SlotProbe::Idle),
            SlotState::Running {
                identity,
                mut process,
                started_at,
            } => {
                if process.is_alive() {
                    *guard = SlotState::Running {
                        identity,
                        process,
                        started_at,
                    };
                    Ok(SlotProbe::Running {
                        identity,
                        since: started_at,
                    })
                } else {
                    Ok(SlotProbe::Crashed { identity, process })
                }
            }
            pending => {
                let probe = SlotProbe::Pending {
                    state: pending.run_state(),
                    // Non-idle variants always carry an identity.
                    identity: pending.identity().ok_or(RunnerError::SlotOutOfSync {
                        state: pending.run_state(),
                    })?,
                };
                *guard = pending;
                Ok(probe)
            }
        }
    }
}
