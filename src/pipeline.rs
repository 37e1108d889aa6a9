//! Pipeline identity types and input validation.
//!
//! Everything in this module is pure: validation runs before any process is
//! touched and has no side effects on the runner state.

use std::{fmt, path::Path, str::FromStr};

use serde::Serialize;
use strum_macros::{Display, EnumString};

use crate::constants::BUILD_DESCRIPTOR;
use crate::error::RunnerError;

/// A pipeline service known to the runner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display, EnumString)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
#[serde(rename_all = "lowercase")]
pub enum Service {
    /// Notion expense extraction pipeline.
    Notion,
    /// Google Sheets expense extraction pipeline.
    Gsheets,
}

/// A deployment environment a pipeline job can target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display, EnumString)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    /// Development environment.
    Dev,
    /// Production environment.
    Prod,
}

/// The identity of a pipeline: which service, in which environment.
///
/// Immutable once created; rendered as the composite label `service-env`
/// (e.g. `notion-dev`) everywhere the pipeline is named.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PipelineIdentity {
    /// The pipeline service.
    pub service: Service,
    /// The targeted environment.
    pub environment: Environment,
}

impl PipelineIdentity {
    /// Validates raw service and environment names into an identity.
    ///
    /// Fails with [`RunnerError::InvalidService`] or
    /// [`RunnerError::InvalidEnvironment`] when a name is not in the
    /// enumerated set. Service is checked first, mirroring the order the
    /// calling agent sees the arguments.
    pub fn parse(service: &str, environment: &str) -> Result<Self, RunnerError> {
        let service = Service::from_str(service)
            .map_err(|_| RunnerError::InvalidService(service.to_string()))?;
        let environment = Environment::from_str(environment)
            .map_err(|_| RunnerError::InvalidEnvironment(environment.to_string()))?;
        Ok(Self {
            service,
            environment,
        })
    }

    /// The build target name derived from this identity, e.g. `run-notion-dev`.
    pub fn build_target(&self) -> String {
        format!("run-{}-{}", self.service, self.environment)
    }
}

impl fmt::Display for PipelineIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.service, self.environment)
    }
}

/// Confirms the build descriptor exists in the project root.
///
/// Launching a job without it would fail with an opaque shell error, so the
/// check runs as part of validation, before any state mutation.
pub fn check_build_descriptor(project_root: &Path) -> Result<(), RunnerError> {
    if project_root.join(BUILD_DESCRIPTOR).exists() {
        Ok(())
    } else {
        Err(RunnerError::MissingPrerequisite)
    }
}
