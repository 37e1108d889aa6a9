//! Trigger client for the running pipeline job.
//!
//! Issues a single POST to the job's fixed local port with a bounded
//! timeout. Response bodies are opaque text, truncated for reporting.

use std::time::Duration;

use reqwest::blocking::Client;
use tracing::debug;

use crate::constants::{ELLIPSIS, TRIGGER_BODY_LIMIT, TRIGGER_ERROR_BODY_LIMIT};

/// Outcome of a trigger request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TriggerResult {
    /// The job accepted the trigger with a 2xx status.
    Success {
        /// HTTP status code.
        status: u16,
        /// Response body, truncated with an ellipsis marker.
        body: String,
    },
    /// The job answered with a non-2xx status.
    HttpError {
        /// HTTP status code.
        status: u16,
        /// Response body, truncated.
        body: String,
    },
    /// The request never produced an HTTP response (refused, timed out).
    ConnectionError(String),
}

/// Client for the trigger boundary of a running pipeline job.
pub struct TriggerClient {
    port: u16,
    timeout: Duration,
}

impl TriggerClient {
    /// Creates a client targeting `http://localhost:{port}/`.
    pub fn new(port: u16, timeout: Duration) -> Self {
        Self { port, timeout }
    }

    /// Issues one POST with no body and classifies the outcome.
    ///
    /// The request timeout is the only bound; there is no way to cancel a
    /// trigger once issued.
    pub fn trigger(&self) -> TriggerResult {
        let client = match Client::builder().timeout(self.timeout).build() {
            Ok(client) => client,
            Err(err) => return TriggerResult::ConnectionError(err.to_string()),
        };

        let url = format!("http://localhost:{}/", self.port);
        debug!("Triggering pipeline at {url}");

        match client.post(&url).send() {
            Ok(response) => {
                let status = response.status();
                let body = response.text().unwrap_or_default();
                if status.is_success() {
                    TriggerResult::Success {
                        status: status.as_u16(),
                        body: clip_marked(&body, TRIGGER_BODY_LIMIT),
                    }
                } else {
                    TriggerResult::HttpError {
                        status: status.as_u16(),
                        body: clip(&body, TRIGGER_ERROR_BODY_LIMIT),
                    }
                }
            }
            Err(err) => TriggerResult::ConnectionError(err.to_string()),
        }
    }
}

/// Truncates `text` to at most `limit` characters.
pub(crate) fn clip(text: &str, limit: usize) -> String {
    text.chars().take(limit).collect()
}

/// Truncates `text` to `limit` characters, appending an ellipsis marker when
/// anything was cut.
fn clip_marked(text: &str, limit: usize) -> String {
    if text.chars().count() > limit {
        format!("{}{}", clip(text, limit), ELLIPSIS)
    } else {
        text.to_string()
    }
}
