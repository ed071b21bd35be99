use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// The outcome of a single condition evaluation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConditionResult {
    /// The condition, annotated with resolved values for display.
    pub condition: String,

    /// Whether the condition passed.
    pub success: bool,
}

/// The outcome of one endpoint probe, including condition outcomes.
///
/// Created fresh for every probe and immutable once evaluation completes;
/// the alerting state machine and the storage engine both consume it, after
/// which only derived/aggregated forms persist.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProbeResult {
    /// HTTP response status code, or command exit status for SSH probes.
    pub http_status: u16,

    /// DNS response code in human-readable form (NOERROR, NXDOMAIN, ...).
    pub dns_rcode: String,

    /// Hostname extracted from the endpoint target.
    pub hostname: String,

    /// IP the endpoint target resolved to.
    pub ip: String,

    /// Whether a connection to the host was established successfully.
    pub connected: bool,

    /// How long the probe took.
    pub duration: Duration,

    /// Errors encountered while evaluating the endpoint's health.
    pub errors: Vec<String>,

    /// Outcome of each of the endpoint's conditions, in declaration order.
    pub condition_results: Vec<ConditionResult>,

    /// Whether every condition passed.
    pub success: bool,

    /// When the probe was performed.
    pub timestamp: DateTime<Utc>,

    /// Time left before the certificate expires; zero when unknown.
    pub certificate_expiration: Duration,

    /// Time left before the domain expires; zero when unknown.
    pub domain_expiration: Duration,

    /// Response body. Used for evaluation only, never persisted.
    #[serde(skip)]
    pub body: Vec<u8>,

    /// Endpoint name; only set for results produced inside a suite.
    pub name: String,
}

impl ProbeResult {
    /// A result primed for evaluation: success starts true and is ANDed
    /// down by condition evaluation.
    pub fn new() -> Self {
        Self {
            success: true,
            ..Self::default()
        }
    }

    /// Adds an error to the result unless an identical one is already
    /// recorded.
    pub fn add_error(&mut self, error: impl Into<String>) {
        let error = error.into();
        if !self.errors.iter().any(|e| e == &error) {
            self.errors.push(error);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_error_deduplicates() {
        let mut result = ProbeResult::new();
        result.add_error("connection refused");
        result.add_error("connection refused");
        result.add_error("timeout");
        assert_eq!(result.errors, vec!["connection refused", "timeout"]);
    }
}
