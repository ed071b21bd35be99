use crate::endpoint::{Endpoint, EndpointError};
use crate::placeholder::{resolve_placeholder, INVALID_CONDITION_ELEMENT_SUFFIX};
use crate::probe::ProbeClient;
use crate::result::ProbeResult;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;
use tokio::time::Instant;
use upwatch_common::context::{ContextValue, SuiteContext};
use upwatch_common::key::convert_group_and_name_to_key;

/// Default time between suite executions.
pub const DEFAULT_SUITE_INTERVAL: Duration = Duration::from_secs(600);

/// Default wall-clock budget for one entire suite execution.
pub const DEFAULT_SUITE_TIMEOUT: Duration = Duration::from_secs(300);

#[derive(Debug, thiserror::Error)]
pub enum SuiteError {
    #[error("suite must have a name")]
    NoName,

    #[error("suite must have at least one endpoint")]
    NoEndpoints,

    #[error("suite cannot have duplicate endpoint names: {0}")]
    DuplicateEndpointName(String),

    #[error("invalid endpoint '{name}': {source}")]
    InvalidEndpoint {
        name: String,
        #[source]
        source: EndpointError,
    },
}

/// An ordered group of endpoints executed sequentially with a shared
/// context.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Suite {
    /// Name of the suite. Must be unique.
    pub name: String,

    /// Group the suite belongs to.
    #[serde(default)]
    pub group: String,

    /// Whether the suite is executed. Defaults to enabled.
    #[serde(default)]
    pub enabled: Option<bool>,

    /// Time to wait between suite executions.
    #[serde(default = "default_suite_interval")]
    pub interval: Duration,

    /// Wall-clock budget for one entire sequential run; endpoints not
    /// started before it elapses are skipped.
    #[serde(default = "default_suite_timeout")]
    pub timeout: Duration,

    /// Values seeding the shared context before the first endpoint runs.
    #[serde(default, rename = "context")]
    pub initial_context: BTreeMap<String, ContextValue>,

    /// Endpoints executed sequentially, in declaration order.
    pub endpoints: Vec<Endpoint>,
}

fn default_suite_interval() -> Duration {
    DEFAULT_SUITE_INTERVAL
}

fn default_suite_timeout() -> Duration {
    DEFAULT_SUITE_TIMEOUT
}

/// The outcome of one suite execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuiteResult {
    pub name: String,
    pub group: String,
    pub success: bool,
    pub timestamp: DateTime<Utc>,
    pub duration: Duration,
    /// One entry per executed endpoint; skipped endpoints leave no entry.
    pub endpoint_results: Vec<ProbeResult>,
    /// Final state of the shared context after the run.
    pub context: BTreeMap<String, ContextValue>,
    /// Suite-level errors (timeout), independent of endpoint outcomes.
    pub errors: Vec<String>,
}

impl SuiteResult {
    fn new(name: &str, group: &str) -> Self {
        Self {
            name: name.to_string(),
            group: group.to_string(),
            success: true,
            timestamp: Utc::now(),
            duration: Duration::ZERO,
            endpoint_results: Vec::new(),
            context: BTreeMap::new(),
            errors: Vec::new(),
        }
    }

    pub fn add_error(&mut self, error: impl Into<String>) {
        self.errors.push(error.into());
    }

    /// Success is the AND of every executed endpoint's success, and the
    /// absence of suite-level errors.
    pub fn calculate_success(&mut self) {
        self.success = self.endpoint_results.iter().all(|r| r.success) && self.errors.is_empty();
    }
}

impl Suite {
    pub fn is_enabled(&self) -> bool {
        self.enabled.unwrap_or(true)
    }

    /// Unique key identifying the suite in storage and query APIs.
    pub fn key(&self) -> String {
        convert_group_and_name_to_key(&self.group, &self.name)
    }

    /// Validates the suite configuration and its endpoints, which inherit
    /// the suite's group.
    pub fn validate_and_set_defaults(&mut self) -> Result<(), SuiteError> {
        if self.name.is_empty() {
            return Err(SuiteError::NoName);
        }
        if self.endpoints.is_empty() {
            return Err(SuiteError::NoEndpoints);
        }
        if self.interval.is_zero() {
            self.interval = DEFAULT_SUITE_INTERVAL;
        }
        if self.timeout.is_zero() {
            self.timeout = DEFAULT_SUITE_TIMEOUT;
        }
        let mut names = std::collections::BTreeSet::new();
        for endpoint in &mut self.endpoints {
            if !names.insert(endpoint.name.clone()) {
                return Err(SuiteError::DuplicateEndpointName(endpoint.name.clone()));
            }
            endpoint.group = self.group.clone();
            endpoint
                .validate_and_set_defaults()
                .map_err(|source| SuiteError::InvalidEndpoint {
                    name: endpoint.name.clone(),
                    source,
                })?;
        }
        Ok(())
    }

    /// Executes all endpoints sequentially with context sharing.
    ///
    /// Once a non-`always_run` endpoint fails, subsequent endpoints are
    /// skipped unless they are marked `always_run` (cleanup semantics).
    /// The run as a whole is bounded by [`Suite::timeout`]; endpoints cut
    /// off by it record a suite error and are not retried.
    pub async fn execute(&self, probe: &dyn ProbeClient) -> SuiteResult {
        let started = Instant::now();
        let context = SuiteContext::new(self.initial_context.clone());
        let mut result = SuiteResult::new(&self.name, &self.group);
        let mut suite_has_failed = false;
        for endpoint in &self.endpoints {
            if suite_has_failed && !endpoint.always_run {
                continue;
            }
            let Some(remaining) = self.timeout.checked_sub(started.elapsed()) else {
                result.add_error(format!(
                    "suite execution timed out after {}s",
                    self.timeout.as_secs()
                ));
                break;
            };
            let endpoint_started = Instant::now();
            let endpoint_started_at = Utc::now();
            let mut endpoint_result = match tokio::time::timeout(
                remaining,
                endpoint.evaluate_health_with_context(probe, Some(&context)),
            )
            .await
            {
                Ok(endpoint_result) => endpoint_result,
                Err(_) => {
                    result.add_error(format!(
                        "suite execution timed out after {}s",
                        self.timeout.as_secs()
                    ));
                    break;
                }
            };
            endpoint_result.name = endpoint.name.clone();
            endpoint_result.timestamp = endpoint_started_at;
            endpoint_result.duration = endpoint_started.elapsed();
            // Stores run for every executed endpoint, success or not, and a
            // failing key must not keep the remaining keys from landing.
            if !endpoint.store.is_empty() {
                if let Err(error) = store_result_values(&context, &endpoint.store, &endpoint_result)
                {
                    endpoint_result.add_error(format!("failed to store values: {error}"));
                }
            }
            if !endpoint_result.success {
                suite_has_failed = true;
            }
            result.endpoint_results.push(endpoint_result);
        }
        result.context = context.snapshot();
        result.duration = started.elapsed();
        result.calculate_success();
        result
    }
}

/// Extracts values from an endpoint result into the suite context.
///
/// Every mapping is attempted; failures are collected and returned as one
/// error naming the keys that could not be extracted.
pub fn store_result_values(
    context: &SuiteContext,
    mappings: &BTreeMap<String, String>,
    result: &ProbeResult,
) -> Result<(), String> {
    let mut extraction_errors = Vec::new();
    for (context_key, placeholder) in mappings {
        let resolved = resolve_placeholder(placeholder, result, None);
        if resolved.ends_with(&format!(" {INVALID_CONDITION_ELEMENT_SUFFIX}")) {
            extraction_errors.push(format!("{context_key}: invalid path: {placeholder}"));
            continue;
        }
        if let Err(error) = context.set(context_key, ContextValue::parse(&resolved)) {
            extraction_errors.push(format!("{context_key}: {error}"));
        }
    }
    if extraction_errors.is_empty() {
        Ok(())
    } else {
        Err(format!(
            "failed to extract values: {}",
            extraction_errors.join("; ")
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::condition::Condition;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Probe stub that returns scripted bodies/statuses per endpoint name
    /// and records the order endpoints were probed in.
    struct ScriptedProbe {
        responses: BTreeMap<String, (u16, &'static [u8])>,
        probed: Mutex<Vec<String>>,
    }

    impl ScriptedProbe {
        fn new() -> Self {
            Self {
                responses: BTreeMap::new(),
                probed: Mutex::new(Vec::new()),
            }
        }

        fn respond(mut self, endpoint_name: &str, status: u16, body: &'static [u8]) -> Self {
            self.responses
                .insert(endpoint_name.to_string(), (status, body));
            self
        }

        fn probed_names(&self) -> Vec<String> {
            self.probed.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ProbeClient for ScriptedProbe {
        async fn probe(&self, endpoint: &Endpoint) -> ProbeResult {
            self.probed.lock().unwrap().push(endpoint.name.clone());
            let mut result = ProbeResult::new();
            if let Some((status, body)) = self.responses.get(&endpoint.name) {
                result.http_status = *status;
                result.connected = true;
                result.body = body.to_vec();
            }
            result
        }
    }

    fn suite_endpoint(name: &str, conditions: &[&str]) -> Endpoint {
        let mut endpoint: Endpoint = serde_json::from_value(serde_json::json!({
            "name": name,
            "url": format!("https://example.org/{name}"),
        }))
        .unwrap();
        endpoint.conditions = conditions.iter().map(|c| Condition::from(*c)).collect();
        endpoint
    }

    fn three_endpoint_suite(always_run_last: bool) -> Suite {
        let mut suite = Suite {
            name: "user-flow".to_string(),
            group: "core".to_string(),
            enabled: None,
            interval: DEFAULT_SUITE_INTERVAL,
            timeout: DEFAULT_SUITE_TIMEOUT,
            initial_context: BTreeMap::new(),
            endpoints: vec![
                suite_endpoint("login", &["[STATUS] == 200"]),
                suite_endpoint("fetch", &["[STATUS] == 200"]),
                suite_endpoint("logout", &["[STATUS] == 200"]),
            ],
        };
        suite.endpoints[2].always_run = always_run_last;
        suite.validate_and_set_defaults().unwrap();
        suite
    }

    #[tokio::test]
    async fn all_endpoints_execute_when_healthy() {
        let probe = ScriptedProbe::new()
            .respond("login", 200, b"{}")
            .respond("fetch", 200, b"{}")
            .respond("logout", 200, b"{}");
        let suite = three_endpoint_suite(false);
        let result = suite.execute(&probe).await;
        assert!(result.success);
        assert_eq!(result.endpoint_results.len(), 3);
    }

    #[tokio::test]
    async fn failure_skips_subsequent_endpoints_without_always_run() {
        let probe = ScriptedProbe::new()
            .respond("login", 200, b"{}")
            .respond("fetch", 500, b"{}")
            .respond("logout", 200, b"{}");
        let suite = three_endpoint_suite(false);
        let result = suite.execute(&probe).await;
        assert!(!result.success);
        assert_eq!(result.endpoint_results.len(), 2);
        assert_eq!(probe.probed_names(), vec!["login", "fetch"]);
    }

    #[tokio::test]
    async fn always_run_endpoints_execute_after_a_failure() {
        let probe = ScriptedProbe::new()
            .respond("login", 200, b"{}")
            .respond("fetch", 500, b"{}")
            .respond("logout", 200, b"{}");
        let suite = three_endpoint_suite(true);
        let result = suite.execute(&probe).await;
        assert!(!result.success);
        assert_eq!(result.endpoint_results.len(), 3);
        assert_eq!(probe.probed_names(), vec!["login", "fetch", "logout"]);
    }

    #[tokio::test]
    async fn stored_values_round_trip_into_later_conditions() {
        let probe = ScriptedProbe::new()
            .respond("login", 200, br#"{"user": {"id": 42}}"#)
            .respond("fetch", 200, b"{}");
        let mut suite = Suite {
            name: "store-flow".to_string(),
            group: String::new(),
            enabled: None,
            interval: DEFAULT_SUITE_INTERVAL,
            timeout: DEFAULT_SUITE_TIMEOUT,
            initial_context: BTreeMap::new(),
            endpoints: vec![
                suite_endpoint("login", &["[STATUS] == 200"]),
                suite_endpoint("fetch", &["[CONTEXT].user_id == 42"]),
            ],
        };
        suite.endpoints[0]
            .store
            .insert("user_id".to_string(), "[BODY].user.id".to_string());
        suite.validate_and_set_defaults().unwrap();
        let result = suite.execute(&probe).await;
        assert!(result.success, "errors: {:?}", result.endpoint_results);
        // The stored value was type-coerced, not kept as a string.
        assert_eq!(result.context.get("user_id"), Some(&ContextValue::Int(42)));
    }

    #[tokio::test]
    async fn one_invalid_store_key_does_not_lose_the_valid_one() {
        let probe = ScriptedProbe::new().respond("login", 200, br#"{"token": "t-1"}"#);
        let mut suite = Suite {
            name: "partial-store".to_string(),
            group: String::new(),
            enabled: None,
            interval: DEFAULT_SUITE_INTERVAL,
            timeout: DEFAULT_SUITE_TIMEOUT,
            initial_context: BTreeMap::new(),
            endpoints: vec![suite_endpoint("login", &["[STATUS] == 200"])],
        };
        suite.endpoints[0]
            .store
            .insert("token".to_string(), "[BODY].token".to_string());
        suite.endpoints[0]
            .store
            .insert("missing".to_string(), "[BODY].does.not.exist".to_string());
        suite.validate_and_set_defaults().unwrap();
        let result = suite.execute(&probe).await;
        assert_eq!(
            result.context.get("token"),
            Some(&ContextValue::String("t-1".to_string()))
        );
        assert!(result.context.get("missing").is_none());
        let errors = &result.endpoint_results[0].errors;
        assert!(
            errors.iter().any(|e| e.contains("missing")),
            "expected an error naming the invalid key, got {errors:?}"
        );
    }

    #[tokio::test]
    async fn store_runs_even_when_the_endpoint_fails() {
        let probe = ScriptedProbe::new().respond("login", 500, br#"{"reason": "maintenance"}"#);
        let mut suite = Suite {
            name: "store-on-failure".to_string(),
            group: String::new(),
            enabled: None,
            interval: DEFAULT_SUITE_INTERVAL,
            timeout: DEFAULT_SUITE_TIMEOUT,
            initial_context: BTreeMap::new(),
            endpoints: vec![suite_endpoint("login", &["[STATUS] == 200"])],
        };
        suite.endpoints[0]
            .store
            .insert("reason".to_string(), "[BODY].reason".to_string());
        suite.validate_and_set_defaults().unwrap();
        let result = suite.execute(&probe).await;
        assert!(!result.success);
        assert_eq!(
            result.context.get("reason"),
            Some(&ContextValue::String("maintenance".to_string()))
        );
    }

    #[tokio::test]
    async fn timeout_records_a_suite_error_and_skips_the_rest() {
        struct SlowProbe;

        #[async_trait]
        impl ProbeClient for SlowProbe {
            async fn probe(&self, _endpoint: &Endpoint) -> ProbeResult {
                tokio::time::sleep(Duration::from_secs(30)).await;
                ProbeResult::new()
            }
        }

        let mut suite = three_endpoint_suite(false);
        suite.timeout = Duration::from_millis(50);
        let result = suite.execute(&SlowProbe).await;
        assert!(!result.success);
        assert!(result.errors.iter().any(|e| e.contains("timed out")));
        assert!(result.endpoint_results.is_empty());
    }

    #[test]
    fn validation_rejects_duplicate_endpoint_names() {
        let mut suite = Suite {
            name: "dups".to_string(),
            group: String::new(),
            enabled: None,
            interval: DEFAULT_SUITE_INTERVAL,
            timeout: DEFAULT_SUITE_TIMEOUT,
            initial_context: BTreeMap::new(),
            endpoints: vec![
                suite_endpoint("same", &["[STATUS] == 200"]),
                suite_endpoint("same", &["[STATUS] == 200"]),
            ],
        };
        assert!(matches!(
            suite.validate_and_set_defaults(),
            Err(SuiteError::DuplicateEndpointName(_))
        ));
    }

    #[test]
    fn endpoints_inherit_the_suite_group() {
        let suite = three_endpoint_suite(false);
        for endpoint in &suite.endpoints {
            assert_eq!(endpoint.group, "core");
        }
    }
}
