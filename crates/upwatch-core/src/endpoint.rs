use crate::condition::{Condition, ConditionError};
use crate::probe::ProbeClient;
use crate::result::ProbeResult;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;
use upwatch_alert::Alert;
use upwatch_common::context::SuiteContext;
use upwatch_common::key::convert_group_and_name_to_key;

/// Minimum interval for endpoints with a `[DOMAIN_EXPIRATION]` condition;
/// whois data is slow-moving and the upstream services must not be hammered.
const MINIMUM_DOMAIN_EXPIRATION_INTERVAL: Duration = Duration::from_secs(300);

#[derive(Debug, thiserror::Error)]
pub enum EndpointError {
    #[error("you must specify a name for each endpoint")]
    NoName,

    #[error("you must specify an url for each endpoint")]
    NoUrl,

    #[error("you must specify at least one condition per endpoint")]
    NoCondition,

    #[error("unknown endpoint type for url: {0}")]
    UnknownType(String),

    #[error(transparent)]
    InvalidCondition(#[from] ConditionError),

    #[error("invalid dns configuration: {0}")]
    InvalidDnsConfig(String),

    #[error("the minimum interval for an endpoint with a [DOMAIN_EXPIRATION] condition is 300s")]
    DomainExpirationIntervalTooShort,
}

/// The probe family an endpoint belongs to, derived from its target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndpointType {
    Http,
    Dns,
    Tcp,
    Udp,
    Icmp,
    StartTls,
    Tls,
    Grpc,
    Ssh,
    Sftp,
    Websocket,
    Unknown,
}

/// DNS probe configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct DnsConfig {
    pub query_type: String,
    pub query_name: String,
}

const SUPPORTED_DNS_QUERY_TYPES: &[&str] = &["A", "AAAA", "CNAME", "MX", "NS", "PTR", "SRV", "TXT"];

impl DnsConfig {
    fn validate_and_set_defaults(&mut self) -> Result<(), EndpointError> {
        if self.query_name.is_empty() {
            return Err(EndpointError::InvalidDnsConfig(
                "query-name must not be empty".to_string(),
            ));
        }
        if !self.query_name.ends_with('.') {
            self.query_name.push('.');
        }
        let query_type = self.query_type.to_uppercase();
        if !SUPPORTED_DNS_QUERY_TYPES.contains(&query_type.as_str()) {
            return Err(EndpointError::InvalidDnsConfig(format!(
                "unsupported query-type: {}",
                self.query_type
            )));
        }
        self.query_type = query_type;
        Ok(())
    }
}

/// SSH/SFTP probe credentials.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct SshConfig {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

/// A monitored target: its probe configuration, the conditions that define
/// health, and the alerts bound to it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Endpoint {
    /// Whether to monitor the endpoint. Defaults to enabled.
    #[serde(default)]
    pub enabled: Option<bool>,

    /// Name of the endpoint. Can be anything, but must be unique within its
    /// group.
    pub name: String,

    /// Group the endpoint is a part of. Empty for ungrouped endpoints.
    #[serde(default)]
    pub group: String,

    /// Target to probe; the scheme decides the probe type
    /// (`https://`, `tcp://`, `icmp://`, `grpc://`, ...).
    pub url: String,

    /// HTTP method, for HTTP probes.
    #[serde(default)]
    pub method: String,

    /// Request body, for probe types that send one.
    #[serde(default)]
    pub body: String,

    /// Request headers, for HTTP/websocket probes.
    #[serde(default)]
    pub headers: BTreeMap<String, String>,

    /// Time to wait between probes.
    #[serde(default = "default_interval")]
    pub interval: Duration,

    /// Conditions that must all pass for the endpoint to be healthy.
    #[serde(default)]
    pub conditions: Vec<Condition>,

    /// Alerting configuration, evaluated against the streak counters.
    #[serde(default)]
    pub alerts: Vec<Alert>,

    /// DNS probe configuration; its presence makes the endpoint a DNS probe.
    #[serde(default)]
    pub dns: Option<DnsConfig>,

    /// SSH/SFTP credentials.
    #[serde(default)]
    pub ssh: Option<SshConfig>,

    /// Consecutive failed evaluations, mutated on every probe.
    #[serde(skip)]
    pub number_of_failures_in_a_row: u32,

    /// Consecutive successful evaluations, mutated on every probe.
    #[serde(skip)]
    pub number_of_successes_in_a_row: u32,

    /// Values to extract from this endpoint's result into the suite
    /// context, as `context key -> placeholder`. Suite-only.
    #[serde(default)]
    pub store: BTreeMap<String, String>,

    /// Whether to execute this endpoint even after an earlier endpoint of
    /// the suite failed (cleanup semantics). Suite-only.
    #[serde(default)]
    pub always_run: bool,
}

fn default_interval() -> Duration {
    Duration::from_secs(60)
}

impl Endpoint {
    pub fn is_enabled(&self) -> bool {
        self.enabled.unwrap_or(true)
    }

    /// Unique key identifying the endpoint in storage and query APIs.
    pub fn key(&self) -> String {
        convert_group_and_name_to_key(&self.group, &self.name)
    }

    /// `group/name`, or just the name for ungrouped endpoints.
    pub fn display_name(&self) -> String {
        if self.group.is_empty() {
            self.name.clone()
        } else {
            format!("{}/{}", self.group, self.name)
        }
    }

    pub fn endpoint_type(&self) -> EndpointType {
        if self.dns.is_some() {
            return EndpointType::Dns;
        }
        let url = self.url.as_str();
        if url.starts_with("http://") || url.starts_with("https://") {
            EndpointType::Http
        } else if url.starts_with("tcp://") {
            EndpointType::Tcp
        } else if url.starts_with("udp://") {
            EndpointType::Udp
        } else if url.starts_with("icmp://") {
            EndpointType::Icmp
        } else if url.starts_with("starttls://") {
            EndpointType::StartTls
        } else if url.starts_with("tls://") {
            EndpointType::Tls
        } else if url.starts_with("grpc://") || url.starts_with("grpcs://") {
            EndpointType::Grpc
        } else if url.starts_with("ssh://") {
            EndpointType::Ssh
        } else if url.starts_with("sftp://") {
            EndpointType::Sftp
        } else if url.starts_with("ws://") || url.starts_with("wss://") {
            EndpointType::Websocket
        } else {
            EndpointType::Unknown
        }
    }

    /// Validates the configuration and fills in defaults. Called once at
    /// load time; a failure here keeps the endpoint out of the scheduler.
    pub fn validate_and_set_defaults(&mut self) -> Result<(), EndpointError> {
        if self.name.is_empty() {
            return Err(EndpointError::NoName);
        }
        if self.url.is_empty() {
            return Err(EndpointError::NoUrl);
        }
        if self.conditions.is_empty() {
            return Err(EndpointError::NoCondition);
        }
        if self.interval.is_zero() {
            self.interval = default_interval();
        }
        if self.method.is_empty() {
            self.method = "GET".to_string();
        }
        for condition in &self.conditions {
            if condition.has_domain_expiration_placeholder()
                && self.interval < MINIMUM_DOMAIN_EXPIRATION_INTERVAL
            {
                return Err(EndpointError::DomainExpirationIntervalTooShort);
            }
            condition.validate()?;
        }
        if let Some(dns) = &mut self.dns {
            dns.validate_and_set_defaults()?;
        }
        if self.endpoint_type() == EndpointType::Unknown {
            return Err(EndpointError::UnknownType(self.url.clone()));
        }
        Ok(())
    }

    /// Probes the endpoint through the collaborator and evaluates its
    /// conditions against the outcome.
    pub async fn evaluate_health(&self, probe: &dyn ProbeClient) -> ProbeResult {
        self.evaluate_health_with_context(probe, None).await
    }

    /// Like [`Endpoint::evaluate_health`], with suite context support:
    /// `[CONTEXT].path` placeholders in the url, body and header values are
    /// substituted before probing, and conditions may reference the context.
    pub async fn evaluate_health_with_context(
        &self,
        probe: &dyn ProbeClient,
        context: Option<&SuiteContext>,
    ) -> ProbeResult {
        let (endpoint, preprocess_errors) = match context {
            Some(ctx) => self.preprocess_with_context(ctx),
            None => (self.clone(), Vec::new()),
        };
        let mut result = if preprocess_errors.is_empty() {
            probe.probe(&endpoint).await
        } else {
            let mut result = ProbeResult::new();
            result.success = false;
            for error in preprocess_errors {
                result.add_error(error);
            }
            result
        };
        for condition in &endpoint.conditions {
            if !condition.evaluate(&mut result, context) {
                result.success = false;
            }
        }
        result.timestamp = Utc::now();
        result
    }

    /// Returns a copy of the endpoint with `[CONTEXT].path` placeholders in
    /// the url, body and header values replaced, plus any resolution errors.
    fn preprocess_with_context(&self, context: &SuiteContext) -> (Endpoint, Vec<String>) {
        let mut processed = self.clone();
        let mut errors = Vec::new();
        processed.url = replace_context_placeholders(&self.url, context, &mut errors);
        processed.body = replace_context_placeholders(&self.body, context, &mut errors);
        for (name, value) in &self.headers {
            processed
                .headers
                .insert(name.clone(), replace_context_placeholders(value, context, &mut errors));
        }
        (processed, errors)
    }

    /// Whether any condition or store mapping requires the response body.
    pub fn needs_to_read_body(&self) -> bool {
        self.conditions.iter().any(Condition::has_body_placeholder)
            || self
                .store
                .values()
                .any(|placeholder| placeholder.contains(crate::placeholder::BODY_PLACEHOLDER))
    }

    /// Whether any condition requires an IP lookup.
    pub fn needs_to_retrieve_ip(&self) -> bool {
        self.conditions.iter().any(Condition::has_ip_placeholder)
    }

    /// Whether any condition requires a whois query.
    pub fn needs_to_retrieve_domain_expiration(&self) -> bool {
        self.conditions
            .iter()
            .any(Condition::has_domain_expiration_placeholder)
    }
}

/// Replaces `[CONTEXT].path` occurrences in `input` with their context
/// values. Unresolvable paths are left in place and reported through
/// `errors` so the result records what went wrong.
fn replace_context_placeholders(
    input: &str,
    context: &SuiteContext,
    errors: &mut Vec<String>,
) -> String {
    const MARKER: &str = "[CONTEXT].";
    let mut output = String::with_capacity(input.len());
    let mut rest = input;
    while let Some(position) = rest.find(MARKER) {
        output.push_str(&rest[..position]);
        let after_marker = &rest[position + MARKER.len()..];
        let path_len = after_marker
            .find(|c: char| !c.is_alphanumeric() && c != '_' && c != '.' && c != '-')
            .unwrap_or(after_marker.len());
        let path = after_marker[..path_len].trim_end_matches('.');
        if path.is_empty() {
            output.push_str(MARKER);
            rest = after_marker;
            continue;
        }
        match context.get(path) {
            Ok(value) => output.push_str(&value.to_string()),
            Err(_) => {
                errors.push(format!("context placeholder resolution failed: path '{path}' not found"));
                output.push_str(&rest[position..position + MARKER.len() + path.len()]);
            }
        }
        rest = &after_marker[path.len()..];
    }
    output.push_str(rest);
    output
}
