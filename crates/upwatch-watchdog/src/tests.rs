use crate::alerting::{handle_alerting, restore_triggered_alerts};
use crate::{execute_endpoint, execute_suite};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use upwatch_alert::{Alert, AlertProvider, AlertType, ProviderRegistry};
use upwatch_core::{Condition, Endpoint, ProbeClient, ProbeResult, Suite};
use upwatch_storage::{PagingParams, SqlStore, Store};

#[derive(Debug, Clone)]
struct SendRecord {
    service: String,
    resolved: bool,
    resolve_key: Option<String>,
}

#[derive(Clone, Default)]
struct ProviderState {
    sends: Arc<Mutex<Vec<SendRecord>>>,
    attempts: Arc<AtomicUsize>,
    failing: Arc<AtomicBool>,
}

impl ProviderState {
    fn sends(&self) -> Vec<SendRecord> {
        self.sends.lock().unwrap().clone()
    }

    fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

struct RecordingProvider {
    alert_type: AlertType,
    state: ProviderState,
    dedup_key: Option<String>,
}

#[async_trait]
impl AlertProvider for RecordingProvider {
    async fn send(
        &self,
        service_name: &str,
        _description: &str,
        resolved: bool,
        resolve_key: Option<&str>,
    ) -> anyhow::Result<Vec<u8>> {
        self.state.attempts.fetch_add(1, Ordering::SeqCst);
        if self.state.failing.load(Ordering::SeqCst) {
            anyhow::bail!("provider unreachable");
        }
        self.state.sends.lock().unwrap().push(SendRecord {
            service: service_name.to_string(),
            resolved,
            resolve_key: resolve_key.map(str::to_string),
        });
        Ok(b"{}".to_vec())
    }

    fn alert_type(&self) -> AlertType {
        self.alert_type
    }

    fn resolve_key_from_response(&self, _body: &[u8]) -> Option<String> {
        self.dedup_key.clone()
    }
}

fn registry_with_provider(dedup_key: Option<&str>) -> (ProviderRegistry, ProviderState) {
    let state = ProviderState::default();
    let mut registry = ProviderRegistry::new();
    registry.register(Box::new(RecordingProvider {
        alert_type: AlertType::Webhook,
        state: state.clone(),
        dedup_key: dedup_key.map(str::to_string),
    }));
    (registry, state)
}

fn temp_store() -> (TempDir, SqlStore) {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("data.db");
    let store = SqlStore::new(path.to_str().unwrap(), false).unwrap();
    (dir, store)
}

fn make_endpoint(alerts: Vec<Alert>) -> Endpoint {
    let mut endpoint: Endpoint = serde_json::from_value(serde_json::json!({
        "name": "app",
        "group": "core",
        "url": "https://example.org",
    }))
    .unwrap();
    endpoint.conditions = vec![Condition::from("[STATUS] == 200")];
    endpoint.alerts = alerts;
    endpoint
}

fn make_alert(failure_threshold: u32, success_threshold: u32, send_on_resolved: bool) -> Alert {
    let mut alert = Alert::new(AlertType::Webhook);
    alert.failure_threshold = failure_threshold;
    alert.success_threshold = success_threshold;
    alert.send_on_resolved = Some(send_on_resolved);
    alert.description = Some("healthcheck failed".to_string());
    alert
}

fn make_result(success: bool) -> ProbeResult {
    let mut result = ProbeResult::new();
    result.success = success;
    result.http_status = if success { 200 } else { 500 };
    result.timestamp = Utc::now();
    result
}

#[tokio::test]
async fn edge_triggered_alert_fires_exactly_once() {
    let (_dir, store) = temp_store();
    let (registry, state) = registry_with_provider(None);
    let mut endpoint = make_endpoint(vec![make_alert(3, 2, false)]);

    for iteration in 1..=5u32 {
        handle_alerting(&mut endpoint, &make_result(false), &registry, &store).await;
        let expected = usize::from(iteration >= 3);
        assert_eq!(
            state.sends().len(),
            expected,
            "after {iteration} failures, {expected} notification(s) expected"
        );
    }
    assert!(endpoint.alerts[0].triggered);
    assert_eq!(endpoint.number_of_failures_in_a_row, 5);
    assert_eq!(state.sends()[0].service, "core/app");
    assert!(!state.sends()[0].resolved);
}

#[tokio::test]
async fn failed_dispatch_leaves_the_alert_untriggered_and_is_not_retried() {
    let (_dir, store) = temp_store();
    let (registry, state) = registry_with_provider(None);
    state.failing.store(true, Ordering::SeqCst);
    let mut endpoint = make_endpoint(vec![make_alert(3, 2, false)]);

    for _ in 0..5 {
        handle_alerting(&mut endpoint, &make_result(false), &registry, &store).await;
    }
    // Only the tick at which the streak matched the threshold attempted a
    // dispatch; later failures do not re-match.
    assert_eq!(state.attempts(), 1);
    assert!(!endpoint.alerts[0].triggered);
}

#[tokio::test]
async fn alert_resolves_exactly_on_the_nth_success() {
    let (_dir, store) = temp_store();
    let (registry, state) = registry_with_provider(None);
    let mut endpoint = make_endpoint(vec![make_alert(1, 3, true)]);

    handle_alerting(&mut endpoint, &make_result(false), &registry, &store).await;
    assert!(endpoint.alerts[0].triggered);

    for successes in 1..=2u32 {
        handle_alerting(&mut endpoint, &make_result(true), &registry, &store).await;
        assert!(
            endpoint.alerts[0].triggered,
            "still triggered after {successes} success(es)"
        );
    }
    handle_alerting(&mut endpoint, &make_result(true), &registry, &store).await;
    assert!(!endpoint.alerts[0].triggered);
    let sends = state.sends();
    assert_eq!(sends.len(), 2);
    assert!(sends[1].resolved);
}

#[tokio::test]
async fn resolve_notification_is_skipped_without_send_on_resolved() {
    let (_dir, store) = temp_store();
    let (registry, state) = registry_with_provider(None);
    let mut endpoint = make_endpoint(vec![make_alert(1, 1, false)]);

    handle_alerting(&mut endpoint, &make_result(false), &registry, &store).await;
    handle_alerting(&mut endpoint, &make_result(true), &registry, &store).await;
    assert!(!endpoint.alerts[0].triggered);
    let sends = state.sends();
    assert_eq!(sends.len(), 1);
    assert!(!sends[0].resolved);
}

#[tokio::test]
async fn disabled_alerts_never_dispatch() {
    let (_dir, store) = temp_store();
    let (registry, state) = registry_with_provider(None);
    let mut alert = make_alert(1, 1, true);
    alert.enabled = Some(false);
    let mut endpoint = make_endpoint(vec![alert]);

    for _ in 0..3 {
        handle_alerting(&mut endpoint, &make_result(false), &registry, &store).await;
    }
    assert_eq!(state.attempts(), 0);
}

#[tokio::test]
async fn provider_resolve_key_is_round_tripped() {
    let (_dir, store) = temp_store();
    let (registry, state) = registry_with_provider(Some("dedup-42"));
    let mut endpoint = make_endpoint(vec![make_alert(1, 1, true)]);

    handle_alerting(&mut endpoint, &make_result(false), &registry, &store).await;
    assert_eq!(endpoint.alerts[0].resolve_key.as_deref(), Some("dedup-42"));
    let persisted = store
        .get_triggered_endpoint_alert(&endpoint, &endpoint.alerts[0])
        .unwrap()
        .unwrap();
    assert_eq!(persisted.resolve_key.as_deref(), Some("dedup-42"));

    handle_alerting(&mut endpoint, &make_result(true), &registry, &store).await;
    let sends = state.sends();
    assert_eq!(sends[1].resolve_key.as_deref(), Some("dedup-42"));
    assert!(endpoint.alerts[0].resolve_key.is_none());
}

#[tokio::test]
async fn trigger_state_is_mirrored_to_storage() {
    let (_dir, store) = temp_store();
    let (registry, _state) = registry_with_provider(None);
    let mut endpoint = make_endpoint(vec![make_alert(1, 1, false)]);

    handle_alerting(&mut endpoint, &make_result(false), &registry, &store).await;
    assert!(store
        .get_triggered_endpoint_alert(&endpoint, &endpoint.alerts[0])
        .unwrap()
        .is_some());

    handle_alerting(&mut endpoint, &make_result(true), &registry, &store).await;
    assert!(store
        .get_triggered_endpoint_alert(&endpoint, &endpoint.alerts[0])
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn restore_recovers_trigger_state_and_purges_stale_checksums() {
    let (_dir, store) = temp_store();
    let (registry, _state) = registry_with_provider(Some("dedup-9"));
    let mut endpoint = make_endpoint(vec![make_alert(1, 3, true)]);
    handle_alerting(&mut endpoint, &make_result(false), &registry, &store).await;
    handle_alerting(&mut endpoint, &make_result(true), &registry, &store).await;
    let old_alert = endpoint.alerts[0].clone();
    assert!(old_alert.triggered);

    // Simulate a restart with the same configuration.
    let mut restarted = vec![make_endpoint(vec![make_alert(1, 3, true)])];
    restore_triggered_alerts(&mut restarted, &store);
    assert!(restarted[0].alerts[0].triggered);
    assert_eq!(restarted[0].alerts[0].resolve_key.as_deref(), Some("dedup-9"));
    assert_eq!(restarted[0].number_of_successes_in_a_row, 1);

    // A restart with a modified alert configuration purges the old state.
    let mut reconfigured = vec![make_endpoint(vec![make_alert(5, 3, true)])];
    restore_triggered_alerts(&mut reconfigured, &store);
    assert!(!reconfigured[0].alerts[0].triggered);
    assert!(store
        .get_triggered_endpoint_alert(&reconfigured[0], &old_alert)
        .unwrap()
        .is_none());
}

struct FixedStatusProbe {
    status: u16,
}

#[async_trait]
impl ProbeClient for FixedStatusProbe {
    async fn probe(&self, _endpoint: &Endpoint) -> ProbeResult {
        let mut result = ProbeResult::new();
        result.http_status = self.status;
        result.connected = true;
        result.duration = Duration::from_millis(10);
        result
    }
}

#[tokio::test]
async fn execute_endpoint_persists_and_alerts() {
    let (_dir, store) = temp_store();
    let (registry, state) = registry_with_provider(None);
    let mut endpoint = make_endpoint(vec![make_alert(1, 1, false)]);
    let probe = FixedStatusProbe { status: 500 };

    for _ in 0..2 {
        execute_endpoint(&mut endpoint, &probe, &registry, &store, None).await;
    }
    let status = store
        .get_endpoint_status_by_key(
            "core_app",
            &PagingParams::default().with_results(1, 20),
        )
        .unwrap();
    assert_eq!(status.results.len(), 2);
    assert!(!status.results[0].success);
    assert_eq!(state.sends().len(), 1);
}

struct PerEndpointProbe {
    statuses: BTreeMap<String, u16>,
}

#[async_trait]
impl ProbeClient for PerEndpointProbe {
    async fn probe(&self, endpoint: &Endpoint) -> ProbeResult {
        let mut result = ProbeResult::new();
        result.http_status = self.statuses.get(&endpoint.name).copied().unwrap_or(200);
        result.connected = true;
        result.duration = Duration::from_millis(10);
        result
    }
}

#[tokio::test]
async fn execute_suite_persists_and_alerts_per_endpoint() {
    let (_dir, store) = temp_store();
    let (registry, state) = registry_with_provider(None);
    let mut login = make_endpoint(vec![]);
    login.name = "login".to_string();
    let mut fetch = make_endpoint(vec![make_alert(1, 1, false)]);
    fetch.name = "fetch".to_string();
    let mut suite = Suite {
        name: "user-flow".to_string(),
        group: "core".to_string(),
        enabled: None,
        interval: Duration::from_secs(600),
        timeout: Duration::from_secs(300),
        initial_context: BTreeMap::new(),
        endpoints: vec![login, fetch],
    };
    suite.validate_and_set_defaults().unwrap();
    let probe = PerEndpointProbe {
        statuses: BTreeMap::from([("login".to_string(), 200), ("fetch".to_string(), 500)]),
    };

    execute_suite(&mut suite, &probe, &registry, &store).await;
    let status = store
        .get_suite_status_by_key(
            "core_user-flow",
            &PagingParams::default().with_results(1, 20),
        )
        .unwrap();
    assert_eq!(status.results.len(), 1);
    assert!(!status.results[0].success);
    assert_eq!(status.results[0].endpoint_results.len(), 2);
    // The failing endpoint's alert fired through the suite path.
    assert_eq!(state.sends().len(), 1);
    assert_eq!(state.sends()[0].service, "core/fetch");
    assert_eq!(suite.endpoints[1].number_of_failures_in_a_row, 1);
}
