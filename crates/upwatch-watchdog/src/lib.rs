//! Monitoring loops: one independent task per endpoint and per suite, each
//! running probe → evaluate → persist → alert at its configured interval.
//!
//! A failure anywhere in one iteration is logged and isolated; the loop
//! continues on the next scheduled tick, and no endpoint's failure ever
//! stops another endpoint's loop.

pub mod alerting;

#[cfg(test)]
mod tests;

use alerting::{handle_alerting, restore_triggered_alerts};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use upwatch_alert::ProviderRegistry;
use upwatch_core::{Endpoint, ProbeClient, Suite};
use upwatch_storage::Store;

/// Running monitoring tasks; dropping or shutting down aborts every loop.
pub struct Watchdog {
    tasks: Vec<JoinHandle<()>>,
}

impl Watchdog {
    /// Restores persisted alert state and starts one monitoring task per
    /// enabled endpoint and suite.
    ///
    /// With `serialize_evaluations`, a process-wide lock prevents endpoints
    /// from being evaluated at the same time, which keeps response-time
    /// conditions accurate on busy hosts.
    pub fn start(
        mut endpoints: Vec<Endpoint>,
        suites: Vec<Suite>,
        probe: Arc<dyn ProbeClient>,
        providers: Arc<ProviderRegistry>,
        store: Arc<dyn Store>,
        serialize_evaluations: bool,
    ) -> Watchdog {
        restore_triggered_alerts(&mut endpoints, store.as_ref());
        let lock = serialize_evaluations.then(|| Arc::new(tokio::sync::Mutex::new(())));
        let mut tasks = Vec::new();
        for endpoint in endpoints {
            if !endpoint.is_enabled() {
                continue;
            }
            tasks.push(tokio::spawn(monitor_endpoint(
                endpoint,
                probe.clone(),
                providers.clone(),
                store.clone(),
                lock.clone(),
            )));
        }
        for suite in suites {
            if !suite.is_enabled() {
                continue;
            }
            tasks.push(tokio::spawn(monitor_suite(
                suite,
                probe.clone(),
                providers.clone(),
                store.clone(),
            )));
        }
        Watchdog { tasks }
    }

    /// Stops monitoring all endpoints and suites.
    pub fn shutdown(self) {
        for task in self.tasks {
            task.abort();
        }
    }
}

/// Monitors a single endpoint in a loop: immediately on start, then at
/// every interval tick.
pub async fn monitor_endpoint(
    mut endpoint: Endpoint,
    probe: Arc<dyn ProbeClient>,
    providers: Arc<ProviderRegistry>,
    store: Arc<dyn Store>,
    lock: Option<Arc<tokio::sync::Mutex<()>>>,
) {
    let mut interval = tokio::time::interval(endpoint.interval);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        interval.tick().await;
        execute_endpoint(
            &mut endpoint,
            probe.as_ref(),
            providers.as_ref(),
            store.as_ref(),
            lock.as_deref(),
        )
        .await;
    }
}

/// One monitoring iteration: probe, evaluate, persist, alert.
pub async fn execute_endpoint(
    endpoint: &mut Endpoint,
    probe: &dyn ProbeClient,
    providers: &ProviderRegistry,
    store: &dyn Store,
    lock: Option<&tokio::sync::Mutex<()>>,
) {
    let _guard = match lock {
        Some(lock) => Some(lock.lock().await),
        None => None,
    };
    tracing::debug!(key = %endpoint.key(), "Monitoring endpoint");
    let result = endpoint.evaluate_health(probe).await;
    tracing::info!(
        key = %endpoint.key(),
        success = result.success,
        errors = result.errors.len(),
        duration_ms = result.duration.as_millis() as u64,
        "Monitored endpoint"
    );
    if let Err(e) = store.insert_endpoint_result(endpoint, &result) {
        tracing::error!(key = %endpoint.key(), error = %e, "Failed to insert result in storage");
    }
    handle_alerting(endpoint, &result, providers, store).await;
}

/// Monitors a suite in a loop: immediately on start, then at every
/// interval tick.
pub async fn monitor_suite(
    mut suite: Suite,
    probe: Arc<dyn ProbeClient>,
    providers: Arc<ProviderRegistry>,
    store: Arc<dyn Store>,
) {
    let mut interval = tokio::time::interval(suite.interval);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        interval.tick().await;
        execute_suite(&mut suite, probe.as_ref(), providers.as_ref(), store.as_ref()).await;
    }
}

/// One suite iteration: sequential execution, persistence, then alerting
/// for every endpoint that produced a result.
pub async fn execute_suite(
    suite: &mut Suite,
    probe: &dyn ProbeClient,
    providers: &ProviderRegistry,
    store: &dyn Store,
) {
    tracing::debug!(key = %suite.key(), "Monitoring suite");
    let result = suite.execute(probe).await;
    tracing::info!(
        key = %suite.key(),
        success = result.success,
        errors = result.errors.len(),
        duration_ms = result.duration.as_millis() as u64,
        endpoints_executed = result.endpoint_results.len(),
        total_endpoints = suite.endpoints.len(),
        "Completed suite execution"
    );
    if let Err(e) = store.insert_suite_result(suite, &result) {
        tracing::error!(key = %suite.key(), error = %e, "Failed to insert suite result in storage");
    }
    // Skipped endpoints leave no result, so pair by name instead of index.
    for endpoint_result in &result.endpoint_results {
        if let Some(endpoint) = suite
            .endpoints
            .iter_mut()
            .find(|endpoint| endpoint.name == endpoint_result.name)
        {
            handle_alerting(endpoint, endpoint_result, providers, store).await;
        }
    }
}
