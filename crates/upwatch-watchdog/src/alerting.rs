//! Alerting state machine: decides when the streak counters trigger or
//! resolve an endpoint's alerts and dispatches the notifications.

use upwatch_alert::ProviderRegistry;
use upwatch_core::{Endpoint, ProbeResult};
use upwatch_storage::Store;

/// Takes care of alerts to trigger or resolve based on the result of an
/// endpoint's evaluation. Mutates the endpoint's streak counters and its
/// alerts' runtime state in place.
///
/// Provider dispatch failures are logged and never propagate: the next
/// evaluation cycle is the retry opportunity, within the bounds of the
/// edge-triggered threshold semantics.
pub async fn handle_alerting(
    endpoint: &mut Endpoint,
    result: &ProbeResult,
    providers: &ProviderRegistry,
    store: &dyn Store,
) {
    if result.success {
        handle_alerts_to_resolve(endpoint, providers, store).await;
    } else {
        handle_alerts_to_trigger(endpoint, providers, store).await;
    }
}

async fn handle_alerts_to_trigger(
    endpoint: &mut Endpoint,
    providers: &ProviderRegistry,
    store: &dyn Store,
) {
    endpoint.number_of_successes_in_a_row = 0;
    endpoint.number_of_failures_in_a_row += 1;
    let service_name = endpoint.display_name();
    let failures_in_a_row = endpoint.number_of_failures_in_a_row;
    for index in 0..endpoint.alerts.len() {
        let alert = &endpoint.alerts[index];
        // Edge-triggered: only the evaluation at which the streak reaches
        // the threshold exactly may fire, so an alert never re-notifies on
        // every subsequent failure.
        if !alert.is_enabled() || alert.failure_threshold != failures_in_a_row {
            continue;
        }
        if alert.triggered {
            tracing::debug!(
                key = %endpoint.key(),
                description = alert.description(),
                "Alert has already been triggered, skipping"
            );
            continue;
        }
        let alert_type = alert.alert_type;
        let description = alert.description().to_string();
        let Some(provider) = providers.get(alert_type) else {
            tracing::warn!(
                key = %endpoint.key(),
                alert_type = %alert_type,
                "Not sending alert despite being triggered, because its provider is not configured"
            );
            continue;
        };
        tracing::info!(
            key = %endpoint.key(),
            alert_type = %alert_type,
            description = %description,
            "Sending alert because it has been triggered"
        );
        match provider.send(&service_name, &description, false, None).await {
            Ok(body) => {
                let resolve_key = provider.resolve_key_from_response(&body);
                let alert = &mut endpoint.alerts[index];
                alert.triggered = true;
                alert.resolve_key = resolve_key;
                let snapshot = endpoint.alerts[index].clone();
                if let Err(e) = store.upsert_triggered_endpoint_alert(
                    endpoint,
                    &snapshot,
                    endpoint.number_of_successes_in_a_row,
                ) {
                    tracing::warn!(key = %endpoint.key(), error = %e, "Failed to persist triggered alert");
                }
            }
            Err(e) => {
                tracing::error!(key = %endpoint.key(), error = %e, "Failed to send alert");
            }
        }
    }
}

async fn handle_alerts_to_resolve(
    endpoint: &mut Endpoint,
    providers: &ProviderRegistry,
    store: &dyn Store,
) {
    endpoint.number_of_successes_in_a_row += 1;
    let service_name = endpoint.display_name();
    let successes_in_a_row = endpoint.number_of_successes_in_a_row;
    for index in 0..endpoint.alerts.len() {
        let alert = &endpoint.alerts[index];
        if !alert.is_enabled() || !alert.triggered {
            continue;
        }
        if alert.success_threshold > successes_in_a_row {
            // Not resolved yet; keep the persisted streak current so a
            // restart resumes counting where this process left off.
            let snapshot = alert.clone();
            if let Err(e) =
                store.upsert_triggered_endpoint_alert(endpoint, &snapshot, successes_in_a_row)
            {
                tracing::warn!(key = %endpoint.key(), error = %e, "Failed to persist triggered alert");
            }
            continue;
        }
        // The incident is over as soon as the threshold is reached; the
        // resolve notification is best-effort and must not be able to pin
        // the alert in the triggered state.
        endpoint.alerts[index].triggered = false;
        let snapshot = endpoint.alerts[index].clone();
        if let Err(e) = store.delete_triggered_endpoint_alert(endpoint, &snapshot) {
            tracing::warn!(key = %endpoint.key(), error = %e, "Failed to delete persisted triggered alert");
        }
        if !snapshot.is_sending_on_resolved() {
            continue;
        }
        let Some(provider) = providers.get(snapshot.alert_type) else {
            tracing::warn!(
                key = %endpoint.key(),
                alert_type = %snapshot.alert_type,
                "Not sending resolve notification, because its provider is not configured"
            );
            continue;
        };
        tracing::info!(
            key = %endpoint.key(),
            alert_type = %snapshot.alert_type,
            description = snapshot.description(),
            "Sending alert because it has been resolved"
        );
        match provider
            .send(
                &service_name,
                snapshot.description(),
                true,
                snapshot.resolve_key.as_deref(),
            )
            .await
        {
            Ok(_) => {
                endpoint.alerts[index].resolve_key = None;
            }
            Err(e) => {
                tracing::error!(key = %endpoint.key(), error = %e, "Failed to send resolve notification");
            }
        }
    }
    endpoint.number_of_failures_in_a_row = 0;
}

/// Restores the runtime state of triggered alerts from storage, so a
/// restart neither re-fires ongoing incidents nor forgets to resolve them.
///
/// Persisted rows whose configuration checksum no longer matches any of the
/// endpoint's alerts are purged.
pub fn restore_triggered_alerts(endpoints: &mut [Endpoint], store: &dyn Store) {
    for endpoint in endpoints.iter_mut() {
        let mut checksums = Vec::with_capacity(endpoint.alerts.len());
        for index in 0..endpoint.alerts.len() {
            let alert = endpoint.alerts[index].clone();
            checksums.push(alert.checksum());
            match store.get_triggered_endpoint_alert(endpoint, &alert) {
                Ok(Some(triggered)) => {
                    tracing::debug!(
                        key = %endpoint.key(),
                        checksum = %alert.checksum(),
                        "Restoring triggered alert"
                    );
                    endpoint.number_of_successes_in_a_row =
                        triggered.number_of_successes_in_a_row;
                    let alert = &mut endpoint.alerts[index];
                    alert.triggered = true;
                    alert.resolve_key = triggered.resolve_key;
                }
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!(key = %endpoint.key(), error = %e, "Failed to restore triggered alert");
                }
            }
        }
        store.delete_all_triggered_alerts_not_in_checksums_by_endpoint(endpoint, &checksums);
    }
}
