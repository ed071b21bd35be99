use crate::AlertType;
use anyhow::Result;
use async_trait::async_trait;

/// A notification delivery backend for alerts.
///
/// Implementations are registered in a [`crate::registry::ProviderRegistry`]
/// keyed by their [`AlertType`]; the alerting state machine never branches
/// on the alert's type beyond that lookup.
#[async_trait]
pub trait AlertProvider: Send + Sync {
    /// Delivers a trigger (`resolved == false`) or resolve
    /// (`resolved == true`) notification for `service_name` and returns the
    /// raw response body.
    ///
    /// `resolve_key` is the provider-specific deduplication token captured
    /// from a previous trigger, passed back on resolve calls. Providers
    /// without a dedup concept ignore it.
    ///
    /// # Errors
    ///
    /// Returns an error if the notification could not be delivered; the
    /// caller logs and leaves the alert state unchanged.
    async fn send(
        &self,
        service_name: &str,
        description: &str,
        resolved: bool,
        resolve_key: Option<&str>,
    ) -> Result<Vec<u8>>;

    /// The alert type this provider serves.
    fn alert_type(&self) -> AlertType;

    /// Extracts a deduplication/resolve token from a trigger response body,
    /// if this provider issues one (PagerDuty's `dedup_key`).
    fn resolve_key_from_response(&self, _body: &[u8]) -> Option<String> {
        None
    }
}
