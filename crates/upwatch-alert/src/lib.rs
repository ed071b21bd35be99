//! Alert configuration and notification delivery for upwatch.
//!
//! An [`Alert`] binds a failure/success threshold to a notification
//! provider. Providers implement [`AlertProvider`] and are looked up
//! through a [`registry::ProviderRegistry`], so adding a provider is
//! additive rather than another arm in a dispatch chain. Built-in
//! providers: Slack, PagerDuty (Events API v2), Twilio SMS, and a generic
//! webhook.

pub mod provider;
pub mod providers;
pub mod registry;

#[cfg(test)]
mod tests;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// The kind of provider an alert is dispatched through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertType {
    Slack,
    PagerDuty,
    Twilio,
    Webhook,
}

impl fmt::Display for AlertType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AlertType::Slack => write!(f, "slack"),
            AlertType::PagerDuty => write!(f, "pagerduty"),
            AlertType::Twilio => write!(f, "twilio"),
            AlertType::Webhook => write!(f, "webhook"),
        }
    }
}

/// An endpoint's alert configuration, plus the runtime state the alerting
/// state machine mutates in place.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Alert {
    /// Provider this alert is dispatched through.
    #[serde(rename = "type")]
    pub alert_type: AlertType,

    /// Whether the alert is enabled. Defaults to enabled when omitted.
    #[serde(default)]
    pub enabled: Option<bool>,

    /// Number of failures in a row needed before triggering the alert.
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u32,

    /// Number of successes in a row needed before an ongoing incident is
    /// considered resolved.
    #[serde(default = "default_success_threshold")]
    pub success_threshold: u32,

    /// Whether to send a second notification once the incident resolves.
    #[serde(default)]
    pub send_on_resolved: Option<bool>,

    /// Description included in the notifications.
    #[serde(default)]
    pub description: Option<String>,

    /// Provider-specific deduplication token (PagerDuty `dedup_key`),
    /// captured on trigger and replayed on resolve.
    #[serde(skip)]
    pub resolve_key: Option<String>,

    /// Whether this alert is currently triggered. Only flipped to true when
    /// the provider dispatch succeeds, which doubles as a lazy retry for
    /// failed trigger notifications. The same is deliberately not done for
    /// resolve notifications: a provider that permanently fails on resolve
    /// must not pin the alert in the triggered state forever.
    #[serde(skip)]
    pub triggered: bool,
}

fn default_failure_threshold() -> u32 {
    3
}

fn default_success_threshold() -> u32 {
    2
}

impl Alert {
    pub fn new(alert_type: AlertType) -> Self {
        Self {
            alert_type,
            enabled: None,
            failure_threshold: default_failure_threshold(),
            success_threshold: default_success_threshold(),
            send_on_resolved: None,
            description: None,
            resolve_key: None,
            triggered: false,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.unwrap_or(true)
    }

    pub fn is_sending_on_resolved(&self) -> bool {
        self.send_on_resolved.unwrap_or(false)
    }

    pub fn description(&self) -> &str {
        self.description.as_deref().unwrap_or("")
    }

    /// Hex-encoded SHA-256 over the configuration fields.
    ///
    /// Used as the persisted identity of a triggered alert, so that a
    /// restart neither loses trigger state nor resurrects state belonging
    /// to an alert whose configuration has since changed.
    pub fn checksum(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(
            format!(
                "{}_{}_{}_{}_{}_{}",
                self.alert_type,
                self.is_enabled(),
                self.is_sending_on_resolved(),
                self.success_threshold,
                self.failure_threshold,
                self.description(),
            )
            .as_bytes(),
        );
        let digest = hasher.finalize();
        let mut out = String::with_capacity(64);
        for byte in digest {
            out.push_str(&format!("{byte:02x}"));
        }
        out
    }
}

pub use provider::AlertProvider;
pub use registry::{AlertingConfig, ProviderRegistry};
