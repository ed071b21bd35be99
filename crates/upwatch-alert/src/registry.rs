use crate::provider::AlertProvider;
use crate::providers::pagerduty::{PagerDutyConfig, PagerDutyProvider};
use crate::providers::slack::{SlackConfig, SlackProvider};
use crate::providers::twilio::{TwilioConfig, TwilioProvider};
use crate::providers::webhook::{WebhookConfig, WebhookProvider};
use crate::AlertType;
use anyhow::Result;
use serde::Deserialize;
use std::collections::HashMap;

/// Registry of configured [`AlertProvider`]s, keyed by alert type.
///
/// An alert whose type has no registered provider is skipped with a log
/// message rather than treated as an error: it usually means the operator
/// configured the alert but not the provider's credentials.
#[derive(Default)]
pub struct ProviderRegistry {
    providers: HashMap<AlertType, Box<dyn AlertProvider>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, provider: Box<dyn AlertProvider>) {
        self.providers.insert(provider.alert_type(), provider);
    }

    pub fn get(&self, alert_type: AlertType) -> Option<&dyn AlertProvider> {
        self.providers.get(&alert_type).map(|p| p.as_ref())
    }

    pub fn has_provider(&self, alert_type: AlertType) -> bool {
        self.providers.contains_key(&alert_type)
    }
}

/// Top-level alerting configuration: one optional section per provider.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AlertingConfig {
    #[serde(default)]
    pub slack: Option<SlackConfig>,
    #[serde(default)]
    pub pagerduty: Option<PagerDutyConfig>,
    #[serde(default)]
    pub twilio: Option<TwilioConfig>,
    #[serde(default)]
    pub webhook: Option<WebhookConfig>,
}

impl AlertingConfig {
    /// Validates each configured provider section and builds the registry.
    ///
    /// # Errors
    ///
    /// Returns the first provider configuration error encountered; alerting
    /// configuration errors are fatal at load time.
    pub fn build_registry(&self) -> Result<ProviderRegistry> {
        let mut registry = ProviderRegistry::new();
        if let Some(cfg) = &self.slack {
            registry.register(Box::new(SlackProvider::new(cfg.clone())?));
        }
        if let Some(cfg) = &self.pagerduty {
            registry.register(Box::new(PagerDutyProvider::new(cfg.clone())?));
        }
        if let Some(cfg) = &self.twilio {
            registry.register(Box::new(TwilioProvider::new(cfg.clone())?));
        }
        if let Some(cfg) = &self.webhook {
            registry.register(Box::new(WebhookProvider::new(cfg.clone())?));
        }
        Ok(registry)
    }
}
