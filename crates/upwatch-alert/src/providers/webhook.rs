use crate::provider::AlertProvider;
use crate::AlertType;
use anyhow::Result;
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::BTreeMap;

/// Configuration for the generic webhook provider.
///
/// The url and body may contain `[SERVICE_NAME]`, `[ALERT_DESCRIPTION]` and
/// `[ALERT_TRIGGERED_OR_RESOLVED]` placeholders, substituted per
/// notification.
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookConfig {
    pub url: String,
    #[serde(default)]
    pub method: Option<String>,
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
}

pub struct WebhookProvider {
    config: WebhookConfig,
    client: reqwest::Client,
}

impl WebhookProvider {
    pub fn new(config: WebhookConfig) -> Result<Self> {
        if config.url.is_empty() {
            anyhow::bail!("webhook: url must not be empty");
        }
        if let Some(method) = &config.method {
            method
                .parse::<reqwest::Method>()
                .map_err(|_| anyhow::anyhow!("webhook: invalid method '{method}'"))?;
        }
        Ok(Self {
            config,
            client: reqwest::Client::new(),
        })
    }

    fn substitute(template: &str, service_name: &str, description: &str, resolved: bool) -> String {
        template
            .replace("[SERVICE_NAME]", service_name)
            .replace("[ALERT_DESCRIPTION]", description)
            .replace(
                "[ALERT_TRIGGERED_OR_RESOLVED]",
                if resolved { "RESOLVED" } else { "TRIGGERED" },
            )
    }
}

#[async_trait]
impl AlertProvider for WebhookProvider {
    async fn send(
        &self,
        service_name: &str,
        description: &str,
        resolved: bool,
        _resolve_key: Option<&str>,
    ) -> Result<Vec<u8>> {
        let url = Self::substitute(&self.config.url, service_name, description, resolved);
        let method = self
            .config
            .method
            .as_deref()
            .unwrap_or("GET")
            .parse::<reqwest::Method>()
            .unwrap_or(reqwest::Method::GET);
        let mut request = self.client.request(method, &url);
        for (name, value) in &self.config.headers {
            request = request.header(name, value);
        }
        if let Some(body) = &self.config.body {
            request = request.body(Self::substitute(body, service_name, description, resolved));
        }
        let response = request.send().await?;
        let status = response.status();
        let bytes = response.bytes().await.unwrap_or_default().to_vec();
        if !status.is_success() {
            anyhow::bail!(
                "webhook: call returned status {status}: {}",
                String::from_utf8_lossy(&bytes)
            );
        }
        Ok(bytes)
    }

    fn alert_type(&self) -> AlertType {
        AlertType::Webhook
    }
}
