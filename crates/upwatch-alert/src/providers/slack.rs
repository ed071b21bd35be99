use crate::provider::AlertProvider;
use crate::AlertType;
use anyhow::Result;
use async_trait::async_trait;
use serde::Deserialize;

/// Configuration for the Slack incoming-webhook provider.
#[derive(Debug, Clone, Deserialize)]
pub struct SlackConfig {
    #[serde(rename = "webhook-url")]
    pub webhook_url: String,
}

pub struct SlackProvider {
    config: SlackConfig,
    client: reqwest::Client,
}

impl SlackProvider {
    pub fn new(config: SlackConfig) -> Result<Self> {
        if config.webhook_url.is_empty() {
            anyhow::bail!("slack: webhook-url must not be empty");
        }
        Ok(Self {
            config,
            client: reqwest::Client::new(),
        })
    }

    fn build_request_body(service_name: &str, description: &str, resolved: bool) -> serde_json::Value {
        let (message, color) = if resolved {
            (
                format!("An alert for *{service_name}* has been resolved"),
                "#36A64F",
            )
        } else {
            (
                format!("An alert for *{service_name}* has been triggered"),
                "#DD0000",
            )
        };
        serde_json::json!({
            "text": "",
            "attachments": [{
                "title": ":helmet_with_white_cross: upwatch",
                "text": format!("{message}:\n> {description}"),
                "short": false,
                "color": color,
            }],
        })
    }
}

#[async_trait]
impl AlertProvider for SlackProvider {
    async fn send(
        &self,
        service_name: &str,
        description: &str,
        resolved: bool,
        _resolve_key: Option<&str>,
    ) -> Result<Vec<u8>> {
        let body = Self::build_request_body(service_name, description, resolved);
        let response = self
            .client
            .post(&self.config.webhook_url)
            .json(&body)
            .send()
            .await?;
        let status = response.status();
        let bytes = response.bytes().await.unwrap_or_default().to_vec();
        if !status.is_success() {
            anyhow::bail!(
                "slack: webhook returned status {status}: {}",
                String::from_utf8_lossy(&bytes)
            );
        }
        Ok(bytes)
    }

    fn alert_type(&self) -> AlertType {
        AlertType::Slack
    }
}
