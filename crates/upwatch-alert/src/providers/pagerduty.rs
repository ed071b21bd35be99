use crate::provider::AlertProvider;
use crate::AlertType;
use anyhow::Result;
use async_trait::async_trait;
use serde::Deserialize;

const EVENTS_API_URL: &str = "https://events.pagerduty.com/v2/enqueue";

/// Configuration for the PagerDuty Events API v2 provider.
#[derive(Debug, Clone, Deserialize)]
pub struct PagerDutyConfig {
    #[serde(rename = "integration-key")]
    pub integration_key: String,
}

pub struct PagerDutyProvider {
    config: PagerDutyConfig,
    client: reqwest::Client,
}

#[derive(Deserialize)]
struct PagerDutyResponsePayload {
    #[serde(default)]
    dedup_key: String,
}

impl PagerDutyProvider {
    pub fn new(config: PagerDutyConfig) -> Result<Self> {
        // Routing keys issued by PagerDuty are always 32 characters.
        if config.integration_key.len() != 32 {
            anyhow::bail!("pagerduty: integration-key must have exactly 32 characters");
        }
        Ok(Self {
            config,
            client: reqwest::Client::new(),
        })
    }
}

#[async_trait]
impl AlertProvider for PagerDutyProvider {
    async fn send(
        &self,
        service_name: &str,
        description: &str,
        resolved: bool,
        resolve_key: Option<&str>,
    ) -> Result<Vec<u8>> {
        let (event_action, summary) = if resolved {
            ("resolve", format!("RESOLVED: {service_name} - {description}"))
        } else {
            ("trigger", format!("TRIGGERED: {service_name} - {description}"))
        };
        let body = serde_json::json!({
            "routing_key": self.config.integration_key,
            "dedup_key": resolve_key.unwrap_or(""),
            "event_action": event_action,
            "payload": {
                "summary": summary,
                "source": "upwatch",
                "severity": "critical",
            },
        });
        let response = self.client.post(EVENTS_API_URL).json(&body).send().await?;
        let status = response.status();
        let bytes = response.bytes().await.unwrap_or_default().to_vec();
        if !status.is_success() {
            anyhow::bail!(
                "pagerduty: events API returned status {status}: {}",
                String::from_utf8_lossy(&bytes)
            );
        }
        Ok(bytes)
    }

    fn alert_type(&self) -> AlertType {
        AlertType::PagerDuty
    }

    /// The Events API returns the `dedup_key` needed to resolve the
    /// incident later; it is persisted as the alert's resolve key.
    fn resolve_key_from_response(&self, body: &[u8]) -> Option<String> {
        match serde_json::from_slice::<PagerDutyResponsePayload>(body) {
            Ok(payload) if !payload.dedup_key.is_empty() => Some(payload.dedup_key),
            Ok(_) => None,
            Err(e) => {
                tracing::error!(error = %e, "Failed to decode pagerduty response");
                None
            }
        }
    }
}
