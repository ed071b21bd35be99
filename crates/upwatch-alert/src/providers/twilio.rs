use crate::provider::AlertProvider;
use crate::AlertType;
use anyhow::Result;
use async_trait::async_trait;
use serde::Deserialize;

/// Configuration for the Twilio SMS provider.
#[derive(Debug, Clone, Deserialize)]
pub struct TwilioConfig {
    pub sid: String,
    pub token: String,
    pub from: String,
    pub to: String,
}

pub struct TwilioProvider {
    config: TwilioConfig,
    client: reqwest::Client,
}

impl TwilioProvider {
    pub fn new(config: TwilioConfig) -> Result<Self> {
        if config.sid.is_empty()
            || config.token.is_empty()
            || config.from.is_empty()
            || config.to.is_empty()
        {
            anyhow::bail!("twilio: sid, token, from and to are all required");
        }
        Ok(Self {
            config,
            client: reqwest::Client::new(),
        })
    }
}

#[async_trait]
impl AlertProvider for TwilioProvider {
    async fn send(
        &self,
        service_name: &str,
        description: &str,
        resolved: bool,
        _resolve_key: Option<&str>,
    ) -> Result<Vec<u8>> {
        let message = if resolved {
            format!("RESOLVED: {service_name} - {description}")
        } else {
            format!("TRIGGERED: {service_name} - {description}")
        };
        let url = format!(
            "https://api.twilio.com/2010-04-01/Accounts/{}/Messages.json",
            self.config.sid
        );
        let response = self
            .client
            .post(&url)
            .basic_auth(&self.config.sid, Some(&self.config.token))
            .form(&[
                ("To", self.config.to.as_str()),
                ("From", self.config.from.as_str()),
                ("Body", message.as_str()),
            ])
            .send()
            .await?;
        let status = response.status();
        let bytes = response.bytes().await.unwrap_or_default().to_vec();
        if !status.is_success() {
            anyhow::bail!(
                "twilio: messages API returned status {status}: {}",
                String::from_utf8_lossy(&bytes)
            );
        }
        Ok(bytes)
    }

    fn alert_type(&self) -> AlertType {
        AlertType::Twilio
    }
}
