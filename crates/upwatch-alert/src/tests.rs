use crate::providers::pagerduty::{PagerDutyConfig, PagerDutyProvider};
use crate::providers::slack::{SlackConfig, SlackProvider};
use crate::providers::twilio::TwilioConfig;
use crate::providers::webhook::{WebhookConfig, WebhookProvider};
use crate::{Alert, AlertProvider, AlertType, AlertingConfig};
use std::collections::BTreeMap;

#[test]
fn checksum_is_stable_for_identical_configurations() {
    let a = Alert::new(AlertType::Slack);
    let b = Alert::new(AlertType::Slack);
    assert_eq!(a.checksum(), b.checksum());
}

#[test]
fn checksum_changes_when_configuration_changes() {
    let base = Alert::new(AlertType::Slack);
    let mut different_threshold = Alert::new(AlertType::Slack);
    different_threshold.failure_threshold = 5;
    let mut different_description = Alert::new(AlertType::Slack);
    different_description.description = Some("service is down".to_string());
    let different_type = Alert::new(AlertType::PagerDuty);

    assert_ne!(base.checksum(), different_threshold.checksum());
    assert_ne!(base.checksum(), different_description.checksum());
    assert_ne!(base.checksum(), different_type.checksum());
}

#[test]
fn checksum_ignores_runtime_state() {
    let mut alert = Alert::new(AlertType::PagerDuty);
    let before = alert.checksum();
    alert.triggered = true;
    alert.resolve_key = Some("dedup-123".to_string());
    assert_eq!(before, alert.checksum());
}

#[test]
fn alert_defaults() {
    let alert = Alert::new(AlertType::Twilio);
    assert!(alert.is_enabled());
    assert!(!alert.is_sending_on_resolved());
    assert_eq!(alert.failure_threshold, 3);
    assert_eq!(alert.success_threshold, 2);
    assert!(!alert.triggered);
}

#[test]
fn registry_lookup_by_type() {
    let config = AlertingConfig {
        slack: Some(SlackConfig {
            webhook_url: "https://hooks.slack.com/services/x".to_string(),
        }),
        pagerduty: None,
        twilio: None,
        webhook: None,
    };
    let registry = config.build_registry().unwrap();
    assert!(registry.has_provider(AlertType::Slack));
    assert!(!registry.has_provider(AlertType::PagerDuty));
    assert_eq!(
        registry.get(AlertType::Slack).unwrap().alert_type(),
        AlertType::Slack
    );
}

#[test]
fn invalid_provider_configurations_are_rejected() {
    assert!(SlackProvider::new(SlackConfig {
        webhook_url: String::new(),
    })
    .is_err());
    assert!(PagerDutyProvider::new(PagerDutyConfig {
        integration_key: "too-short".to_string(),
    })
    .is_err());
    let config = AlertingConfig {
        slack: None,
        pagerduty: None,
        twilio: Some(TwilioConfig {
            sid: "sid".to_string(),
            token: String::new(),
            from: "+15551234567".to_string(),
            to: "+15557654321".to_string(),
        }),
        webhook: None,
    };
    assert!(config.build_registry().is_err());
}

#[test]
fn pagerduty_extracts_dedup_key_from_response() {
    let provider = PagerDutyProvider::new(PagerDutyConfig {
        integration_key: "0123456789abcdef0123456789abcdef".to_string(),
    })
    .unwrap();
    let body = br#"{"status":"success","message":"Event processed","dedup_key":"d-42"}"#;
    assert_eq!(
        provider.resolve_key_from_response(body),
        Some("d-42".to_string())
    );
    assert_eq!(provider.resolve_key_from_response(b"{}"), None);
    assert_eq!(provider.resolve_key_from_response(b"not json"), None);
}

#[test]
fn webhook_validates_url_and_method() {
    let provider = WebhookProvider::new(WebhookConfig {
        url: "https://example.com/hooks/[SERVICE_NAME]".to_string(),
        method: Some("POST".to_string()),
        body: Some("[ALERT_TRIGGERED_OR_RESOLVED]: [ALERT_DESCRIPTION]".to_string()),
        headers: BTreeMap::new(),
    });
    assert!(provider.is_ok());
    assert!(WebhookProvider::new(WebhookConfig {
        url: "https://example.com".to_string(),
        method: Some("NOT A METHOD".to_string()),
        body: None,
        headers: BTreeMap::new(),
    })
    .is_err());
}

#[test]
fn alert_deserializes_from_configuration() {
    let alert: Alert = serde_json::from_str(
        r#"{
            "type": "pagerduty",
            "failure-threshold": 5,
            "success-threshold": 3,
            "send-on-resolved": true,
            "description": "healthcheck failed"
        }"#,
    )
    .unwrap();
    assert_eq!(alert.alert_type, AlertType::PagerDuty);
    assert_eq!(alert.failure_threshold, 5);
    assert_eq!(alert.success_threshold, 3);
    assert!(alert.is_sending_on_resolved());
}
