//! Webhook notifications for stage transitions and critical alerts

use crate::alerting::{format_alert, AlertManager, AlertSeverity, AlertType};
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, error};

/// Webhook configuration
#[derive(Debug, Clone)]
pub struct WebhookConfig {
    pub email_webhook_url: Option<String>,
    pub alert_email_to: String,
    pub timeout_secs: u64,
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            email_webhook_url: std::env::var("EMAIL_ALERT_WEBHOOK").ok(),
            alert_email_to: std::env::var("ALERT_EMAIL_TO")
                .unwrap_or_else(|_| "alerts@reversalindex.dev".to_string()),
            timeout_secs: 10,
        }
    }
}

/// Webhook notifier for sending alerts to the email collaborator
#[derive(Clone)]
pub struct WebhookNotifier {
    config: WebhookConfig,
    client: Client,
}

impl WebhookNotifier {
    pub fn new(config: WebhookConfig) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .expect("Failed to build HTTP client");

        Self { config, client }
    }

    /// Send alert to the configured webhook, if any
    pub async fn send_alert(&self, alert: &AlertType, severity: AlertSeverity) {
        if let Some(ref email_url) = self.config.email_webhook_url {
            if let Err(e) = self.send_email_webhook(email_url, alert, severity).await {
                error!("Failed to send email webhook: {}", e);
            }
        }
    }

    /// Send the email webhook (POST with JSON payload).
    ///
    /// Stage transitions carry the structured fields the collaborator
    /// templates on; other alerts are subject and body only.
    async fn send_email_webhook(
        &self,
        webhook_url: &str,
        alert: &AlertType,
        severity: AlertSeverity,
    ) -> anyhow::Result<()> {
        let payload = email_payload(alert, severity, &self.config.alert_email_to);

        let response = self.client.post(webhook_url).json(&payload).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            return Err(anyhow::anyhow!("Email webhook failed: {}", status));
        }

        debug!("Email webhook sent successfully");
        Ok(())
    }

    /// Test webhook connectivity
    pub async fn test_connection(&self) -> anyhow::Result<()> {
        let Some(ref email_url) = self.config.email_webhook_url else {
            return Err(anyhow::anyhow!("Email webhook not configured"));
        };

        let payload = serde_json::json!({
            "to": self.config.alert_email_to,
            "subject": "[REVERSAL] Alert system test",
            "body": "Reversal index alert delivery test",
            "severity": AlertSeverity::Info.as_str(),
        });

        let response = self.client.post(email_url).json(&payload).send().await?;

        if !response.status().is_success() {
            return Err(anyhow::anyhow!("HTTP {}", response.status()));
        }

        Ok(())
    }
}

fn email_payload(
    alert: &AlertType,
    severity: AlertSeverity,
    email_to: &str,
) -> serde_json::Value {
    let (title, message) = format_alert(alert);
    let subject = format!("[REVERSAL] {}", title);
    let body = format!(
        "Severity: {}\n\n{}\n\nTime: {}",
        severity.as_str(),
        message,
        chrono::Utc::now().format("%Y-%m-%d %H:%M:%S UTC")
    );

    let mut payload = serde_json::json!({
        "to": email_to,
        "subject": subject,
        "body": body,
        "severity": severity.as_str(),
    });

    if let AlertType::StageTransition {
        to,
        score,
        gates_passed,
        cycle_zone,
        ..
    } = alert
    {
        payload["stage"] = serde_json::json!(to.to_string());
        payload["score"] = serde_json::json!(score);
        payload["gates_passed"] = serde_json::json!(gates_passed);
        payload["cycle_zone"] = serde_json::json!(cycle_zone.to_string());
    }

    payload
}

/// Log an alert and send it through the webhook in one call
pub async fn fire_alert_with_webhook(
    alert_manager: &AlertManager,
    webhook_notifier: &WebhookNotifier,
    alert: &AlertType,
    severity: AlertSeverity,
) {
    alert_manager.fire_alert(alert, severity).await;
    webhook_notifier.send_alert(alert, severity).await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CycleZone, Stage};

    #[test]
    fn stage_transition_payload_carries_structured_fields() {
        let alert = AlertType::StageTransition {
            from: Stage::Prepare,
            to: Stage::Confirmed,
            score: 88.5,
            gates_passed: 4,
            cycle_zone: CycleZone::Expansion,
        };
        let payload = email_payload(&alert, AlertSeverity::Warning, "ops@example.com");

        assert_eq!(payload["to"], "ops@example.com");
        assert_eq!(payload["stage"], "confirmed");
        assert_eq!(payload["score"], 88.5);
        assert_eq!(payload["gates_passed"], 4);
        assert_eq!(payload["cycle_zone"], "expansion");
        assert_eq!(payload["severity"], "warning");
        assert!(payload["subject"].as_str().unwrap().starts_with("[REVERSAL]"));
    }

    #[test]
    fn persist_failure_payload_has_no_stage_fields() {
        let alert = AlertType::SnapshotPersistFailure {
            error: "connection refused".to_string(),
        };
        let payload = email_payload(&alert, AlertSeverity::Critical, "ops@example.com");

        assert!(payload.get("stage").is_none());
        assert!(payload["body"].as_str().unwrap().contains("connection refused"));
    }
}
