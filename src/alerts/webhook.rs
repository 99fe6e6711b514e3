use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};

use crate::api::http::SecureHttpClient;

/// Notification severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AlertLevel {
    Info,
    Warning,
    Critical,
    Emergency,
}

impl AlertLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertLevel::Info => "INFO",
            AlertLevel::Warning => "WARNING",
            AlertLevel::Critical => "CRITICAL",
            AlertLevel::Emergency => "EMERGENCY",
        }
    }
}

/// Breach / status notification
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertPayload {
    pub level: AlertLevel,
    pub message: String,
    pub timestamp: String,
    pub source: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stablecoin: Option<String>,
    /// Reserve ratio in basis points
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ratio: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub compliant: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tx_hash: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report_id: Option<String>,
    /// Regulatory analysis excerpt
    #[serde(skip_serializing_if = "Option::is_none")]
    pub analysis: Option<String>,
}

impl AlertPayload {
    pub fn new(level: AlertLevel, message: impl Into<String>, timestamp: String, source: &str) -> Self {
        Self {
            level,
            message: message.into(),
            timestamp,
            source: source.to_string(),
            stablecoin: None,
            ratio: None,
            compliant: None,
            tx_hash: None,
            report_id: None,
            analysis: None,
        }
    }
}

/// Attestation notification, sent on the same channel as alerts
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttestationPayload {
    #[serde(rename = "type")]
    pub kind: String,
    pub level: AlertLevel,
    pub message: String,
    pub stablecoin: String,
    pub timestamp: String,
    pub report_date: String,
    pub compliance_score: u8,
    pub grade: String,
    pub compliant: bool,
    pub ratio_bps: u16,
    pub proof_hash: String,
    pub attestation_text: String,
    pub tx_hash: String,
    pub report_id: String,
    pub source: String,
    pub generated_by: String,
}

/// Webhook transport capability
#[async_trait]
pub trait WebhookSender: Send + Sync {
    async fn send(&self, payload: &Value) -> Result<()>;
}

/// Result of one delivery attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryStatus {
    Delivered,
    Failed(String),
}

/// Deliver once; failures are logged and returned, never raised
pub async fn deliver<T: Serialize>(sender: &dyn WebhookSender, payload: &T) -> DeliveryStatus {
    let value = match serde_json::to_value(payload) {
        Ok(value) => value,
        Err(e) => {
            warn!("Webhook payload serialization failed: {}", e);
            return DeliveryStatus::Failed(e.to_string());
        }
    };

    match sender.send(&value).await {
        Ok(()) => DeliveryStatus::Delivered,
        Err(e) => {
            warn!("Webhook delivery failed: {:#}", e);
            DeliveryStatus::Failed(format!("{:#}", e))
        }
    }
}

/// HTTP JSON POST webhook
pub struct HttpWebhookSender {
    http: SecureHttpClient,
    url: String,
}

impl HttpWebhookSender {
    pub fn new(http: SecureHttpClient, url: String) -> Self {
        Self { http, url }
    }
}

#[async_trait]
impl WebhookSender for HttpWebhookSender {
    async fn send(&self, payload: &Value) -> Result<()> {
        let reply = self
            .http
            .post_json(&self.url, payload, &[("Content-Type", "application/json")])
            .await?;

        if !reply.is_success() {
            return Err(anyhow::anyhow!("Webhook returned status {}", reply.status));
        }

        info!("Webhook delivered ({})", reply.status);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct Recorder(Mutex<Vec<Value>>);

    #[async_trait]
    impl WebhookSender for Recorder {
        async fn send(&self, payload: &Value) -> Result<()> {
            self.0.lock().unwrap().push(payload.clone());
            Ok(())
        }
    }

    struct Unreachable;

    #[async_trait]
    impl WebhookSender for Unreachable {
        async fn send(&self, _payload: &Value) -> Result<()> {
            Err(anyhow::anyhow!("connection refused"))
        }
    }

    #[test]
    fn test_alert_payload_shape() {
        let mut payload = AlertPayload::new(
            AlertLevel::Emergency,
            "breach",
            "1760000000".to_string(),
            "StableGuard",
        );
        payload.ratio = Some(9_900);
        payload.tx_hash = Some("0xab".to_string());

        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["level"], "EMERGENCY");
        assert_eq!(json["ratio"], 9_900);
        assert_eq!(json["txHash"], "0xab");
        assert!(json.get("analysis").is_none());
    }

    #[tokio::test]
    async fn test_deliver_records_and_swallows() {
        let recorder = Recorder(Mutex::new(Vec::new()));
        let payload = AlertPayload::new(AlertLevel::Info, "ok", "t".to_string(), "s");

        assert_eq!(deliver(&recorder, &payload).await, DeliveryStatus::Delivered);
        assert_eq!(recorder.0.lock().unwrap().len(), 1);

        assert!(matches!(
            deliver(&Unreachable, &payload).await,
            DeliveryStatus::Failed(_)
        ));
    }
}
