//! Alert publication.

mod webhook;

use async_trait::async_trait;
use thiserror::Error;
use tracing::warn;

use crate::models::AlertMessage;

pub use webhook::WebhookAlertSink;

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("failed to encode alert: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("webhook request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("webhook rejected alert ({status}): {body}")]
    Rejected { status: u16, body: String },

    #[error("MQTT publish failed: {0}")]
    Mqtt(#[from] rumqttc::ClientError),
}

/// Destination for geofence alerts
#[async_trait]
pub trait AlertSink: Send + Sync {
    async fn publish(&self, alert: &AlertMessage) -> Result<(), SinkError>;

    /// Short label for logs
    fn name(&self) -> &'static str;
}

/// Sink used when no transport is configured
pub struct LogAlertSink;

#[async_trait]
impl AlertSink for LogAlertSink {
    async fn publish(&self, alert: &AlertMessage) -> Result<(), SinkError> {
        warn!(
            "ALERT {}: animal {} at ({}, {})",
            alert.alert_type, alert.animal_id, alert.latitude, alert.longitude
        );
        Ok(())
    }

    fn name(&self) -> &'static str {
        "log"
    }
}
