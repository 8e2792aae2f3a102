use async_trait::async_trait;
use tracing::{error, info};

use super::{AlertSink, SinkError};
use crate::models::AlertMessage;

/// POSTs each alert as JSON to a fixed URL
pub struct WebhookAlertSink {
    url: String,
    client: reqwest::Client,
}

impl WebhookAlertSink {
    pub fn new(url: String) -> Self {
        Self {
            url,
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl AlertSink for WebhookAlertSink {
    async fn publish(&self, alert: &AlertMessage) -> Result<(), SinkError> {
        let response = self.client.post(&self.url).json(alert).send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await?;
            error!("Alert webhook returned {}: {}", status, body);
            return Err(SinkError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        info!("Sent alert webhook for animal {}", alert.animal_id);
        Ok(())
    }

    fn name(&self) -> &'static str {
        "webhook"
    }
}
