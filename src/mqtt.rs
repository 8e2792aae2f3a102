//! MQTT transport: alert publishing and the GPS fix subscription.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rumqttc::{AsyncClient, Event, EventLoop, MqttOptions, Packet, QoS};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::alerts::{AlertSink, SinkError};
use crate::config::MqttConfig;
use crate::models::{AlertMessage, GpsFix};
use crate::tracker::Tracker;

const RECONNECT_DELAY: Duration = Duration::from_secs(5);

/// Open a client. Nothing is sent until the returned event loop is polled.
pub fn connect(config: &MqttConfig) -> (MqttAlertSink, EventLoop) {
    let client_id = config
        .client_id
        .clone()
        .unwrap_or_else(|| format!("herdfence-{}", Uuid::new_v4()));

    let mut options = MqttOptions::new(client_id, &config.host, config.port);
    options.set_keep_alive(Duration::from_secs(config.keep_alive_secs));

    if let (Some(user), Some(pass)) = (&config.username, &config.password) {
        options.set_credentials(user, pass);
    }

    let (client, eventloop) = AsyncClient::new(options, 100);
    let sink = MqttAlertSink {
        client,
        topic: config.alerts_topic.clone(),
    };
    (sink, eventloop)
}

#[derive(Clone)]
pub struct MqttAlertSink {
    client: AsyncClient,
    topic: String,
}

impl MqttAlertSink {
    pub fn client(&self) -> AsyncClient {
        self.client.clone()
    }
}

#[async_trait]
impl AlertSink for MqttAlertSink {
    async fn publish(&self, alert: &AlertMessage) -> Result<(), SinkError> {
        let payload = serde_json::to_vec(alert)?;
        self.client
            .publish(&self.topic, QoS::AtLeastOnce, false, payload)
            .await?;
        debug!("Queued alert for {} on {}", alert.animal_id, self.topic);
        Ok(())
    }

    fn name(&self) -> &'static str {
        "mqtt"
    }
}

pub fn decode_gps_payload(payload: &[u8]) -> Result<GpsFix, serde_json::Error> {
    serde_json::from_slice(payload)
}

/// Drive the MQTT event loop forever. Each (re)connect re-subscribes to
/// `gps_topic`; fixes arriving there are ingested on their own task.
pub async fn run_gps_listener(
    mut eventloop: EventLoop,
    client: AsyncClient,
    gps_topic: Option<String>,
    tracker: Arc<Tracker>,
) {
    loop {
        match eventloop.poll().await {
            Ok(Event::Incoming(Packet::ConnAck(_))) => {
                info!("Connected to MQTT broker");
                if let Some(topic) = &gps_topic {
                    if let Err(e) = client.subscribe(topic, QoS::AtLeastOnce).await {
                        warn!("Failed to subscribe to {}: {}", topic, e);
                    }
                }
            }
            Ok(Event::Incoming(Packet::Publish(publish))) => {
                if gps_topic.as_deref() != Some(publish.topic.as_str()) {
                    continue;
                }
                match decode_gps_payload(&publish.payload) {
                    Ok(fix) => {
                        let tracker = Arc::clone(&tracker);
                        tokio::spawn(async move {
                            if let Err(e) = tracker.ingest(fix).await {
                                warn!("Rejected GPS fix from MQTT: {}", e);
                            }
                        });
                    }
                    Err(e) => warn!("Unreadable GPS payload on {}: {}", publish.topic, e),
                }
            }
            Ok(_) => {}
            Err(e) => {
                warn!(
                    "MQTT event loop error: {}, retrying in {:?}",
                    e, RECONNECT_DELAY
                );
                tokio::time::sleep(RECONNECT_DELAY).await;
            }
        }
    }
}
