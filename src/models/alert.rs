//! Geofence alert payloads.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Kind of alert raised for a fix
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertType {
    GeofenceBreach,
}

impl std::fmt::Display for AlertType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AlertType::GeofenceBreach => write!(f, "geofence_breach"),
        }
    }
}

/// Message handed to an alert sink
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertMessage {
    pub animal_id: String,
    pub latitude: f64,
    pub longitude: f64,
    pub timestamp: DateTime<Utc>,
    pub alert_type: AlertType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// A persisted alert row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertRecord {
    pub id: u64,
    #[serde(flatten)]
    pub alert: AlertMessage,
}
