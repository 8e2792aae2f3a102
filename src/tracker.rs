//! Fix ingestion: store the location, check the geofence, raise alerts.

use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;
use tracing::{error, info};

use crate::alerts::AlertSink;
use crate::models::{AlertMessage, AlertRecord, AlertType, GpsFix, LocationRecord, ValidationError};
use crate::pip::{Evaluation, GeofenceEvaluator};
use crate::store::{BoundaryStore, StoreError, TrackingStore};

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("invalid fix: {0}")]
    Invalid(#[from] ValidationError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, Clone, Serialize)]
pub struct IngestOutcome {
    pub location: LocationRecord,
    pub evaluation: Evaluation,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alert: Option<AlertRecord>,
    /// Whether the alert reached the sink; false when there was no alert
    pub published: bool,
}

pub struct Tracker {
    boundaries: BoundaryStore,
    tracking: TrackingStore,
    evaluator: GeofenceEvaluator,
    sink: Arc<dyn AlertSink>,
}

impl Tracker {
    pub fn new(
        boundaries: BoundaryStore,
        tracking: TrackingStore,
        evaluator: GeofenceEvaluator,
        sink: Arc<dyn AlertSink>,
    ) -> Self {
        Self {
            boundaries,
            tracking,
            evaluator,
            sink,
        }
    }

    pub fn boundaries(&self) -> &BoundaryStore {
        &self.boundaries
    }

    pub fn tracking(&self) -> &TrackingStore {
        &self.tracking
    }

    pub fn evaluator(&self) -> &GeofenceEvaluator {
        &self.evaluator
    }

    /// Validate and store a fix; when it falls outside the current fence,
    /// record an alert and hand it to the sink. Sink failures are logged
    /// and do not fail ingestion.
    pub async fn ingest(&self, fix: GpsFix) -> Result<IngestOutcome, IngestError> {
        fix.validate()?;

        let location = self.tracking.record_location(&fix)?;
        let evaluation = self
            .evaluator
            .evaluate_current(&self.boundaries, &fix.point());

        if evaluation.is_inside {
            return Ok(IngestOutcome {
                location,
                evaluation,
                alert: None,
                published: false,
            });
        }

        let message = AlertMessage {
            animal_id: fix.animal_id.clone(),
            latitude: fix.latitude,
            longitude: fix.longitude,
            timestamp: fix.timestamp,
            alert_type: AlertType::GeofenceBreach,
            message: Some(format!(
                "Animal {} is outside geofence '{}'",
                fix.animal_id,
                evaluation.source.label()
            )),
        };
        let alert = self.tracking.record_alert(message)?;
        info!(
            "Geofence breach by {} at ({}, {})",
            fix.animal_id, fix.latitude, fix.longitude
        );

        let published = match self.sink.publish(&alert.alert).await {
            Ok(()) => true,
            Err(e) => {
                error!("Failed to publish alert via {}: {}", self.sink.name(), e);
                false
            }
        };

        Ok(IngestOutcome {
            location,
            evaluation,
            alert: Some(alert),
            published,
        })
    }
}
