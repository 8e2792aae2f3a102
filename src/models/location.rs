//! GPS fixes and stored location history.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::validation::check_point;
use super::{GeoPoint, Polygon, ValidationError, DEFAULT_BOUNDARY_NAME};

/// A single GPS reading as reported by a collar
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GpsFix {
    pub animal_id: String,
    pub latitude: f64,
    pub longitude: f64,
    #[serde(deserialize_with = "super::timestamp::deserialize")]
    pub timestamp: DateTime<Utc>,
}

impl GpsFix {
    pub fn point(&self) -> GeoPoint {
        GeoPoint::new(self.latitude, self.longitude)
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.animal_id.trim().is_empty() {
            return Err(ValidationError::EmptyAnimalId);
        }
        check_point(&self.point())
    }
}

/// Request body for saving a boundary
#[derive(Debug, Clone, Deserialize)]
pub struct BoundaryRequest {
    #[serde(default = "default_boundary_name")]
    pub name: String,
    pub boundary_points: Vec<GeoPoint>,
}

fn default_boundary_name() -> String {
    DEFAULT_BOUNDARY_NAME.to_string()
}

impl BoundaryRequest {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.name.trim().is_empty() {
            return Err(ValidationError::EmptyBoundaryName);
        }
        if self.boundary_points.len() < Polygon::MIN_VERTICES {
            return Err(ValidationError::TooFewPoints {
                min: Polygon::MIN_VERTICES,
                got: self.boundary_points.len(),
            });
        }
        self.boundary_points.iter().try_for_each(check_point)
    }

    pub fn polygon(&self) -> Polygon {
        Polygon::new(self.boundary_points.clone())
    }
}

/// A persisted location row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationRecord {
    pub id: u64,
    pub animal_id: String,
    pub latitude: f64,
    pub longitude: f64,
    pub timestamp: DateTime<Utc>,
}
