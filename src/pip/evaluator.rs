//! Geofence evaluation against the current boundary.

use serde::Serialize;
use tracing::{debug, error, warn};

use super::geometry;
use crate::models::{GeoPoint, Polygon};
use crate::store::BoundaryStore;

/// Fallback fence used when no usable boundary is stored
pub const DEFAULT_FENCE: [(f64, f64); 4] = [
    (12.9710, 77.5940),
    (12.9720, 77.5945),
    (12.9730, 77.5930),
    (12.9715, 77.5920),
];

pub fn default_polygon() -> Polygon {
    Polygon::from(DEFAULT_FENCE.to_vec())
}

/// Why the default polygon was used
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "reason")]
pub enum FallbackReason {
    /// No boundary has been saved
    NoBoundary,
    /// The current boundary decoded to fewer than three points
    /// (including unreadable stored data)
    InvalidPolygon { points: usize },
    /// The boundary store could not be read
    StoreUnavailable,
}

/// Which polygon an evaluation ran against
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum BoundarySource {
    Stored { id: u64, name: String },
    Default(FallbackReason),
}

impl BoundarySource {
    pub fn is_default(&self) -> bool {
        matches!(self, BoundarySource::Default(_))
    }

    pub fn label(&self) -> &str {
        match self {
            BoundarySource::Stored { name, .. } => name,
            BoundarySource::Default(_) => "built-in default",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Evaluation {
    pub is_inside: bool,
    pub polygon_used: Polygon,
    pub source: BoundarySource,
}

/// Stateless evaluator; holds only the fallback polygon
#[derive(Debug, Clone)]
pub struct GeofenceEvaluator {
    default_polygon: Polygon,
}

impl Default for GeofenceEvaluator {
    fn default() -> Self {
        Self::new()
    }
}

impl GeofenceEvaluator {
    pub fn new() -> Self {
        Self {
            default_polygon: default_polygon(),
        }
    }

    /// Use a deployment-specific fallback fence. A polygon with fewer than
    /// three points is ignored in favour of the built-in one.
    pub fn with_default_polygon(polygon: Polygon) -> Self {
        if !polygon.is_evaluable() {
            warn!(
                "Configured default fence has {} points, using built-in fence",
                polygon.len()
            );
            return Self::new();
        }
        Self {
            default_polygon: polygon,
        }
    }

    pub fn default_polygon(&self) -> &Polygon {
        &self.default_polygon
    }

    pub fn contains(&self, point: &GeoPoint, polygon: &Polygon) -> bool {
        geometry::contains(point, polygon)
    }

    /// Resolve the current boundary and test the point against it, falling
    /// back to the default fence. Never fails.
    pub fn evaluate_current(&self, store: &BoundaryStore, point: &GeoPoint) -> Evaluation {
        let (polygon_used, source) = match store.resolve_current() {
            Ok(Some(boundary)) if boundary.polygon.is_evaluable() => (
                boundary.polygon,
                BoundarySource::Stored {
                    id: boundary.id,
                    name: boundary.name,
                },
            ),
            Ok(Some(boundary)) => {
                warn!(
                    "Boundary '{}' has {} usable points, using default fence",
                    boundary.name,
                    boundary.polygon.len()
                );
                (
                    self.default_polygon.clone(),
                    BoundarySource::Default(FallbackReason::InvalidPolygon {
                        points: boundary.polygon.len(),
                    }),
                )
            }
            Ok(None) => (
                self.default_polygon.clone(),
                BoundarySource::Default(FallbackReason::NoBoundary),
            ),
            Err(e) => {
                error!("Failed to read boundary store, using default fence: {}", e);
                (
                    self.default_polygon.clone(),
                    BoundarySource::Default(FallbackReason::StoreUnavailable),
                )
            }
        };

        let is_inside = geometry::contains(point, &polygon_used);
        debug!(
            "({}, {}) inside '{}': {}",
            point.latitude,
            point.longitude,
            source.label(),
            is_inside
        );

        Evaluation {
            is_inside,
            polygon_used,
            source,
        }
    }
}
