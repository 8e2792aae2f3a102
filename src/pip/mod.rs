//! Point-in-Polygon (PIP) geofence checks.
//!
//! Planar ray casting over the current boundary, with a built-in fallback
//! fence when no usable boundary is stored.

mod evaluator;
mod geometry;

pub use evaluator::{
    default_polygon, BoundarySource, Evaluation, FallbackReason, GeofenceEvaluator, DEFAULT_FENCE,
};
pub use geometry::contains;
