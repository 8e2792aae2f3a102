//! Herdfence - GPS livestock tracking with polygon geofences
//!
//! This library provides the boundary store, geofence evaluation and the
//! ingest pipeline shared by the server binary.

pub mod alerts;
pub mod config;
pub mod models;
pub mod mqtt;
pub mod pip;
pub mod store;
pub mod tracker;

pub use models::{Boundary, GeoPoint, GpsFix, Polygon};
pub use pip::{Evaluation, GeofenceEvaluator};
pub use store::BoundaryStore;
pub use tracker::Tracker;
