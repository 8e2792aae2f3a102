//! Core data models for the tracking system.

pub mod alert;
pub mod boundary;
pub mod location;
pub mod point;
pub mod timestamp;
pub mod validation;

pub use alert::{AlertMessage, AlertRecord, AlertType};
pub use boundary::{Boundary, BoundaryRecord, DEFAULT_BOUNDARY_NAME};
pub use location::{BoundaryRequest, GpsFix, LocationRecord};
pub use point::{GeoPoint, Polygon};
pub use validation::{check_limit, ValidationError, DEFAULT_LIST_LIMIT, MAX_LIST_LIMIT};
