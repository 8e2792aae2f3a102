//! Request validation errors.

use thiserror::Error;

use super::GeoPoint;

#[derive(Debug, Error, PartialEq)]
pub enum ValidationError {
    #[error("animal_id must not be empty")]
    EmptyAnimalId,

    #[error("latitude {0} is outside [-90, 90]")]
    LatitudeOutOfRange(f64),

    #[error("longitude {0} is outside [-180, 180]")]
    LongitudeOutOfRange(f64),

    #[error("at least {min} points required for polygon, got {got}")]
    TooFewPoints { min: usize, got: usize },

    #[error("boundary name must not be empty")]
    EmptyBoundaryName,

    #[error("limit must be between 1 and {max}, got {got}")]
    LimitOutOfRange { max: usize, got: usize },
}

pub(crate) fn check_point(point: &GeoPoint) -> Result<(), ValidationError> {
    if !(-90.0..=90.0).contains(&point.latitude) {
        return Err(ValidationError::LatitudeOutOfRange(point.latitude));
    }
    if !(-180.0..=180.0).contains(&point.longitude) {
        return Err(ValidationError::LongitudeOutOfRange(point.longitude));
    }
    Ok(())
}

/// Upper bound for alert listing requests
pub const MAX_LIST_LIMIT: usize = 1000;

/// Default page size for alert listing requests
pub const DEFAULT_LIST_LIMIT: usize = 100;

pub fn check_limit(limit: usize) -> Result<usize, ValidationError> {
    if limit == 0 || limit > MAX_LIST_LIMIT {
        return Err(ValidationError::LimitOutOfRange {
            max: MAX_LIST_LIMIT,
            got: limit,
        });
    }
    Ok(limit)
}
