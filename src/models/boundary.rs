//! Named geofence boundary records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::Polygon;

/// Default boundary name when a request omits one
pub const DEFAULT_BOUNDARY_NAME: &str = "default";

/// A boundary as stored: the polygon is kept in its serialized form
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoundaryRecord {
    pub id: u64,
    pub name: String,
    /// Serialized point list (see `store::codec`)
    pub boundary_points: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl BoundaryRecord {
    /// Ordering key for "current boundary" resolution: latest update wins,
    /// ties go to the highest id
    pub fn recency_key(&self) -> (DateTime<Utc>, u64) {
        (self.updated_at, self.id)
    }
}

/// A boundary with its polygon decoded
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Boundary {
    pub id: u64,
    pub name: String,
    pub polygon: Polygon,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
