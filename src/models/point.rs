//! Coordinate and polygon types shared by the store and the evaluator.

use geo::{BoundingRect, Coord, LineString, Rect};
use serde::{Deserialize, Serialize};

/// Geographic point (lat/lon)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl GeoPoint {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Planar coordinate with x = longitude, y = latitude
    pub fn coord(&self) -> Coord<f64> {
        Coord {
            x: self.longitude,
            y: self.latitude,
        }
    }

    pub fn is_finite(&self) -> bool {
        self.latitude.is_finite() && self.longitude.is_finite()
    }

    /// Whether the point lies within the WGS84 lat/lon ranges
    pub fn in_range(&self) -> bool {
        (-90.0..=90.0).contains(&self.latitude) && (-180.0..=180.0).contains(&self.longitude)
    }
}

impl From<(f64, f64)> for GeoPoint {
    fn from((latitude, longitude): (f64, f64)) -> Self {
        Self::new(latitude, longitude)
    }
}

/// Ordered ring of vertices. The last vertex implicitly connects to the first.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Polygon(Vec<GeoPoint>);

impl Polygon {
    /// Minimum vertex count for a ring that encloses an area
    pub const MIN_VERTICES: usize = 3;

    pub fn new(points: Vec<GeoPoint>) -> Self {
        Self(points)
    }

    /// Empty sentinel used when stored data cannot be read
    pub fn empty() -> Self {
        Self(Vec::new())
    }

    pub fn points(&self) -> &[GeoPoint] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// A polygon with fewer than three vertices never contains anything
    pub fn is_evaluable(&self) -> bool {
        self.0.len() >= Self::MIN_VERTICES
    }

    /// Open ring as a geo LineString (x = lon, y = lat)
    pub fn ring(&self) -> LineString<f64> {
        LineString::new(self.0.iter().map(GeoPoint::coord).collect())
    }

    /// Closed geo polygon, for cross-checking against the `geo` algorithms
    #[cfg(test)]
    pub(crate) fn to_geo(&self) -> geo::Polygon<f64> {
        // geo::Polygon::new closes the exterior ring itself
        geo::Polygon::new(self.ring(), vec![])
    }

    /// Bounding rectangle in planar (lon, lat) space
    pub fn bbox(&self) -> Option<Rect<f64>> {
        self.ring().bounding_rect()
    }
}

impl From<Vec<(f64, f64)>> for Polygon {
    fn from(pairs: Vec<(f64, f64)>) -> Self {
        Self(pairs.into_iter().map(GeoPoint::from).collect())
    }
}

impl FromIterator<GeoPoint> for Polygon {
    fn from_iter<I: IntoIterator<Item = GeoPoint>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}
