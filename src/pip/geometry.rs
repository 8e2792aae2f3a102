//! Planar point-in-polygon test.
//!
//! Coordinates are treated as flat (x = longitude, y = latitude). No geodesic
//! correction is applied, so results are only meaningful for small-area
//! fences where the plate carrée distortion is negligible.

use geo::{Coord, Intersects, Line};

use crate::models::{GeoPoint, Polygon};

/// Even-odd ray casting.
///
/// Returns `false` for polygons with fewer than three vertices, for
/// non-finite points, and for points lying exactly on an edge or vertex.
/// Self-intersecting rings are evaluated with the even-odd rule.
pub fn contains(point: &GeoPoint, polygon: &Polygon) -> bool {
    if !polygon.is_evaluable() || !point.is_finite() {
        return false;
    }

    let p = point.coord();

    // Strictly interior points lie strictly inside the bounding box
    match polygon.bbox() {
        Some(rect) => {
            if p.x <= rect.min().x || p.x >= rect.max().x || p.y <= rect.min().y || p.y >= rect.max().y
            {
                return false;
            }
        }
        None => return false,
    }

    if on_boundary(p, polygon) {
        return false;
    }

    crossings_odd(p, polygon)
}

/// Whether the point lies on any edge of the closed ring, including vertices
fn on_boundary(p: Coord<f64>, polygon: &Polygon) -> bool {
    edges(polygon).any(|edge| edge.intersects(&p))
}

fn edges(polygon: &Polygon) -> impl Iterator<Item = Line<f64>> + '_ {
    let pts = polygon.points();
    let n = pts.len();
    (0..n).map(move |i| Line::new(pts[i].coord(), pts[(i + 1) % n].coord()))
}

/// Cast a ray towards +x and count edge crossings
fn crossings_odd(p: Coord<f64>, polygon: &Polygon) -> bool {
    let mut inside = false;
    for edge in edges(polygon) {
        let (a, b) = (edge.start, edge.end);
        // Half-open rule on y so a vertex on the ray is counted once
        if (a.y > p.y) != (b.y > p.y) {
            let x_cross = a.x + (p.y - a.y) * (b.x - a.x) / (b.y - a.y);
            if p.x < x_cross {
                inside = !inside;
            }
        }
    }
    inside
}
