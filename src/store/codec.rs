//! Persisted polygon format.
//!
//! Polygons are stored inline in boundary records as a JSON array of
//! `{"latitude": .., "longitude": ..}` objects, vertex order preserved.

use tracing::warn;

use crate::models::Polygon;

pub fn serialize_polygon(polygon: &Polygon) -> String {
    // A Vec of two-f64 structs has no map keys or custom serializers that could fail
    serde_json::to_string(polygon).unwrap_or_else(|_| "[]".to_string())
}

/// Strict decode, for callers that need to know why parsing failed
pub fn decode_polygon(raw: &str) -> Result<Polygon, serde_json::Error> {
    serde_json::from_str(raw)
}

/// Lenient decode: malformed or missing data yields the empty polygon
pub fn deserialize_polygon(raw: &str) -> Polygon {
    match decode_polygon(raw) {
        Ok(polygon) => polygon,
        Err(e) => {
            warn!("Stored boundary polygon is unreadable, treating as empty: {}", e);
            Polygon::empty()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn fence() -> Polygon {
        Polygon::from(vec![
            (12.9710, 77.5940),
            (12.9720, 77.5945),
            (12.9730, 77.5930),
            (12.9715, 77.5920),
        ])
    }

    #[test]
    fn test_round_trip_preserves_order() {
        let polygon = fence();
        let raw = serialize_polygon(&polygon);
        assert_eq!(deserialize_polygon(&raw), polygon);

        let reversed: Polygon = polygon.points().iter().rev().copied().collect();
        assert_eq!(deserialize_polygon(&serialize_polygon(&reversed)), reversed);
    }

    #[test]
    fn test_round_trip_keeps_full_precision() {
        let polygon = Polygon::from(vec![
            (0.1 + 0.2, -179.999_999_999_1),
            (-89.123_456_789_012_34, 1e-12),
            (45.0, 90.0),
        ]);
        assert_eq!(deserialize_polygon(&serialize_polygon(&polygon)), polygon);
    }

    #[test]
    fn test_reads_legacy_rows() {
        let raw = r#"[{"latitude": 1.5, "longitude": 2.5}, {"longitude": 4.0, "latitude": 3.0}]"#;
        let polygon = deserialize_polygon(raw);
        assert_eq!(polygon, Polygon::from(vec![(1.5, 2.5), (3.0, 4.0)]));
    }

    #[test]
    fn test_malformed_data_yields_empty() {
        for raw in [
            "",
            "not json",
            "{}",
            r#"[{"latitude": 1.0}]"#,
            r#"[{"lat": 1.0, "lon": 2.0}]"#,
            r#"[{"latitude": "north", "longitude": 2.0}]"#,
            "null",
        ] {
            assert!(deserialize_polygon(raw).is_empty(), "{:?} should not parse", raw);
        }
    }

    #[test]
    fn test_strict_decode_reports_error() {
        assert!(decode_polygon("[").is_err());
        assert!(decode_polygon("[]").unwrap().is_empty());
    }

    proptest! {
        #[test]
        fn test_round_trip_any_in_range_polygon(
            pairs in proptest::collection::vec((-90.0f64..=90.0, -180.0f64..=180.0), 0..32)
        ) {
            let polygon = Polygon::from(pairs);
            prop_assert_eq!(deserialize_polygon(&serialize_polygon(&polygon)), polygon);
        }
    }
}
