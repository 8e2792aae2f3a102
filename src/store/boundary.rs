//! Named geofence boundaries and current-boundary resolution.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use super::codec;
use super::repository::{BoundaryRepository, MemoryBoundaryRepository, SledBoundaryRepository};
use super::StoreError;
use crate::models::{Boundary, BoundaryRecord, Polygon};

type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

/// Owns the persisted boundary records.
///
/// The polygon storage format is private to this type; callers only see
/// decoded [`Polygon`]s.
#[derive(Clone)]
pub struct BoundaryStore {
    repo: Arc<dyn BoundaryRepository>,
    clock: Clock,
}

impl BoundaryStore {
    pub fn new<R: BoundaryRepository + 'static>(repo: R) -> Self {
        Self {
            repo: Arc::new(repo),
            clock: Arc::new(Utc::now),
        }
    }

    pub fn in_memory() -> Self {
        Self::new(MemoryBoundaryRepository::new())
    }

    pub fn open_sled(db: &sled::Db) -> Result<Self, StoreError> {
        Ok(Self::new(SledBoundaryRepository::open(db)?))
    }

    /// Replace the timestamp source
    pub fn with_clock<F>(mut self, clock: F) -> Self
    where
        F: Fn() -> DateTime<Utc> + Send + Sync + 'static,
    {
        self.clock = Arc::new(clock);
        self
    }

    /// Create the boundary `name`, or replace its polygon and refresh
    /// `updated_at`. Point count is not checked here.
    pub fn upsert(&self, name: &str, polygon: &Polygon) -> Result<Boundary, StoreError> {
        let now = (self.clock)();
        let record = self
            .repo
            .upsert_boundary(name, &codec::serialize_polygon(polygon), now)?;

        if record.created_at == record.updated_at {
            info!("Saved boundary '{}' ({} points)", name, polygon.len());
        } else {
            info!("Updated boundary '{}' ({} points)", name, polygon.len());
        }

        Ok(Self::decode(record))
    }

    /// Most recently updated boundary, ties broken by highest id
    pub fn resolve_current(&self) -> Result<Option<Boundary>, StoreError> {
        let current = self.repo.fetch_most_recently_updated_boundary()?;
        if let Some(record) = &current {
            debug!("Current boundary is '{}' (id {})", record.name, record.id);
        }
        Ok(current.map(Self::decode))
    }

    pub fn get(&self, name: &str) -> Result<Option<Boundary>, StoreError> {
        Ok(self.repo.fetch_boundary(name)?.map(Self::decode))
    }

    /// All boundaries, most recently updated first
    pub fn list(&self) -> Result<Vec<Boundary>, StoreError> {
        let mut records = self.repo.list_boundaries()?;
        records.sort_by_key(|r| std::cmp::Reverse(r.recency_key()));
        Ok(records.into_iter().map(Self::decode).collect())
    }

    pub fn serialize_polygon(polygon: &Polygon) -> String {
        codec::serialize_polygon(polygon)
    }

    /// Malformed data decodes to the empty polygon
    pub fn deserialize_polygon(raw: &str) -> Polygon {
        codec::deserialize_polygon(raw)
    }

    fn decode(record: BoundaryRecord) -> Boundary {
        Boundary {
            polygon: codec::deserialize_polygon(&record.boundary_points),
            id: record.id,
            name: record.name,
            created_at: record.created_at,
            updated_at: record.updated_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::sync::atomic::{AtomicI64, Ordering};

    /// Clock that advances one second per reading
    fn ticking_clock() -> impl Fn() -> DateTime<Utc> + Send + Sync {
        let tick = AtomicI64::new(0);
        move || {
            let secs = tick.fetch_add(1, Ordering::SeqCst);
            Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
        }
    }

    fn square(offset: f64) -> Polygon {
        Polygon::from(vec![
            (offset, offset),
            (offset, offset + 1.0),
            (offset + 1.0, offset + 1.0),
            (offset + 1.0, offset),
        ])
    }

    #[test]
    fn test_empty_store_has_no_current() {
        let store = BoundaryStore::in_memory();
        assert!(store.resolve_current().unwrap().is_none());
        assert!(store.list().unwrap().is_empty());
    }

    #[test]
    fn test_upsert_same_name_replaces_polygon() {
        let store = BoundaryStore::in_memory().with_clock(ticking_clock());

        let first = store.upsert("zone1", &square(0.0)).unwrap();
        assert_eq!(first.created_at, first.updated_at);

        let second = store.upsert("zone1", &square(5.0)).unwrap();
        assert_eq!(second.id, first.id);
        assert_eq!(second.created_at, first.created_at);
        assert!(second.updated_at > first.updated_at);
        assert_eq!(second.polygon, square(5.0));

        let all = store.list().unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].name, "zone1");
        assert_eq!(all[0].polygon, square(5.0));
    }

    #[test]
    fn test_latest_update_is_current() {
        let store = BoundaryStore::in_memory().with_clock(ticking_clock());
        store.upsert("north", &square(0.0)).unwrap();
        store.upsert("south", &square(10.0)).unwrap();
        assert_eq!(store.resolve_current().unwrap().unwrap().name, "south");

        store.upsert("north", &square(1.0)).unwrap();
        let current = store.resolve_current().unwrap().unwrap();
        assert_eq!(current.name, "north");
        assert_eq!(current.polygon, square(1.0));

        let names: Vec<String> = store.list().unwrap().into_iter().map(|b| b.name).collect();
        assert_eq!(names, vec!["north", "south"]);
    }

    #[test]
    fn test_identical_timestamps_pick_highest_id() {
        let frozen = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
        let store = BoundaryStore::in_memory().with_clock(move || frozen);
        let a = store.upsert("a", &square(0.0)).unwrap();
        let b = store.upsert("b", &square(1.0)).unwrap();
        assert!(b.id > a.id);

        for _ in 0..3 {
            assert_eq!(store.resolve_current().unwrap().unwrap().id, b.id);
        }
    }

    #[test]
    fn test_store_does_not_validate_point_count() {
        let store = BoundaryStore::in_memory();
        let line = Polygon::from(vec![(0.0, 0.0), (1.0, 1.0)]);
        let saved = store.upsert("line", &line).unwrap();
        assert_eq!(saved.polygon, line);
    }

    #[test]
    fn test_sled_backed_store() {
        let db = sled::Config::new().temporary(true).open().unwrap();
        let store = BoundaryStore::open_sled(&db)
            .unwrap()
            .with_clock(ticking_clock());
        store.upsert("paddock", &square(0.0)).unwrap();
        store.upsert("paddock", &square(2.0)).unwrap();

        let current = store.resolve_current().unwrap().unwrap();
        assert_eq!(current.name, "paddock");
        assert_eq!(current.polygon, square(2.0));
        assert_eq!(store.get("paddock").unwrap(), Some(current));
        assert_eq!(store.get("missing").unwrap(), None);
    }

    #[test]
    fn test_round_trip_through_store_format() {
        let polygon = square(0.25);
        assert_eq!(
            BoundaryStore::deserialize_polygon(&BoundaryStore::serialize_polygon(&polygon)),
            polygon
        );
        assert!(BoundaryStore::deserialize_polygon("{{").is_empty());
    }
}
