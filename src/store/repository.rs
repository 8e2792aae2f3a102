//! Persistence backends for boundary records.

use std::sync::RwLock;

use chrono::{DateTime, Utc};
use hashbrown::HashMap;
use sled::{Db, Tree};
use tracing::{debug, warn};

use super::StoreError;
use crate::models::BoundaryRecord;

/// Storage contract the boundary store is written against.
///
/// Each upsert must replace the whole record atomically so readers never see
/// the polygon of one write paired with the timestamp of another.
pub trait BoundaryRepository: Send + Sync {
    /// Create or replace the record for `name`. An existing record keeps its
    /// `id` and `created_at`.
    fn upsert_boundary(
        &self,
        name: &str,
        serialized_polygon: &str,
        now: DateTime<Utc>,
    ) -> Result<BoundaryRecord, StoreError>;

    fn fetch_boundary(&self, name: &str) -> Result<Option<BoundaryRecord>, StoreError>;

    fn list_boundaries(&self) -> Result<Vec<BoundaryRecord>, StoreError>;

    /// Latest `updated_at` wins; ties go to the highest id
    fn fetch_most_recently_updated_boundary(&self) -> Result<Option<BoundaryRecord>, StoreError> {
        Ok(self
            .list_boundaries()?
            .into_iter()
            .max_by_key(BoundaryRecord::recency_key))
    }
}

fn replace_polygon(existing: BoundaryRecord, serialized: &str, now: DateTime<Utc>) -> BoundaryRecord {
    BoundaryRecord {
        boundary_points: serialized.to_string(),
        updated_at: now,
        ..existing
    }
}

fn fresh_record(id: u64, name: &str, serialized: &str, now: DateTime<Utc>) -> BoundaryRecord {
    BoundaryRecord {
        id,
        name: name.to_string(),
        boundary_points: serialized.to_string(),
        created_at: now,
        updated_at: now,
    }
}

#[derive(Default)]
struct MemoryState {
    last_id: u64,
    by_name: HashMap<String, BoundaryRecord>,
}

/// Process-local repository, for tests and deployments without a data dir
#[derive(Default)]
pub struct MemoryBoundaryRepository {
    state: RwLock<MemoryState>,
}

impl MemoryBoundaryRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

impl BoundaryRepository for MemoryBoundaryRepository {
    fn upsert_boundary(
        &self,
        name: &str,
        serialized_polygon: &str,
        now: DateTime<Utc>,
    ) -> Result<BoundaryRecord, StoreError> {
        let mut state = self.state.write().map_err(|_| StoreError::Poisoned)?;

        let record = match state.by_name.remove(name) {
            Some(existing) => replace_polygon(existing, serialized_polygon, now),
            None => {
                state.last_id += 1;
                fresh_record(state.last_id, name, serialized_polygon, now)
            }
        };
        state.by_name.insert(name.to_string(), record.clone());
        Ok(record)
    }

    fn fetch_boundary(&self, name: &str) -> Result<Option<BoundaryRecord>, StoreError> {
        let state = self.state.read().map_err(|_| StoreError::Poisoned)?;
        Ok(state.by_name.get(name).cloned())
    }

    fn list_boundaries(&self) -> Result<Vec<BoundaryRecord>, StoreError> {
        let state = self.state.read().map_err(|_| StoreError::Poisoned)?;
        Ok(state.by_name.values().cloned().collect())
    }
}

/// sled-backed repository: one tree keyed by boundary name, JSON values
pub struct SledBoundaryRepository {
    db: Db,
    tree: Tree,
}

impl SledBoundaryRepository {
    pub const TREE_NAME: &'static str = "boundaries";

    pub fn open(db: &Db) -> Result<Self, StoreError> {
        let tree = db.open_tree(Self::TREE_NAME)?;
        Ok(Self {
            db: db.clone(),
            tree,
        })
    }
}

impl BoundaryRepository for SledBoundaryRepository {
    fn upsert_boundary(
        &self,
        name: &str,
        serialized_polygon: &str,
        now: DateTime<Utc>,
    ) -> Result<BoundaryRecord, StoreError> {
        loop {
            let current = self.tree.get(name)?;

            let record = match current
                .as_ref()
                .map(|bytes| serde_json::from_slice::<BoundaryRecord>(bytes))
            {
                Some(Ok(existing)) => replace_polygon(existing, serialized_polygon, now),
                Some(Err(e)) => {
                    warn!("Replacing unreadable boundary record '{}': {}", name, e);
                    fresh_record(self.db.generate_id()?, name, serialized_polygon, now)
                }
                None => fresh_record(self.db.generate_id()?, name, serialized_polygon, now),
            };

            let encoded = serde_json::to_vec(&record)?;
            match self.tree.compare_and_swap(name, current, Some(encoded))? {
                Ok(()) => return Ok(record),
                Err(_) => debug!("Boundary '{}' changed concurrently, retrying", name),
            }
        }
    }

    fn fetch_boundary(&self, name: &str) -> Result<Option<BoundaryRecord>, StoreError> {
        match self.tree.get(name)? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    fn list_boundaries(&self) -> Result<Vec<BoundaryRecord>, StoreError> {
        let mut records = Vec::new();
        for entry in self.tree.iter() {
            let (key, value) = entry?;
            match serde_json::from_slice::<BoundaryRecord>(&value) {
                Ok(record) => records.push(record),
                Err(e) => warn!(
                    "Skipping unreadable boundary record '{}': {}",
                    String::from_utf8_lossy(&key),
                    e
                ),
            }
        }
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    fn temp_db() -> Db {
        sled::Config::new().temporary(true).open().unwrap()
    }

    fn exercise_upsert(repo: &dyn BoundaryRepository) {
        let first = repo.upsert_boundary("north", "[1]", at(0)).unwrap();
        assert_eq!(first.created_at, at(0));
        assert_eq!(first.updated_at, at(0));

        let second = repo.upsert_boundary("north", "[2]", at(10)).unwrap();
        assert_eq!(second.id, first.id);
        assert_eq!(second.created_at, at(0));
        assert_eq!(second.updated_at, at(10));
        assert_eq!(second.boundary_points, "[2]");

        assert_eq!(repo.list_boundaries().unwrap().len(), 1);
        assert_eq!(repo.fetch_boundary("north").unwrap(), Some(second));
        assert_eq!(repo.fetch_boundary("south").unwrap(), None);
    }

    fn exercise_recency(repo: &dyn BoundaryRepository) {
        assert!(repo.fetch_most_recently_updated_boundary().unwrap().is_none());

        repo.upsert_boundary("a", "[]", at(5)).unwrap();
        repo.upsert_boundary("b", "[]", at(20)).unwrap();
        repo.upsert_boundary("c", "[]", at(10)).unwrap();
        let current = repo.fetch_most_recently_updated_boundary().unwrap().unwrap();
        assert_eq!(current.name, "b");

        // Touching "a" makes it current again
        repo.upsert_boundary("a", "[]", at(30)).unwrap();
        let current = repo.fetch_most_recently_updated_boundary().unwrap().unwrap();
        assert_eq!(current.name, "a");
    }

    #[test]
    fn test_memory_upsert_overwrites() {
        exercise_upsert(&MemoryBoundaryRepository::new());
    }

    #[test]
    fn test_sled_upsert_overwrites() {
        exercise_upsert(&SledBoundaryRepository::open(&temp_db()).unwrap());
    }

    #[test]
    fn test_memory_recency() {
        exercise_recency(&MemoryBoundaryRepository::new());
    }

    #[test]
    fn test_sled_recency() {
        exercise_recency(&SledBoundaryRepository::open(&temp_db()).unwrap());
    }

    #[test]
    fn test_tie_goes_to_highest_id() {
        let repo = MemoryBoundaryRepository::new();
        let a = repo.upsert_boundary("a", "[]", at(0)).unwrap();
        let b = repo.upsert_boundary("b", "[]", at(0)).unwrap();
        assert!(b.id > a.id);
        let current = repo.fetch_most_recently_updated_boundary().unwrap().unwrap();
        assert_eq!(current.name, "b");

        // Re-saving "a" at the same instant does not change its id
        repo.upsert_boundary("a", "[1]", at(0)).unwrap();
        let current = repo.fetch_most_recently_updated_boundary().unwrap().unwrap();
        assert_eq!(current.name, "b");
    }

    #[test]
    fn test_sled_skips_corrupt_rows() {
        let db = temp_db();
        let repo = SledBoundaryRepository::open(&db).unwrap();
        repo.upsert_boundary("good", "[]", at(0)).unwrap();
        db.open_tree(SledBoundaryRepository::TREE_NAME)
            .unwrap()
            .insert("bad", "{not a record")
            .unwrap();

        let records = repo.list_boundaries().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].name, "good");

        // An upsert repairs the row
        let repaired = repo.upsert_boundary("bad", "[]", at(1)).unwrap();
        assert_eq!(repaired.created_at, at(1));
        assert_eq!(repo.list_boundaries().unwrap().len(), 2);
    }

    #[test]
    fn test_sled_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let first_id = {
            let db = sled::open(dir.path()).unwrap();
            let repo = SledBoundaryRepository::open(&db).unwrap();
            let record = repo.upsert_boundary("paddock", "[7]", at(0)).unwrap();
            db.flush().unwrap();
            record.id
        };

        let db = sled::open(dir.path()).unwrap();
        let repo = SledBoundaryRepository::open(&db).unwrap();
        let record = repo.fetch_boundary("paddock").unwrap().unwrap();
        assert_eq!(record.id, first_id);
        assert_eq!(record.boundary_points, "[7]");
    }

    #[test]
    fn test_concurrent_upserts_leave_one_row() {
        use std::sync::Arc;

        let repo = Arc::new(SledBoundaryRepository::open(&temp_db()).unwrap());
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let repo = Arc::clone(&repo);
                std::thread::spawn(move || {
                    repo.upsert_boundary("shared", &format!("[{}]", i), at(i))
                        .unwrap()
                })
            })
            .collect();
        let ids: Vec<u64> = handles.into_iter().map(|h| h.join().unwrap().id).collect();

        assert_eq!(repo.list_boundaries().unwrap().len(), 1);
        // Writers that lost the race retried against the winner's record
        assert!(ids.iter().all(|id| *id == ids[0]));
        let stored = repo.fetch_boundary("shared").unwrap().unwrap();
        assert!(stored.boundary_points.starts_with('['));
    }
}
