//! Location history and alert log.

use chrono::{DateTime, Utc};
use sled::{Db, Tree};
use tracing::{debug, warn};

use super::StoreError;
use crate::models::{AlertMessage, AlertRecord, GpsFix, LocationRecord};

/// `sortable_micros id`, both big-endian, so byte order is time order.
fn time_key(timestamp: DateTime<Utc>, id: u64) -> [u8; 16] {
    // Flip the sign bit so negative timestamps sort before positive ones
    let micros = (timestamp.timestamp_micros() as u64) ^ (1 << 63);
    let mut key = [0u8; 16];
    key[..8].copy_from_slice(&micros.to_be_bytes());
    key[8..].copy_from_slice(&id.to_be_bytes());
    key
}

/// Length-prefixed animal id. No id's prefix is a prefix of another id's,
/// whatever bytes the ids contain.
fn animal_prefix(animal_id: &str) -> Vec<u8> {
    let mut prefix = Vec::with_capacity(animal_id.len() + 20);
    prefix.extend_from_slice(&(animal_id.len() as u32).to_be_bytes());
    prefix.extend_from_slice(animal_id.as_bytes());
    prefix
}

/// Key layout for per-animal trees: `len animal_id sortable_micros id`
fn animal_key(animal_id: &str, timestamp: DateTime<Utc>, id: u64) -> Vec<u8> {
    let mut key = animal_prefix(animal_id);
    key.extend_from_slice(&time_key(timestamp, id));
    key
}

#[derive(Clone)]
pub struct TrackingStore {
    db: Db,
    locations: Tree,
    /// Alerts keyed by time
    alerts: Tree,
    /// Per-animal index into `alerts`
    alerts_by_animal: Tree,
}

impl TrackingStore {
    pub fn open(db: &Db) -> Result<Self, StoreError> {
        Ok(Self {
            db: db.clone(),
            locations: db.open_tree("locations")?,
            alerts: db.open_tree("alerts")?,
            alerts_by_animal: db.open_tree("alerts_by_animal")?,
        })
    }

    pub fn record_location(&self, fix: &GpsFix) -> Result<LocationRecord, StoreError> {
        let record = LocationRecord {
            id: self.db.generate_id()?,
            animal_id: fix.animal_id.clone(),
            latitude: fix.latitude,
            longitude: fix.longitude,
            timestamp: fix.timestamp,
        };
        let key = animal_key(&record.animal_id, record.timestamp, record.id);
        self.locations.insert(key, serde_json::to_vec(&record)?)?;
        debug!("Stored location {} for animal {}", record.id, record.animal_id);
        Ok(record)
    }

    /// Fix with the greatest timestamp for the animal
    pub fn latest_location(&self, animal_id: &str) -> Result<Option<LocationRecord>, StoreError> {
        let mut iter = self.locations.scan_prefix(animal_prefix(animal_id)).rev();
        match iter.next() {
            Some(entry) => {
                let (_, value) = entry?;
                Ok(Some(serde_json::from_slice(&value)?))
            }
            None => Ok(None),
        }
    }

    /// Fixes within the inclusive bounds, newest first
    pub fn location_history(
        &self,
        animal_id: &str,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    ) -> Result<Vec<LocationRecord>, StoreError> {
        let mut history = Vec::new();
        for entry in self.locations.scan_prefix(animal_prefix(animal_id)).rev() {
            let (_, value) = entry?;
            let record: LocationRecord = serde_json::from_slice(&value)?;
            if start.is_some_and(|s| record.timestamp < s) {
                continue;
            }
            if end.is_some_and(|e| record.timestamp > e) {
                continue;
            }
            history.push(record);
        }
        Ok(history)
    }

    pub fn record_alert(&self, alert: AlertMessage) -> Result<AlertRecord, StoreError> {
        let record = AlertRecord {
            id: self.db.generate_id()?,
            alert,
        };
        let key = time_key(record.alert.timestamp, record.id);
        self.alerts.insert(&key[..], serde_json::to_vec(&record)?)?;
        self.alerts_by_animal.insert(
            animal_key(&record.alert.animal_id, record.alert.timestamp, record.id),
            &key[..],
        )?;
        Ok(record)
    }

    /// Most recent alerts first
    pub fn alerts(&self, limit: usize) -> Result<Vec<AlertRecord>, StoreError> {
        let mut records = Vec::with_capacity(limit.min(64));
        for entry in self.alerts.iter().rev() {
            if records.len() >= limit {
                break;
            }
            let (key, value) = entry?;
            if let Some(record) = decode_alert(&key, &value) {
                records.push(record);
            }
        }
        Ok(records)
    }

    pub fn alerts_for_animal(
        &self,
        animal_id: &str,
        limit: usize,
    ) -> Result<Vec<AlertRecord>, StoreError> {
        let mut records = Vec::with_capacity(limit.min(64));
        for entry in self.alerts_by_animal.scan_prefix(animal_prefix(animal_id)).rev() {
            if records.len() >= limit {
                break;
            }
            let (_, alert_key) = entry?;
            let Some(value) = self.alerts.get(&alert_key)? else {
                warn!("Alert index entry {:?} has no alert", alert_key);
                continue;
            };
            if let Some(record) = decode_alert(&alert_key, &value) {
                records.push(record);
            }
        }
        Ok(records)
    }
}

fn decode_alert(key: &[u8], value: &[u8]) -> Option<AlertRecord> {
    match serde_json::from_slice::<AlertRecord>(value) {
        Ok(record) => Some(record),
        Err(e) => {
            warn!("Skipping unreadable alert {:?}: {}", key, e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::AlertType;
    use chrono::TimeZone;

    fn store() -> TrackingStore {
        let db = sled::Config::new().temporary(true).open().unwrap();
        TrackingStore::open(&db).unwrap()
    }

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    fn fix(animal: &str, secs: i64) -> GpsFix {
        GpsFix {
            animal_id: animal.to_string(),
            latitude: 12.97,
            longitude: 77.59 + secs as f64 * 1e-4,
            timestamp: at(secs),
        }
    }

    fn alert(animal: &str, secs: i64) -> AlertMessage {
        AlertMessage {
            animal_id: animal.to_string(),
            latitude: 13.0,
            longitude: 77.6,
            timestamp: at(secs),
            alert_type: AlertType::GeofenceBreach,
            message: None,
        }
    }

    #[test]
    fn test_latest_location_uses_timestamp_not_arrival() {
        let store = store();
        store.record_location(&fix("cow-1", 30)).unwrap();
        store.record_location(&fix("cow-1", 10)).unwrap();
        store.record_location(&fix("cow-10", 99)).unwrap();

        let latest = store.latest_location("cow-1").unwrap().unwrap();
        assert_eq!(latest.timestamp, at(30));
        assert!(store.latest_location("sheep").unwrap().is_none());
    }

    #[test]
    fn test_history_is_newest_first_and_bounded() {
        let store = store();
        for secs in [5, 1, 3, 4, 2] {
            store.record_location(&fix("cow-1", secs)).unwrap();
        }
        store.record_location(&fix("cow-2", 3)).unwrap();

        let all = store.location_history("cow-1", None, None).unwrap();
        let times: Vec<_> = all.iter().map(|r| r.timestamp).collect();
        assert_eq!(times, vec![at(5), at(4), at(3), at(2), at(1)]);

        let window = store
            .location_history("cow-1", Some(at(2)), Some(at(4)))
            .unwrap();
        assert_eq!(window.len(), 3);
        assert_eq!(window[0].timestamp, at(4));
        assert_eq!(window[2].timestamp, at(2));

        let open_end = store.location_history("cow-1", Some(at(4)), None).unwrap();
        assert_eq!(open_end.len(), 2);
        assert!(store.location_history("goat", None, None).unwrap().is_empty());
    }

    #[test]
    fn test_pre_epoch_timestamps_sort_first() {
        let store = store();
        store.record_location(&fix("cow-1", -1_800_000_000)).unwrap();
        store.record_location(&fix("cow-1", 0)).unwrap();
        let latest = store.latest_location("cow-1").unwrap().unwrap();
        assert_eq!(latest.timestamp, at(0));
    }

    #[test]
    fn test_alert_listing() {
        let store = store();
        store.record_alert(alert("cow-1", 20)).unwrap();
        store.record_alert(alert("cow-2", 30)).unwrap();
        store.record_alert(alert("cow-1", 10)).unwrap();

        let all = store.alerts(100).unwrap();
        let times: Vec<_> = all.iter().map(|r| r.alert.timestamp).collect();
        assert_eq!(times, vec![at(30), at(20), at(10)]);

        assert_eq!(store.alerts(2).unwrap().len(), 2);

        let cow1 = store.alerts_for_animal("cow-1", 100).unwrap();
        assert_eq!(cow1.len(), 2);
        assert!(cow1.iter().all(|r| r.alert.animal_id == "cow-1"));
        assert_eq!(cow1[0].alert.timestamp, at(20));
    }

    #[test]
    fn test_ids_sharing_a_prefix_stay_separate() {
        let store = store();
        store.record_location(&fix("cow", 100)).unwrap();
        store.record_location(&fix("cow\u{0}x", 50)).unwrap();
        store.record_location(&fix("cow\u{ff}", 200)).unwrap();
        store.record_location(&fix("co", 300)).unwrap();

        let history = store.location_history("cow", None, None).unwrap();
        let ids: Vec<_> = history.iter().map(|r| r.animal_id.as_str()).collect();
        assert_eq!(ids, vec!["cow"]);

        let latest = store.latest_location("cow").unwrap().unwrap();
        assert_eq!(latest.animal_id, "cow");
        assert_eq!(latest.timestamp, at(100));

        store.record_alert(alert("cow", 1)).unwrap();
        store.record_alert(alert("cow\u{0}x", 2)).unwrap();
        let alerts = store.alerts_for_animal("cow", 100).unwrap();
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].alert.animal_id, "cow");
    }

    #[test]
    fn test_alert_limit_keeps_newest() {
        let store = store();
        for secs in [7, 3, 9, 1, 5] {
            store.record_alert(alert("cow-1", secs)).unwrap();
        }
        store.record_alert(alert("cow-2", 8)).unwrap();

        let top: Vec<_> = store.alerts(3).unwrap().iter().map(|r| r.alert.timestamp).collect();
        assert_eq!(top, vec![at(9), at(8), at(7)]);

        let cow1: Vec<_> = store
            .alerts_for_animal("cow-1", 2)
            .unwrap()
            .iter()
            .map(|r| r.alert.timestamp)
            .collect();
        assert_eq!(cow1, vec![at(9), at(7)]);
        assert!(store.alerts_for_animal("cow-3", 10).unwrap().is_empty());
    }
}
