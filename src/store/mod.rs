//! Persistence: geofence boundaries, location history and alerts.

mod boundary;
pub mod codec;
mod repository;
mod tracking;

use thiserror::Error;

pub use boundary::BoundaryStore;
pub use repository::{BoundaryRepository, MemoryBoundaryRepository, SledBoundaryRepository};
pub use tracking::TrackingStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("storage error: {0}")]
    Sled(#[from] sled::Error),

    #[error("corrupt record: {0}")]
    Corrupt(#[from] serde_json::Error),

    #[error("storage lock poisoned")]
    Poisoned,
}
