//! Audio track store collaborator.
//!
//! The pipeline resolves readable paths through it and pushes analysis
//! results back into it; it never owns the business records themselves.

mod models;
mod schema;
mod sqlite_track_store;

pub use models::{AnalysisUpdate, RecordType, TrackRecord, TrackStoreError};
pub use sqlite_track_store::SqliteTrackStore;

use anyhow::Result;
use std::path::PathBuf;

pub trait TrackStore: Send + Sync {
    /// Path of the audio file owned by a record, if the record exists.
    fn resolve_path(&self, record_type: RecordType, record_id: &str) -> Result<Option<PathBuf>>;

    fn update_metadata(
        &self,
        record_type: RecordType,
        record_id: &str,
        update: &AnalysisUpdate,
    ) -> Result<()>;
}
