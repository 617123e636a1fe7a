use super::models::{AnalysisUpdate, RecordType, TrackRecord};
use super::schema::{self, BASE_DB_VERSION, TRACK_SCHEMA_VERSION};
use super::TrackStore;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::info;

pub struct SqliteTrackStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteTrackStore {
    pub fn new<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let path = db_path.as_ref();
        let is_new_db = !path.exists();

        let conn = Connection::open(path).context("Failed to open track database")?;

        if is_new_db {
            info!("Creating new track database at {:?}", path);
            schema::create(&conn)?;
        } else {
            let raw_version: i64 = conn.query_row("PRAGMA user_version;", [], |row| row.get(0))?;
            let db_version = raw_version - BASE_DB_VERSION;

            if db_version != TRACK_SCHEMA_VERSION {
                anyhow::bail!(
                    "Track database version {} is invalid (expected {})",
                    db_version,
                    TRACK_SCHEMA_VERSION
                );
            }
            schema::validate(&conn).context("Track database schema validation failed")?;
        }

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Store backed by a private in-memory database.
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        schema::create(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| anyhow::anyhow!("Track database lock poisoned"))
    }

    /// Insert a track, or repoint an existing one at a new file.
    pub fn register_track(
        &self,
        record_type: RecordType,
        record_id: &str,
        path: &Path,
    ) -> Result<()> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO studio_tracks (record_type, record_id, path)
             VALUES (?1, ?2, ?3)
             ON CONFLICT (record_type, record_id) DO UPDATE SET path = excluded.path",
            params![
                record_type.as_str(),
                record_id,
                path.to_string_lossy().to_string()
            ],
        )?;
        Ok(())
    }

    pub fn get_track(&self, record_type: RecordType, record_id: &str) -> Result<Option<TrackRecord>> {
        let conn = self.lock()?;
        let record = conn
            .query_row(
                "SELECT path, key, camelot, bpm, loudness, loudness_range, true_peak,
                        duration_seconds, analysis_method, analyzed_at
                 FROM studio_tracks WHERE record_type = ?1 AND record_id = ?2",
                params![record_type.as_str(), record_id],
                |row| {
                    let path: String = row.get("path")?;
                    let analyzed_at: Option<String> = row.get("analyzed_at")?;
                    Ok(TrackRecord {
                        record_type,
                        record_id: record_id.to_string(),
                        path: PathBuf::from(path),
                        key: row.get("key")?,
                        camelot_code: row.get("camelot")?,
                        bpm: row.get("bpm")?,
                        loudness_lufs: row.get("loudness")?,
                        loudness_range_lu: row.get("loudness_range")?,
                        true_peak_dbtp: row.get("true_peak")?,
                        duration_seconds: row.get("duration_seconds")?,
                        analysis_method: row.get("analysis_method")?,
                        analyzed_at: analyzed_at.and_then(|s| {
                            DateTime::parse_from_rfc3339(&s)
                                .map(|dt| dt.with_timezone(&Utc))
                                .ok()
                        }),
                    })
                },
            )
            .optional()?;
        Ok(record)
    }
}

impl TrackStore for SqliteTrackStore {
    fn resolve_path(&self, record_type: RecordType, record_id: &str) -> Result<Option<PathBuf>> {
        let conn = self.lock()?;
        let path: Option<String> = conn
            .query_row(
                "SELECT path FROM studio_tracks WHERE record_type = ?1 AND record_id = ?2",
                params![record_type.as_str(), record_id],
                |row| row.get(0),
            )
            .optional()?;
        Ok(path.map(PathBuf::from))
    }

    fn update_metadata(
        &self,
        record_type: RecordType,
        record_id: &str,
        update: &AnalysisUpdate,
    ) -> Result<()> {
        let conn = self.lock()?;
        // Duration, range and peak keep their previous value when unknown
        let updated = conn.execute(
            "UPDATE studio_tracks SET
                key = ?3,
                camelot = ?4,
                bpm = ?5,
                loudness = ?6,
                loudness_range = COALESCE(?7, loudness_range),
                true_peak = COALESCE(?8, true_peak),
                duration_seconds = COALESCE(?9, duration_seconds),
                analysis_method = ?10,
                analyzed_at = ?11
             WHERE record_type = ?1 AND record_id = ?2",
            params![
                record_type.as_str(),
                record_id,
                update.key,
                update.camelot_code,
                update.bpm,
                update.loudness_lufs,
                update.loudness_range_lu,
                update.true_peak_dbtp,
                update.duration_seconds,
                update.method.as_str(),
                update.analyzed_at.to_rfc3339(),
            ],
        )?;
        if updated == 0 {
            anyhow::bail!("No track found for {}:{}", record_type, record_id);
        }
        Ok(())
    }
}
