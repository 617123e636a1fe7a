//! SQLite schema definitions for the track database.

use anyhow::{bail, Result};
use rusqlite::Connection;

/// Offset added to the schema version stored in `PRAGMA user_version`.
pub const BASE_DB_VERSION: i64 = 99999;

pub const TRACK_SCHEMA_VERSION: i64 = 1;

/// Tracks owned by platform records, with their latest PowerTune analysis.
pub const STUDIO_TRACKS_TABLE_V1: &str = "CREATE TABLE studio_tracks (
    record_type TEXT NOT NULL,
    record_id TEXT NOT NULL,
    path TEXT NOT NULL,
    key TEXT,
    camelot TEXT,
    bpm INTEGER,
    loudness REAL,
    loudness_range REAL,
    true_peak REAL,
    duration_seconds REAL,
    analysis_method TEXT,
    analyzed_at TEXT,
    PRIMARY KEY (record_type, record_id)
)";

const STUDIO_TRACKS_COLUMNS_V1: &[&str] = &[
    "record_type",
    "record_id",
    "path",
    "key",
    "camelot",
    "bpm",
    "loudness",
    "loudness_range",
    "true_peak",
    "duration_seconds",
    "analysis_method",
    "analyzed_at",
];

pub fn create(conn: &Connection) -> Result<()> {
    conn.execute(STUDIO_TRACKS_TABLE_V1, [])?;
    conn.execute(
        &format!(
            "PRAGMA user_version = {}",
            BASE_DB_VERSION + TRACK_SCHEMA_VERSION
        ),
        [],
    )?;
    Ok(())
}

/// Check that the `studio_tracks` table has the expected columns, in order.
pub fn validate(conn: &Connection) -> Result<()> {
    let mut stmt = conn.prepare("PRAGMA table_info(studio_tracks);")?;
    let actual: Vec<String> = stmt
        .query_map([], |row| row.get::<_, String>(1))?
        .collect::<Result<_, _>>()?;

    if actual.is_empty() {
        bail!("Table studio_tracks does not exist");
    }
    if actual != STUDIO_TRACKS_COLUMNS_V1 {
        bail!(
            "Table studio_tracks has columns {:?}, expected {:?}",
            actual,
            STUDIO_TRACKS_COLUMNS_V1
        );
    }
    Ok(())
}
