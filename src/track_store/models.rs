use crate::analysis::{AnalysisMethod, AnalysisResult};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TrackStoreError {
    #[error("Unknown record type: {0}")]
    UnknownRecordType(String),
}

/// Kinds of platform records that own an audio file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum RecordType {
    Beat,
    Recording,
    Mixdown,
    LibraryItem,
}

impl RecordType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordType::Beat => "Beat",
            RecordType::Recording => "Recording",
            RecordType::Mixdown => "Mixdown",
            RecordType::LibraryItem => "LibraryItem",
        }
    }
}

impl fmt::Display for RecordType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RecordType {
    type Err = TrackStoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Beat" => Ok(RecordType::Beat),
            "Recording" => Ok(RecordType::Recording),
            "Mixdown" => Ok(RecordType::Mixdown),
            "LibraryItem" => Ok(RecordType::LibraryItem),
            other => Err(TrackStoreError::UnknownRecordType(other.to_string())),
        }
    }
}

/// Analysis figures pushed into a record.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisUpdate {
    pub key: Option<String>,
    pub camelot_code: Option<String>,
    pub bpm: Option<u32>,
    pub loudness_lufs: Option<f64>,
    pub loudness_range_lu: Option<f64>,
    pub true_peak_dbtp: Option<f64>,
    pub duration_seconds: Option<f64>,
    pub method: AnalysisMethod,
    pub analyzed_at: DateTime<Utc>,
}

impl AnalysisUpdate {
    pub fn from_result(result: &AnalysisResult, analyzed_at: DateTime<Utc>) -> Self {
        Self {
            key: result.key.clone(),
            camelot_code: result.camelot_code.clone(),
            bpm: result.bpm,
            loudness_lufs: result.loudness_lufs,
            loudness_range_lu: result.loudness_range_lu,
            true_peak_dbtp: result.true_peak_dbtp,
            duration_seconds: result.duration_seconds,
            method: result.method,
            analyzed_at,
        }
    }
}

/// A stored track with its latest analysis, if any.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrackRecord {
    pub record_type: RecordType,
    pub record_id: String,
    pub path: PathBuf,
    pub key: Option<String>,
    pub camelot_code: Option<String>,
    pub bpm: Option<u32>,
    pub loudness_lufs: Option<f64>,
    pub loudness_range_lu: Option<f64>,
    pub true_peak_dbtp: Option<f64>,
    pub duration_seconds: Option<f64>,
    pub analysis_method: Option<String>,
    pub analyzed_at: Option<DateTime<Utc>>,
}

impl TrackRecord {
    pub fn is_analyzed(&self) -> bool {
        self.analyzed_at.is_some()
    }
}
