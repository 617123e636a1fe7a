//! Naming of generated export files.
//!
//! Masters live in `<exports>/masters/{safe_name}_{timestamp}_{token}.{wav,mp3}`,
//! stems in `<exports>/stems/{safe_name}_{timestamp}_{token}/{stem}.wav`.
//!
//! The timestamp alone is not unique: jobs started in the same millisecond
//! would share it. Names are therefore reserved on disk (exclusive file or
//! directory creation) and a fresh random token is drawn on collision.

use chrono::Utc;
use rand::distr::Alphanumeric;
use rand::Rng;
use std::io;
use std::path::{Path, PathBuf};
use tracing::debug;

pub const MASTERS_DIR: &str = "masters";
pub const STEMS_DIR: &str = "stems";

/// Replace every character outside `[A-Za-z0-9_-]` with `_`.
pub fn safe_export_name(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Uniqueness token embedded in every generated name (Unix milliseconds).
pub fn timestamp_millis() -> i64 {
    Utc::now().timestamp_millis()
}

pub const TOKEN_LEN: usize = 6;
const MAX_RESERVE_ATTEMPTS: usize = 8;

/// Random `[A-Za-z0-9]` suffix separating jobs that share a timestamp.
pub fn unique_token() -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(TOKEN_LEN)
        .map(char::from)
        .collect()
}

/// `{safe_name}_{timestamp}_{token}`
pub fn export_base_name(export_name: &str, timestamp: i64, token: &str) -> String {
    format!("{}_{}_{}", safe_export_name(export_name), timestamp, token)
}

/// Claim a fresh `{base}.wav` in `dir` by creating it exclusively.
///
/// Returns the path of the (empty) claimed file. `dir` must exist.
pub async fn reserve_master_file(
    dir: &Path,
    export_name: &str,
    timestamp: i64,
) -> io::Result<PathBuf> {
    let mut last_err = None;
    for _ in 0..MAX_RESERVE_ATTEMPTS {
        let path = dir.join(format!(
            "{}.wav",
            export_base_name(export_name, timestamp, &unique_token())
        ));
        match tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await
        {
            Ok(_) => return Ok(path),
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                debug!("Master name {:?} taken, drawing another", path);
                last_err = Some(e);
            }
            Err(e) => return Err(e),
        }
    }
    Err(last_err.unwrap_or_else(|| io::Error::from(io::ErrorKind::AlreadyExists)))
}

/// Create a fresh `{base}` directory under `parent`, never reusing one.
pub async fn reserve_bundle_dir(
    parent: &Path,
    export_name: &str,
    timestamp: i64,
) -> io::Result<PathBuf> {
    tokio::fs::create_dir_all(parent).await?;
    let mut last_err = None;
    for _ in 0..MAX_RESERVE_ATTEMPTS {
        let dir = parent.join(export_base_name(export_name, timestamp, &unique_token()));
        match tokio::fs::create_dir(&dir).await {
            Ok(()) => return Ok(dir),
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                debug!("Bundle directory {:?} taken, drawing another", dir);
                last_err = Some(e);
            }
            Err(e) => return Err(e),
        }
    }
    Err(last_err.unwrap_or_else(|| io::Error::from(io::ErrorKind::AlreadyExists)))
}

pub fn masters_dir(exports_root: &Path) -> PathBuf {
    exports_root.join(MASTERS_DIR)
}

pub fn stems_dir(exports_root: &Path) -> PathBuf {
    exports_root.join(STEMS_DIR)
}
