use serde::Serialize;
use std::path::{Path, PathBuf};

/// One readable audio file.
///
/// Assets are owned by the track store; the pipeline only reads them.
/// Technical fields are filled in by probing or analysis when known.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AudioAsset {
    pub path: PathBuf,
    pub duration_seconds: Option<f64>,
    pub sample_rate: Option<u32>,
    pub channel_count: Option<u16>,
}

impl AudioAsset {
    /// Create an asset that only knows its location.
    pub fn from_path<P: Into<PathBuf>>(path: P) -> Self {
        Self {
            path: path.into(),
            duration_seconds: None,
            sample_rate: None,
            channel_count: None,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// File name component, used in manifests.
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default()
    }

    /// Whether the asset points at an existing, non-empty regular file.
    pub async fn is_readable(&self) -> bool {
        if self.path.as_os_str().is_empty() {
            return false;
        }
        match tokio::fs::metadata(&self.path).await {
            Ok(meta) => meta.is_file() && meta.len() > 0,
            Err(_) => false,
        }
    }
}
