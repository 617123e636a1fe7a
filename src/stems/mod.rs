//! Stem bundle export.
//!
//! Stems are approximations built from band filters over a mixed track
//! (see [`StemProfile`]), or the user's own separate tracks resampled to a
//! common format. Every stem of a bundle is rendered concurrently.

use crate::asset::AudioAsset;
use crate::export_layout::{reserve_bundle_dir, safe_export_name, stems_dir, timestamp_millis};
use crate::filter_graph::{
    build_stem_chain, normalisation_args, StemId, StemProfile, OUTPUT_CHANNELS,
    OUTPUT_SAMPLE_RATE,
};
use crate::tool::{ExternalTool, ToolProgram};
use futures::future::join_all;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

pub const MANIFEST_FILE_NAME: &str = "stems_info.json";

#[derive(Debug, Error)]
pub enum StemExportError {
    #[error("Input file not found: {0:?}")]
    InputNotFound(PathBuf),

    #[error("{stage} export failed: {message}")]
    SubprocessFailure { stage: String, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Manifest error: {0}")]
    Manifest(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestEntry {
    pub name: String,
    pub file: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Contents of `stems_info.json`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StemManifest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_file: Option<String>,
    pub export_name: String,
    pub timestamp: i64,
    pub stems: Vec<ManifestEntry>,
}

#[derive(Debug, Clone, Serialize)]
pub struct StemExportResult {
    pub output_directory: PathBuf,
    pub stem_files: BTreeMap<String, PathBuf>,
    pub manifest: StemManifest,
}

/// One ffmpeg render inside a bundle.
struct StemJob {
    name: String,
    description: Option<String>,
    output: PathBuf,
    args: Vec<String>,
}

/// Drop repeated ids, keeping the first occurrence.
fn dedup_preserving_order(requested: &[String]) -> Vec<&str> {
    let mut seen = Vec::new();
    for name in requested {
        if !seen.contains(&name.as_str()) {
            seen.push(name.as_str());
        }
    }
    seen
}

fn stem_args(input: &Path, filter_expr: Option<&str>, output: &Path) -> Vec<String> {
    let mut args = vec![
        "-y".to_string(),
        "-i".to_string(),
        input.to_string_lossy().to_string(),
    ];
    if let Some(expr) = filter_expr {
        args.push("-af".to_string());
        args.push(expr.to_string());
    }
    args.extend(normalisation_args(OUTPUT_SAMPLE_RATE, OUTPUT_CHANNELS));
    args.push(output.to_string_lossy().to_string());
    args
}

pub struct StemExporter {
    tool: Arc<dyn ExternalTool>,
    exports_root: PathBuf,
}

impl StemExporter {
    pub fn new(tool: Arc<dyn ExternalTool>, exports_root: PathBuf) -> Self {
        Self { tool, exports_root }
    }

    /// Split `input` into the requested stems. An empty request exports
    /// [`StemId::DEFAULT_EXPORT`]; unknown stem ids are skipped.
    pub async fn export_stems(
        &self,
        input: &AudioAsset,
        requested: &[String],
        export_name: &str,
    ) -> Result<StemExportResult, StemExportError> {
        if input.path().as_os_str().is_empty()
            || !tokio::fs::try_exists(input.path()).await.unwrap_or(false)
        {
            return Err(StemExportError::InputNotFound(input.path().to_path_buf()));
        }

        let requested: Vec<String> = if requested.is_empty() {
            StemId::DEFAULT_EXPORT
                .iter()
                .map(|id| id.as_str().to_string())
                .collect()
        } else {
            requested.to_vec()
        };

        let timestamp = timestamp_millis();
        let output_directory = self.create_bundle_dir(export_name, timestamp).await?;
        info!(
            "Exporting stems [{}] of {:?} into {:?}",
            requested.join(", "),
            input.path(),
            output_directory
        );

        let mut jobs = Vec::new();
        for name in dedup_preserving_order(&requested) {
            let Some(id) = StemId::parse(name) else {
                warn!("Unknown stem type: {}", name);
                continue;
            };
            let profile = StemProfile::get(id);
            let chain = build_stem_chain(&profile);
            let output = output_directory.join(format!("{}.wav", id));
            jobs.push(StemJob {
                name: id.to_string(),
                description: Some(profile.description.to_string()),
                args: stem_args(input.path(), Some(chain.filter_expr().as_str()), &output),
                output,
            });
        }

        let stems = self.render_all(&jobs).await?;
        let manifest = StemManifest {
            source_file: Some(input.file_name()),
            export_name: safe_export_name(export_name),
            timestamp,
            stems,
        };
        self.finish(output_directory, &jobs, manifest).await
    }

    /// Bundle separately recorded tracks as stems, keyed by track name.
    /// Missing tracks are skipped.
    pub async fn export_stems_from_tracks(
        &self,
        tracks: &[(String, AudioAsset)],
        export_name: &str,
    ) -> Result<StemExportResult, StemExportError> {
        let timestamp = timestamp_millis();
        let output_directory = self.create_bundle_dir(export_name, timestamp).await?;
        info!(
            "Exporting {} track(s) as stems into {:?}",
            tracks.len(),
            output_directory
        );

        let mut jobs: Vec<StemJob> = Vec::new();
        for (track_name, asset) in tracks {
            if track_name.is_empty() {
                warn!("Skipping track with an empty name: {:?}", asset.path());
                continue;
            }
            let exists = !asset.path().as_os_str().is_empty()
                && tokio::fs::try_exists(asset.path()).await.unwrap_or(false);
            if !exists {
                warn!("Track not found: {} -> {:?}", track_name, asset.path());
                continue;
            }

            let name = safe_export_name(track_name);
            if jobs.iter().any(|j| j.name == name) {
                warn!("Duplicate track name {}, keeping the first", track_name);
                continue;
            }
            let output = output_directory.join(format!("{}.wav", name));
            jobs.push(StemJob {
                args: stem_args(asset.path(), None, &output),
                name,
                description: None,
                output,
            });
        }

        let stems = self.render_all(&jobs).await?;
        let manifest = StemManifest {
            source_file: None,
            export_name: safe_export_name(export_name),
            timestamp,
            stems,
        };
        self.finish(output_directory, &jobs, manifest).await
    }

    /// Always a new directory; an existing bundle is never reused.
    async fn create_bundle_dir(
        &self,
        export_name: &str,
        timestamp: i64,
    ) -> Result<PathBuf, StemExportError> {
        let dir = reserve_bundle_dir(&stems_dir(&self.exports_root), export_name, timestamp).await?;
        Ok(dir)
    }

    /// Run every job concurrently and wait for all of them. The first
    /// failure in job order wins; siblings are not cancelled.
    async fn render_all(&self, jobs: &[StemJob]) -> Result<Vec<ManifestEntry>, StemExportError> {
        let outcomes = join_all(jobs.iter().map(|job| self.render(job))).await;

        if let Some((job, message)) = jobs
            .iter()
            .zip(outcomes)
            .find_map(|(job, outcome)| outcome.err().map(|m| (job, m)))
        {
            return Err(StemExportError::SubprocessFailure {
                stage: format!("stem:{}", job.name),
                message,
            });
        }

        Ok(jobs
            .iter()
            .map(|job| ManifestEntry {
                name: job.name.clone(),
                file: format!("{}.wav", job.name),
                description: job.description.clone(),
            })
            .collect())
    }

    async fn render(&self, job: &StemJob) -> Result<(), String> {
        debug!("Exporting stem {}", job.name);
        let output = self
            .tool
            .run(ToolProgram::Ffmpeg, &job.args)
            .await
            .map_err(|e| e.to_string())?;
        if !output.success() {
            return Err(output.failure_message());
        }
        if !tokio::fs::try_exists(&job.output).await.unwrap_or(false) {
            return Err("stem file was not created".to_string());
        }
        debug!("Stem {} exported to {:?}", job.name, job.output);
        Ok(())
    }

    async fn finish(
        &self,
        output_directory: PathBuf,
        jobs: &[StemJob],
        manifest: StemManifest,
    ) -> Result<StemExportResult, StemExportError> {
        let json = serde_json::to_string_pretty(&manifest)?;
        tokio::fs::write(output_directory.join(MANIFEST_FILE_NAME), json).await?;

        let stem_files = jobs
            .iter()
            .map(|job| (job.name.clone(), job.output.clone()))
            .collect();

        info!(
            "Exported {} stem(s) into {:?}",
            manifest.stems.len(),
            output_directory
        );
        Ok(StemExportResult {
            output_directory,
            stem_files,
            manifest,
        })
    }
}
