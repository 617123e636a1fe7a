//! Mixdown and mastering of up to three takes.
//!
//! A mixdown renders a lossless WAV master through the mastering graph,
//! then transcodes it to a 320 kbps MP3. Only the master pass is fatal:
//! a failed transcode still returns the WAV.

use crate::asset::AudioAsset;
use crate::export_layout::{masters_dir, reserve_master_file, timestamp_millis};
use crate::filter_graph::{
    build_mastering_graph, normalisation_args, FilterGraph, MasteringPreset, PresetId,
    OUTPUT_CHANNELS, OUTPUT_SAMPLE_RATE, TERMINAL_LABEL,
};
use crate::tool::{ExternalTool, ToolProgram};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Beat, vocal and fx slots.
pub const MAX_MIX_INPUTS: usize = 3;

const MP3_BITRATE: &str = "320k";
const MASTER_STAGE: &str = "master";

#[derive(Debug, Error)]
pub enum MixdownError {
    #[error("No valid audio inputs")]
    NoValidInputs,

    #[error("Invalid input count: {0} (at most {max})", max = MAX_MIX_INPUTS)]
    InvalidInputCount(usize),

    #[error("{stage} pass failed: {message}")]
    SubprocessFailure { stage: String, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// One mixdown request.
#[derive(Debug, Clone)]
pub struct MixJob {
    pub inputs: Vec<AudioAsset>,
    /// Unknown ids fall back to `standard`.
    pub preset_id: String,
    pub export_name: String,
}

impl MixJob {
    pub fn new(inputs: Vec<AudioAsset>, preset_id: &str, export_name: &str) -> Self {
        Self {
            inputs,
            preset_id: preset_id.to_string(),
            export_name: export_name.to_string(),
        }
    }

    /// Build a job from the studio's beat, vocal and fx slots, in that order.
    pub fn from_tracks(
        beat: Option<AudioAsset>,
        vocal: Option<AudioAsset>,
        fx: Option<AudioAsset>,
        preset_id: &str,
        export_name: &str,
    ) -> Self {
        let inputs = [beat, vocal, fx].into_iter().flatten().collect();
        Self::new(inputs, preset_id, export_name)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct MixResult {
    pub wav_path: PathBuf,
    pub mp3_path: Option<PathBuf>,
    pub wav_size_bytes: u64,
    pub mp3_size_bytes: Option<u64>,
    /// Why the MP3 is missing, when it is.
    pub mp3_error: Option<String>,
    pub preset_id: String,
    pub timestamp: i64,
}

fn master_args(inputs: &[&Path], graph: &FilterGraph, wav_path: &Path) -> Vec<String> {
    let mut args = vec!["-y".to_string()];
    for input in inputs {
        args.push("-i".to_string());
        args.push(input.to_string_lossy().to_string());
    }
    args.push("-filter_complex".to_string());
    args.push(graph.to_filter_complex());
    args.push("-map".to_string());
    args.push(format!("[{}]", TERMINAL_LABEL));
    args.extend(normalisation_args(OUTPUT_SAMPLE_RATE, OUTPUT_CHANNELS));
    args.push(wav_path.to_string_lossy().to_string());
    args
}

fn transcode_args(wav_path: &Path, mp3_path: &Path) -> Vec<String> {
    vec![
        "-y".to_string(),
        "-i".to_string(),
        wav_path.to_string_lossy().to_string(),
        "-codec:a".to_string(),
        "libmp3lame".to_string(),
        "-b:a".to_string(),
        MP3_BITRATE.to_string(),
        "-ac".to_string(),
        OUTPUT_CHANNELS.to_string(),
        "-ar".to_string(),
        OUTPUT_SAMPLE_RATE.to_string(),
        mp3_path.to_string_lossy().to_string(),
    ]
}

async fn file_size(path: &Path) -> Option<u64> {
    tokio::fs::metadata(path)
        .await
        .ok()
        .filter(|m| m.is_file())
        .map(|m| m.len())
}

pub struct MixdownEngine {
    tool: Arc<dyn ExternalTool>,
    exports_root: PathBuf,
}

impl MixdownEngine {
    pub fn new(tool: Arc<dyn ExternalTool>, exports_root: PathBuf) -> Self {
        Self { tool, exports_root }
    }

    pub async fn mixdown(&self, job: &MixJob) -> Result<MixResult, MixdownError> {
        if job.inputs.len() > MAX_MIX_INPUTS {
            return Err(MixdownError::InvalidInputCount(job.inputs.len()));
        }

        let mut valid: Vec<&Path> = Vec::with_capacity(job.inputs.len());
        for input in &job.inputs {
            if input.is_readable().await {
                valid.push(input.path());
            } else {
                warn!("Skipping unreadable mix input {:?}", input.path());
            }
        }
        if valid.is_empty() {
            return Err(MixdownError::NoValidInputs);
        }

        let preset_id = PresetId::resolve(&job.preset_id);
        let preset = MasteringPreset::get(preset_id);
        let graph = build_mastering_graph(valid.len(), &preset)
            .map_err(|_| MixdownError::InvalidInputCount(valid.len()))?;

        let output_dir = masters_dir(&self.exports_root);
        tokio::fs::create_dir_all(&output_dir).await?;

        let timestamp = timestamp_millis();
        let wav_path = reserve_master_file(&output_dir, &job.export_name, timestamp).await?;
        let mp3_path = wav_path.with_extension("mp3");

        info!(
            "Mastering {} input(s) with preset {} into {:?}",
            valid.len(),
            preset_id,
            wav_path
        );
        debug!("Filter graph: {}", graph.to_filter_complex());

        let wav_size_bytes = match self.master(&valid, &graph, &wav_path).await {
            Ok(size) => size,
            Err(message) => {
                // Release the reserved name
                if tokio::fs::remove_file(&wav_path).await.is_ok() {
                    debug!("Removed reserved {:?}", wav_path);
                }
                return Err(MixdownError::SubprocessFailure {
                    stage: MASTER_STAGE.to_string(),
                    message,
                });
            }
        };

        let (mp3_path, mp3_size_bytes, mp3_error) = match self.transcode(&wav_path, &mp3_path).await
        {
            Ok(size) => (Some(mp3_path), Some(size), None),
            Err(message) => {
                warn!("MP3 transcode of {:?} failed: {}", wav_path, message);
                (None, None, Some(message))
            }
        };

        info!(
            "Mixdown complete: {:?} ({} bytes, mp3: {})",
            wav_path,
            wav_size_bytes,
            mp3_path.is_some()
        );

        Ok(MixResult {
            wav_path,
            mp3_path,
            wav_size_bytes,
            mp3_size_bytes,
            mp3_error,
            preset_id: preset_id.to_string(),
            timestamp,
        })
    }

    /// Returns the master size, or why the pass failed.
    async fn master(
        &self,
        inputs: &[&Path],
        graph: &FilterGraph,
        wav_path: &Path,
    ) -> Result<u64, String> {
        let output = self
            .tool
            .run(ToolProgram::Ffmpeg, &master_args(inputs, graph, wav_path))
            .await
            .map_err(|e| e.to_string())?;
        if !output.success() {
            return Err(output.failure_message());
        }
        // The reserved placeholder is empty until ffmpeg writes it
        file_size(wav_path)
            .await
            .filter(|size| *size > 0)
            .ok_or_else(|| "master file was not created".to_string())
    }

    /// Returns the MP3 size, or why there is none.
    async fn transcode(&self, wav_path: &Path, mp3_path: &Path) -> Result<u64, String> {
        let output = self
            .tool
            .run(ToolProgram::Ffmpeg, &transcode_args(wav_path, mp3_path))
            .await
            .map_err(|e| e.to_string())?;
        if !output.success() {
            // Do not leave a truncated mp3 behind
            if tokio::fs::remove_file(mp3_path).await.is_ok() {
                debug!("Removed partial {:?}", mp3_path);
            }
            return Err(output.failure_message());
        }
        file_size(mp3_path)
            .await
            .ok_or_else(|| "mp3 file was not created".to_string())
    }
}
