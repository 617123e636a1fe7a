use super::models::LoudnessReading;
use super::strategy::{AnalysisError, MetricStrategy};
use crate::tool::{ExternalTool, ToolProgram};
use async_trait::async_trait;
use lazy_static::lazy_static;
use regex::Regex;
use serde::Deserialize;
use std::path::Path;

lazy_static! {
    static ref LOUDNORM_JSON: Regex =
        Regex::new(r#"\{[^{}]*"input_i"[^{}]*\}"#).expect("valid loudnorm regex");
    static ref MEAN_VOLUME: Regex =
        Regex::new(r"mean_volume:\s*([-\d.]+)\s*dB").expect("valid mean_volume regex");
    static ref MAX_VOLUME: Regex =
        Regex::new(r"max_volume:\s*([-\d.]+)\s*dB").expect("valid max_volume regex");
}

/// Offset applied to the RMS mean to approximate integrated loudness.
const RMS_TO_LUFS_OFFSET: f64 = -10.0;

fn null_pass_args(path: &Path, filter: &str) -> Vec<String> {
    vec![
        "-i".to_string(),
        path.to_string_lossy().to_string(),
        "-af".to_string(),
        filter.to_string(),
        "-f".to_string(),
        "null".to_string(),
        "-".to_string(),
    ]
}

/// Loudnorm summary; ffmpeg prints every figure as a string.
#[derive(Debug, Deserialize)]
struct LoudnormSummary {
    input_i: String,
    input_lra: Option<String>,
    input_tp: Option<String>,
}

fn finite(value: &str) -> Option<f64> {
    value.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

/// EBU R128 measurement through the `loudnorm` filter.
pub struct LoudnormStrategy;

impl LoudnormStrategy {
    fn parse(stderr: &str) -> Result<Option<LoudnessReading>, AnalysisError> {
        let json = LOUDNORM_JSON
            .find(stderr)
            .ok_or(AnalysisError::ParseFailure("loudnorm summary"))?;
        let summary: LoudnormSummary = serde_json::from_str(json.as_str())
            .map_err(|_| AnalysisError::ParseFailure("loudnorm summary"))?;

        // Silence reports -inf; let the next strategy try.
        let Some(integrated_lufs) = finite(&summary.input_i) else {
            return Ok(None);
        };

        Ok(Some(LoudnessReading {
            integrated_lufs,
            loudness_range_lu: summary.input_lra.as_deref().and_then(finite),
            true_peak_dbtp: summary.input_tp.as_deref().and_then(finite),
        }))
    }
}

#[async_trait]
impl MetricStrategy<LoudnessReading> for LoudnormStrategy {
    fn name(&self) -> &'static str {
        "loudnorm"
    }

    async fn measure(
        &self,
        tool: &dyn ExternalTool,
        path: &Path,
    ) -> Result<Option<LoudnessReading>, AnalysisError> {
        let output = tool
            .run(
                ToolProgram::Ffmpeg,
                &null_pass_args(path, "loudnorm=print_format=json"),
            )
            .await?;
        Self::parse(&output.stderr)
    }
}

/// Rough loudness from `volumedetect` (RMS mean minus 10 dB).
pub struct VolumeDetectStrategy;

impl VolumeDetectStrategy {
    fn parse(stderr: &str) -> Result<Option<LoudnessReading>, AnalysisError> {
        let mean_db = MEAN_VOLUME
            .captures(stderr)
            .and_then(|c| finite(&c[1]))
            .ok_or(AnalysisError::ParseFailure("mean volume"))?;
        let max_db = MAX_VOLUME.captures(stderr).and_then(|c| finite(&c[1]));

        Ok(Some(LoudnessReading {
            integrated_lufs: mean_db + RMS_TO_LUFS_OFFSET,
            loudness_range_lu: None,
            true_peak_dbtp: max_db,
        }))
    }
}

#[async_trait]
impl MetricStrategy<LoudnessReading> for VolumeDetectStrategy {
    fn name(&self) -> &'static str {
        "volumedetect"
    }

    async fn measure(
        &self,
        tool: &dyn ExternalTool,
        path: &Path,
    ) -> Result<Option<LoudnessReading>, AnalysisError> {
        let output = tool
            .run(ToolProgram::Ffmpeg, &null_pass_args(path, "volumedetect"))
            .await?;
        Self::parse(&output.stderr)
    }
}
