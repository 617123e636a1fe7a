use super::strategy::{AnalysisError, MetricStrategy};
use crate::tool::{ExternalTool, ToolProgram};
use async_trait::async_trait;
use lazy_static::lazy_static;
use regex::Regex;
use serde::Deserialize;
use std::path::Path;

lazy_static! {
    static ref STDERR_DURATION: Regex =
        Regex::new(r"Duration:\s*(\d+):(\d+):(\d+\.?\d*)").expect("valid duration regex");
}

#[derive(Debug, Deserialize)]
struct FormatOnly {
    format: FormatDuration,
}

#[derive(Debug, Deserialize)]
struct FormatDuration {
    duration: Option<String>,
}

/// Container duration reported by ffprobe.
pub struct ProbeDurationStrategy;

impl ProbeDurationStrategy {
    fn parse(stdout: &str) -> Result<Option<f64>, AnalysisError> {
        let parsed: FormatOnly =
            serde_json::from_str(stdout).map_err(|_| AnalysisError::ParseFailure("duration"))?;
        Ok(parsed
            .format
            .duration
            .and_then(|d| d.trim().parse::<f64>().ok())
            .filter(|d| d.is_finite() && *d >= 0.0))
    }
}

#[async_trait]
impl MetricStrategy<f64> for ProbeDurationStrategy {
    fn name(&self) -> &'static str {
        "ffprobe"
    }

    async fn measure(
        &self,
        tool: &dyn ExternalTool,
        path: &Path,
    ) -> Result<Option<f64>, AnalysisError> {
        let args = vec![
            "-v".to_string(),
            "quiet".to_string(),
            "-print_format".to_string(),
            "json".to_string(),
            "-show_format".to_string(),
            path.to_string_lossy().to_string(),
        ];
        let output = tool
            .run(ToolProgram::Ffprobe, &args)
            .await?
            .ensure_success(ToolProgram::Ffprobe)?;
        Self::parse(&output.stdout)
    }
}

/// `Duration: HH:MM:SS.ms` from the input banner of a decode pass.
pub struct BannerDurationStrategy;

impl BannerDurationStrategy {
    fn parse(stderr: &str) -> Option<f64> {
        let caps = STDERR_DURATION.captures(stderr)?;
        let hours: f64 = caps[1].parse().ok()?;
        let minutes: f64 = caps[2].parse().ok()?;
        let seconds: f64 = caps[3].parse().ok()?;
        Some(hours * 3600.0 + minutes * 60.0 + seconds)
    }
}

#[async_trait]
impl MetricStrategy<f64> for BannerDurationStrategy {
    fn name(&self) -> &'static str {
        "ffmpeg-banner"
    }

    async fn measure(
        &self,
        tool: &dyn ExternalTool,
        path: &Path,
    ) -> Result<Option<f64>, AnalysisError> {
        let args = vec![
            "-i".to_string(),
            path.to_string_lossy().to_string(),
            "-f".to_string(),
            "null".to_string(),
            "-".to_string(),
        ];
        let output = tool.run(ToolProgram::Ffmpeg, &args).await?;
        Ok(Self::parse(&output.stderr))
    }
}
