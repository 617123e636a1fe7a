//! PowerTune: automatic key, tempo, loudness and duration tagging.
//!
//! Each metric is measured by a [`StrategyCascade`]: a primary strategy
//! backed by a dedicated ffmpeg pass, then cheaper fallbacks. Key
//! estimation runs last because it depends on the tempo.

mod background;
mod duration;
mod key;
mod loudness;
mod models;
mod strategy;
mod tempo;

pub use background::{spawn_background_analysis, BackgroundAnalysisTask, TaskStatus};
pub use duration::{BannerDurationStrategy, ProbeDurationStrategy};
pub use key::{
    camelot_code, get_compatible_keys, key_for_camelot, HeuristicKeyEstimator, KeyEstimate,
    KeyEstimator, TempoBucket, CAMELOT_WHEEL,
};
pub use loudness::{LoudnormStrategy, VolumeDetectStrategy};
pub use models::{AnalysisMethod, AnalysisResult, LoudnessReading};
pub use strategy::{AnalysisError, CascadeOutcome, MetricStrategy, StrategyCascade};
pub use tempo::{normalize_bpm, DurationHeuristicStrategy, OnsetIntervalStrategy};

use crate::tool::ExternalTool;
use crate::track_store::TrackStore;
use futures::future::join_all;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

#[derive(Debug, Clone)]
pub struct AnalyzerSettings {
    pub batch_concurrency: usize,
    pub quick_timeout: Duration,
    /// Audio window fed to onset detection.
    pub tempo_window: Duration,
}

impl Default for AnalyzerSettings {
    fn default() -> Self {
        Self {
            batch_concurrency: 3,
            quick_timeout: Duration::from_millis(5000),
            tempo_window: Duration::from_secs(45),
        }
    }
}

/// Cheap to clone; clones share the tool and strategies.
#[derive(Clone)]
pub struct AudioAnalyzer {
    tool: Arc<dyn ExternalTool>,
    settings: AnalyzerSettings,
    loudness: Arc<StrategyCascade<LoudnessReading>>,
    tempo: Arc<StrategyCascade<u32>>,
    duration: Arc<StrategyCascade<f64>>,
    key_estimator: Arc<dyn KeyEstimator>,
}

impl AudioAnalyzer {
    pub fn new(tool: Arc<dyn ExternalTool>, settings: AnalyzerSettings) -> Self {
        let loudness = StrategyCascade::new("loudness")
            .then(LoudnormStrategy)
            .then(VolumeDetectStrategy);
        let tempo = StrategyCascade::new("tempo")
            .then(OnsetIntervalStrategy::new(settings.tempo_window))
            .then(DurationHeuristicStrategy);
        let duration = StrategyCascade::new("duration")
            .then(ProbeDurationStrategy)
            .then(BannerDurationStrategy);

        Self {
            tool,
            settings,
            loudness: Arc::new(loudness),
            tempo: Arc::new(tempo),
            duration: Arc::new(duration),
            key_estimator: Arc::new(HeuristicKeyEstimator),
        }
    }

    /// Replace the key estimator, e.g. with a real pitch-class analyser.
    pub fn with_key_estimator(mut self, key_estimator: Arc<dyn KeyEstimator>) -> Self {
        self.key_estimator = key_estimator;
        self
    }

    pub fn settings(&self) -> &AnalyzerSettings {
        &self.settings
    }

    /// Analyse one file. Never fails: problems are reported through
    /// [`AnalysisResult::method`] and [`AnalysisResult::error_message`].
    pub async fn analyze(&self, path: &Path) -> AnalysisResult {
        info!("Starting analysis of {:?}", path);

        if !tokio::fs::try_exists(path).await.unwrap_or(false) {
            error!("Cannot analyse {:?}: file not found", path);
            return AnalysisResult::failed(AnalysisError::InputNotFound.to_string());
        }

        let tool = self.tool.as_ref();
        let (loudness, tempo, duration) = tokio::join!(
            self.loudness.run(tool, path),
            self.tempo.run(tool, path),
            self.duration.run(tool, path),
        );

        let measured_any =
            loudness.value.is_some() || tempo.value.is_some() || duration.value.is_some();

        let method = if loudness.from_primary() {
            AnalysisMethod::FfmpegDsp
        } else if measured_any {
            AnalysisMethod::Fallback
        } else {
            let hard_error = loudness
                .first_hard_error()
                .or_else(|| tempo.first_hard_error())
                .or_else(|| duration.first_hard_error());
            return match hard_error {
                Some(e) => {
                    error!("Analysis of {:?} failed: {}", path, e);
                    AnalysisResult::failed(e.to_string())
                }
                None => {
                    warn!("Analysis of {:?} produced no figures", path);
                    AnalysisResult::empty(AnalysisMethod::Fallback)
                }
            };
        };

        let key = self.key_estimator.estimate(path, tempo.value).await;
        let (key, camelot_code) = match key {
            Some(estimate) => (Some(estimate.key), estimate.camelot_code),
            None => (None, None),
        };

        let result = AnalysisResult {
            key,
            camelot_code,
            bpm: tempo.value,
            loudness_lufs: loudness.value.map(|l| l.integrated_lufs),
            loudness_range_lu: loudness.value.and_then(|l| l.loudness_range_lu),
            true_peak_dbtp: loudness.value.and_then(|l| l.true_peak_dbtp),
            duration_seconds: duration.value,
            method,
            error_message: None,
        };

        info!(
            "Analysis complete: key={:?} bpm={:?} loudness={:?} method={}",
            result.key, result.bpm, result.loudness_lufs, result.method
        );
        result
    }

    /// [`AudioAnalyzer::analyze`] bounded by `timeout`. On expiry the
    /// analysis is dropped, which kills its tool processes.
    pub async fn quick_analyze(&self, path: &Path, timeout: Duration) -> AnalysisResult {
        match tokio::time::timeout(timeout, self.analyze(path)).await {
            Ok(result) => result,
            Err(_) => {
                warn!("Quick analysis of {:?} timed out after {:?}", path, timeout);
                AnalysisResult::timed_out()
            }
        }
    }

    /// Analyse consecutive groups of `concurrency` files at a time.
    /// Results come back in input order.
    pub async fn analyze_batch(&self, paths: &[PathBuf], concurrency: usize) -> Vec<AnalysisResult> {
        let concurrency = concurrency.max(1);
        let mut results = Vec::with_capacity(paths.len());

        for group in paths.chunks(concurrency) {
            let group_results = join_all(group.iter().map(|p| self.analyze(p))).await;
            results.extend(group_results);
        }
        results
    }

    /// Analyse `path` in a detached task and store the figures on the
    /// record. Unknown record types abort the task before any work.
    pub fn analyze_in_background(
        &self,
        path: PathBuf,
        record_id: &str,
        record_type: &str,
        store: Arc<dyn TrackStore>,
    ) -> JoinHandle<TaskStatus> {
        let task = BackgroundAnalysisTask::new(path, record_id.to_string(), record_type.to_string());
        spawn_background_analysis(self.clone(), task, store)
    }

    pub fn get_compatible_keys(&self, key: &str) -> Vec<&'static str> {
        get_compatible_keys(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tool::{ToolError, ToolOutput, ToolProgram};
    use async_trait::async_trait;

    /// Every invocation fails to spawn.
    struct MissingTool;

    #[async_trait]
    impl ExternalTool for MissingTool {
        async fn run(&self, program: ToolProgram, _args: &[String]) -> Result<ToolOutput, ToolError> {
            Err(ToolError::Spawn {
                program,
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "No such file"),
            })
        }
    }

    /// Every invocation succeeds without printing anything.
    struct SilentTool;

    #[async_trait]
    impl ExternalTool for SilentTool {
        async fn run(&self, _program: ToolProgram, _args: &[String]) -> Result<ToolOutput, ToolError> {
            Ok(ToolOutput {
                stdout: "{\"format\": {}}".to_string(),
                stderr: String::new(),
                exit_code: Some(0),
            })
        }
    }

    fn existing_file() -> tempfile::NamedTempFile {
        let file = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(file.path(), b"RIFF0000WAVE").unwrap();
        file
    }

    #[tokio::test]
    async fn test_missing_file() {
        let analyzer = AudioAnalyzer::new(Arc::new(SilentTool), AnalyzerSettings::default());
        let result = analyzer.analyze(Path::new("/nonexistent/take.wav")).await;
        assert_eq!(result.method, AnalysisMethod::Error);
        assert_eq!(result.error_message.as_deref(), Some("File not found"));
        assert!(result.key.is_none());
    }

    #[tokio::test]
    async fn test_unspawnable_tool_is_an_error() {
        let file = existing_file();
        let analyzer = AudioAnalyzer::new(Arc::new(MissingTool), AnalyzerSettings::default());
        let result = analyzer.analyze(file.path()).await;
        assert_eq!(result.method, AnalysisMethod::Error);
        assert!(result
            .error_message
            .unwrap()
            .contains("failed to spawn"));
        assert!(result.bpm.is_none());
        assert!(result.key.is_none());
    }

    #[tokio::test]
    async fn test_nothing_measured_is_an_empty_fallback() {
        let file = existing_file();
        let analyzer = AudioAnalyzer::new(Arc::new(SilentTool), AnalyzerSettings::default());
        let result = analyzer.analyze(file.path()).await;
        assert_eq!(result, AnalysisResult::empty(AnalysisMethod::Fallback));
    }

    #[test]
    fn test_default_cascades() {
        let analyzer = AudioAnalyzer::new(Arc::new(SilentTool), AnalyzerSettings::default());
        assert_eq!(
            analyzer.loudness.strategy_names(),
            vec!["loudnorm", "volumedetect"]
        );
        assert_eq!(
            analyzer.tempo.strategy_names(),
            vec!["onset-intervals", "duration-heuristic"]
        );
        assert_eq!(
            analyzer.duration.strategy_names(),
            vec!["ffprobe", "ffmpeg-banner"]
        );
    }
}
