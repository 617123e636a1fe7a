use serde::{Deserialize, Serialize};
use std::fmt;

/// How an [`AnalysisResult`] was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnalysisMethod {
    /// Loudness came from the primary DSP pass.
    #[serde(rename = "ffmpeg-dsp")]
    FfmpegDsp,
    Fallback,
    Timeout,
    Error,
}

impl AnalysisMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnalysisMethod::FfmpegDsp => "ffmpeg-dsp",
            AnalysisMethod::Fallback => "fallback",
            AnalysisMethod::Timeout => "timeout",
            AnalysisMethod::Error => "error",
        }
    }
}

impl fmt::Display for AnalysisMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Output of one PowerTune analysis.
///
/// Every figure is optional: a value is only reported when some strategy
/// actually produced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub key: Option<String>,
    pub camelot_code: Option<String>,
    pub bpm: Option<u32>,
    pub loudness_lufs: Option<f64>,
    pub loudness_range_lu: Option<f64>,
    pub true_peak_dbtp: Option<f64>,
    pub duration_seconds: Option<f64>,
    pub method: AnalysisMethod,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl AnalysisResult {
    /// A result with no figures.
    pub fn empty(method: AnalysisMethod) -> Self {
        Self {
            key: None,
            camelot_code: None,
            bpm: None,
            loudness_lufs: None,
            loudness_range_lu: None,
            true_peak_dbtp: None,
            duration_seconds: None,
            method,
            error_message: None,
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            error_message: Some(message.into()),
            ..Self::empty(AnalysisMethod::Error)
        }
    }

    pub fn timed_out() -> Self {
        Self {
            error_message: Some("Analysis timeout".to_string()),
            ..Self::empty(AnalysisMethod::Timeout)
        }
    }
}

/// Loudness figures of one file.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LoudnessReading {
    pub integrated_lufs: f64,
    pub loudness_range_lu: Option<f64>,
    pub true_peak_dbtp: Option<f64>,
}
