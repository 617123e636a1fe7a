//! Audio stream metadata via ffprobe.

use super::runner::{ExternalTool, ToolError, ToolProgram};
use crate::asset::AudioAsset;
use serde::Deserialize;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("ffprobe failed: {0}")]
    ProbeFailed(String),

    #[error("Tool error: {0}")]
    Tool(#[from] ToolError),

    #[error("Invalid output: {0}")]
    InvalidOutput(String),
}

/// ffprobe JSON output structure.
#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    format: FfprobeFormat,
    #[serde(default)]
    streams: Vec<FfprobeStream>,
}

#[derive(Debug, Deserialize)]
struct FfprobeFormat {
    duration: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FfprobeStream {
    codec_type: String,
    sample_rate: Option<String>,
    channels: Option<u16>,
}

fn probe_args(path: &Path) -> Vec<String> {
    vec![
        "-v".to_string(),
        "quiet".to_string(),
        "-print_format".to_string(),
        "json".to_string(),
        "-show_format".to_string(),
        "-show_streams".to_string(),
        path.to_string_lossy().to_string(),
    ]
}

/// Probe an audio file and describe it as an [`AudioAsset`].
pub async fn probe_audio_file(
    tool: &dyn ExternalTool,
    path: &Path,
) -> Result<AudioAsset, ProbeError> {
    let output = tool.run(ToolProgram::Ffprobe, &probe_args(path)).await?;

    if !output.success() {
        return Err(ProbeError::ProbeFailed(output.failure_message()));
    }

    parse_probe_output(path, &output.stdout)
}

fn parse_probe_output(path: &Path, stdout: &str) -> Result<AudioAsset, ProbeError> {
    let probe: FfprobeOutput = serde_json::from_str(stdout)
        .map_err(|e| ProbeError::InvalidOutput(format!("JSON parse error: {}", e)))?;

    let audio_stream = probe
        .streams
        .iter()
        .find(|s| s.codec_type == "audio")
        .ok_or_else(|| ProbeError::InvalidOutput("No audio stream found".to_string()))?;

    let duration_seconds = probe
        .format
        .duration
        .as_ref()
        .and_then(|d| d.trim().parse::<f64>().ok())
        .filter(|d| d.is_finite() && *d >= 0.0);

    let sample_rate = audio_stream
        .sample_rate
        .as_ref()
        .and_then(|sr| sr.parse().ok());

    Ok(AudioAsset {
        path: path.to_path_buf(),
        duration_seconds,
        sample_rate,
        channel_count: audio_stream.channels,
    })
}

/// Check that both ffmpeg and ffprobe can be executed.
pub async fn check_tools_available(tool: &dyn ExternalTool) -> Result<(), ProbeError> {
    for program in [ToolProgram::Ffprobe, ToolProgram::Ffmpeg] {
        let output = tool.run(program, &["-version".to_string()]).await?;
        if !output.success() {
            return Err(ProbeError::ProbeFailed(format!(
                "{} not working: {}",
                program,
                output.failure_message()
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const PROBE_JSON: &str = r#"{
        "streams": [
            {"index": 0, "codec_type": "video", "codec_name": "mjpeg"},
            {"index": 1, "codec_type": "audio", "codec_name": "mp3",
             "sample_rate": "44100", "channels": 2, "bit_rate": "320000"}
        ],
        "format": {"format_name": "mp3", "duration": "192.470204", "bit_rate": "320512"}
    }"#;

    #[test]
    fn test_parse_probe_output() {
        let asset = parse_probe_output(Path::new("/tmp/beat.mp3"), PROBE_JSON).unwrap();
        assert_eq!(asset.path, Path::new("/tmp/beat.mp3"));
        assert_eq!(asset.sample_rate, Some(44100));
        assert_eq!(asset.channel_count, Some(2));
        assert!((asset.duration_seconds.unwrap() - 192.470204).abs() < 1e-9);
    }

    #[test]
    fn test_parse_probe_output_without_audio_stream() {
        let json = r#"{"streams": [{"codec_type": "video"}], "format": {"duration": "1.0"}}"#;
        let result = parse_probe_output(Path::new("/tmp/clip.mp4"), json);
        assert!(matches!(result, Err(ProbeError::InvalidOutput(_))));
    }

    #[test]
    fn test_parse_probe_output_invalid_json() {
        let result = parse_probe_output(Path::new("/tmp/x.wav"), "not json");
        assert!(matches!(result, Err(ProbeError::InvalidOutput(_))));
    }

    #[test]
    fn test_probe_args_end_with_path() {
        let args = probe_args(Path::new("/tmp/take.wav"));
        assert_eq!(args.last().map(String::as_str), Some("/tmp/take.wav"));
        assert!(args.contains(&"-show_streams".to_string()));
    }
}
