//! Temporary workspaces and canned tool output.

use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// `loudnorm=print_format=json` summary as ffmpeg prints it on stderr.
pub const LOUDNORM_STDERR: &str = r#"Input #0, wav, from 'take.wav':
  Duration: 00:03:12.45, bitrate: 1411 kb/s
[Parsed_loudnorm_0 @ 0x55d0c8a2f340]
{
	"input_i" : "-9.81",
	"input_tp" : "0.42",
	"input_lra" : "5.60",
	"input_thresh" : "-20.05",
	"output_i" : "-24.43",
	"output_tp" : "-2.00",
	"output_lra" : "4.70",
	"output_thresh" : "-34.57",
	"normalization_type" : "dynamic",
	"target_offset" : "0.43"
}
"#;

pub const VOLUMEDETECT_STDERR: &str = "[Parsed_volumedetect_0 @ 0x1] n_samples: 8467200
[Parsed_volumedetect_0 @ 0x1] mean_volume: -20.5 dB
[Parsed_volumedetect_0 @ 0x1] max_volume: -1.5 dB
";

/// Five onsets half a second apart.
pub const ONSETS_120_BPM_STDERR: &str = "[silencedetect @ 0x1] silence_end: 1.000 | silence_duration: 0.12
[silencedetect @ 0x1] silence_end: 1.500 | silence_duration: 0.12
[silencedetect @ 0x1] silence_end: 2.000 | silence_duration: 0.12
[silencedetect @ 0x1] silence_end: 2.500 | silence_duration: 0.12
[silencedetect @ 0x1] silence_end: 3.000 | silence_duration: 0.12
";

pub const PROBE_DURATION_JSON: &str = r#"{"format": {"filename": "take.wav", "duration": "192.450000"}}"#;

/// A temporary directory holding input takes and an exports root.
pub struct TestWorkspace {
    pub dir: TempDir,
    pub exports_dir: PathBuf,
}

impl TestWorkspace {
    pub fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let exports_dir = dir.path().join("exports");
        Self { dir, exports_dir }
    }

    /// Write a small non-empty audio file named `name`.
    pub fn audio_file(&self, name: &str) -> PathBuf {
        let path = self.dir.path().join(name);
        std::fs::write(&path, b"RIFF\0\0\0\0WAVEtake").unwrap();
        path
    }

    pub fn empty_file(&self, name: &str) -> PathBuf {
        let path = self.dir.path().join(name);
        std::fs::write(&path, b"").unwrap();
        path
    }

    pub fn missing_file(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }
}

pub fn list_dir(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
        .collect();
    names.sort();
    names
}
