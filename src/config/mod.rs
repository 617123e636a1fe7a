mod file_config;

pub use file_config::{AnalysisConfig, FileConfig};

use crate::analysis::AnalyzerSettings;
use crate::tool::FfmpegTool;
use anyhow::{bail, Result};
use std::path::PathBuf;
use std::time::Duration;

const DEFAULT_EXPORTS_DIR: &str = "exports";

/// CLI arguments that can be used for config resolution.
/// This struct mirrors the CLI arguments that can be overridden by TOML config.
#[derive(Debug, Clone, Default)]
pub struct CliConfig {
    pub exports_dir: Option<PathBuf>,
    pub ffmpeg_path: Option<PathBuf>,
    pub ffprobe_path: Option<PathBuf>,
    pub tool_timeout_secs: u64,
    pub track_db_path: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    // Core settings
    pub exports_dir: PathBuf,
    pub ffmpeg_path: PathBuf,
    pub ffprobe_path: PathBuf,
    pub tool_timeout_secs: u64,
    pub track_db_path: Option<PathBuf>,

    // Feature configs (with defaults)
    pub analysis: AnalysisSettings,
}

impl AppConfig {
    /// Resolve configuration from CLI arguments and optional TOML file config.
    /// TOML values override CLI values where present.
    pub fn resolve(cli: &CliConfig, file_config: Option<FileConfig>) -> Result<Self> {
        let file = file_config.unwrap_or_default();

        // TOML overrides CLI for each field
        let exports_dir = file
            .exports_dir
            .map(PathBuf::from)
            .or_else(|| cli.exports_dir.clone())
            .unwrap_or_else(|| PathBuf::from(DEFAULT_EXPORTS_DIR));

        // Created on first export, but must not be something else
        if exports_dir.exists() && !exports_dir.is_dir() {
            bail!("exports_dir is not a directory: {:?}", exports_dir);
        }

        let ffmpeg_path = file
            .ffmpeg_path
            .map(PathBuf::from)
            .or_else(|| cli.ffmpeg_path.clone())
            .unwrap_or_else(|| PathBuf::from("ffmpeg"));
        let ffprobe_path = file
            .ffprobe_path
            .map(PathBuf::from)
            .or_else(|| cli.ffprobe_path.clone())
            .unwrap_or_else(|| PathBuf::from("ffprobe"));

        let tool_timeout_secs = file.tool_timeout_secs.unwrap_or(cli.tool_timeout_secs);
        if tool_timeout_secs == 0 {
            bail!("tool_timeout_secs must be greater than zero");
        }

        let track_db_path = file
            .track_db_path
            .map(PathBuf::from)
            .or_else(|| cli.track_db_path.clone());

        // Analysis settings - merge file config with defaults
        let analysis_file = file.analysis.unwrap_or_default();
        let defaults = AnalysisSettings::default();
        let analysis = AnalysisSettings {
            batch_concurrency: analysis_file
                .batch_concurrency
                .unwrap_or(defaults.batch_concurrency),
            quick_timeout_ms: analysis_file
                .quick_timeout_ms
                .unwrap_or(defaults.quick_timeout_ms),
            tempo_window_secs: analysis_file
                .tempo_window_secs
                .unwrap_or(defaults.tempo_window_secs),
        };

        Ok(Self {
            exports_dir,
            ffmpeg_path,
            ffprobe_path,
            tool_timeout_secs,
            track_db_path,
            analysis,
        })
    }

    pub fn ffmpeg_tool(&self) -> FfmpegTool {
        FfmpegTool::new(
            self.ffmpeg_path.clone(),
            self.ffprobe_path.clone(),
            Duration::from_secs(self.tool_timeout_secs),
        )
    }

    pub fn analyzer_settings(&self) -> AnalyzerSettings {
        AnalyzerSettings {
            batch_concurrency: self.analysis.batch_concurrency,
            quick_timeout: Duration::from_millis(self.analysis.quick_timeout_ms),
            tempo_window: Duration::from_secs(self.analysis.tempo_window_secs),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AnalysisSettings {
    pub batch_concurrency: usize,
    pub quick_timeout_ms: u64,
    pub tempo_window_secs: u64,
}

impl Default for AnalysisSettings {
    fn default() -> Self {
        Self {
            batch_concurrency: 3,
            quick_timeout_ms: 5000,
            tempo_window_secs: 45,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cli_with_timeout() -> CliConfig {
        CliConfig {
            tool_timeout_secs: 600,
            ..Default::default()
        }
    }

    #[test]
    fn test_resolve_cli_only() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let cli = CliConfig {
            exports_dir: Some(temp_dir.path().to_path_buf()),
            ffmpeg_path: Some(PathBuf::from("/usr/local/bin/ffmpeg")),
            ffprobe_path: None,
            tool_timeout_secs: 300,
            track_db_path: Some(PathBuf::from("/data/tracks.db")),
        };

        let config = AppConfig::resolve(&cli, None).unwrap();

        assert_eq!(config.exports_dir, temp_dir.path());
        assert_eq!(config.ffmpeg_path, PathBuf::from("/usr/local/bin/ffmpeg"));
        assert_eq!(config.ffprobe_path, PathBuf::from("ffprobe"));
        assert_eq!(config.tool_timeout_secs, 300);
        assert_eq!(config.track_db_path, Some(PathBuf::from("/data/tracks.db")));
        assert_eq!(config.analysis.batch_concurrency, 3);
        assert_eq!(config.analysis.quick_timeout_ms, 5000);
        assert_eq!(config.analysis.tempo_window_secs, 45);
    }

    #[test]
    fn test_resolve_toml_overrides_cli() {
        let cli = CliConfig {
            exports_dir: Some(PathBuf::from("/should/be/overridden")),
            ffmpeg_path: Some(PathBuf::from("/cli/ffmpeg")),
            tool_timeout_secs: 600,
            ..Default::default()
        };

        let file_config = FileConfig {
            exports_dir: Some("/toml/exports".to_string()),
            tool_timeout_secs: Some(60),
            analysis: Some(AnalysisConfig {
                batch_concurrency: Some(8),
                ..Default::default()
            }),
            ..Default::default()
        };

        let config = AppConfig::resolve(&cli, Some(file_config)).unwrap();

        // TOML values should override CLI
        assert_eq!(config.exports_dir, PathBuf::from("/toml/exports"));
        assert_eq!(config.tool_timeout_secs, 60);
        assert_eq!(config.analysis.batch_concurrency, 8);
        // CLI value used when TOML doesn't specify
        assert_eq!(config.ffmpeg_path, PathBuf::from("/cli/ffmpeg"));
        assert_eq!(config.analysis.quick_timeout_ms, 5000);
    }

    #[test]
    fn test_resolve_defaults() {
        let config = AppConfig::resolve(&cli_with_timeout(), None).unwrap();
        assert_eq!(config.exports_dir, PathBuf::from(DEFAULT_EXPORTS_DIR));
        assert_eq!(config.ffmpeg_path, PathBuf::from("ffmpeg"));
        assert!(config.track_db_path.is_none());
    }

    #[test]
    fn test_resolve_zero_timeout_error() {
        let result = AppConfig::resolve(&CliConfig::default(), None);
        assert!(result.is_err());
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("tool_timeout_secs must be greater than zero"));
    }

    #[test]
    fn test_resolve_exports_dir_not_directory_error() {
        let temp_file = tempfile::NamedTempFile::new().unwrap();
        let cli = CliConfig {
            exports_dir: Some(temp_file.path().to_path_buf()),
            ..cli_with_timeout()
        };
        let result = AppConfig::resolve(&cli, None);
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("not a directory"));
    }

    #[test]
    fn test_tool_and_analyzer_settings() {
        let file_config = FileConfig {
            analysis: Some(AnalysisConfig {
                quick_timeout_ms: Some(1500),
                tempo_window_secs: Some(20),
                ..Default::default()
            }),
            ..Default::default()
        };
        let config = AppConfig::resolve(&cli_with_timeout(), Some(file_config)).unwrap();

        assert_eq!(config.ffmpeg_tool().timeout(), Duration::from_secs(600));

        let settings = config.analyzer_settings();
        assert_eq!(settings.batch_concurrency, 3);
        assert_eq!(settings.quick_timeout, Duration::from_millis(1500));
        assert_eq!(settings.tempo_window, Duration::from_secs(20));
    }
}
