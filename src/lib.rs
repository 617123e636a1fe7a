//! Recording Studio audio pipeline.
//!
//! Mixdown/mastering, frequency-band stem export and PowerTune analysis
//! (key, tempo, loudness, duration) built on top of ffmpeg subprocesses.

pub mod analysis;
pub mod asset;
pub mod config;
pub mod export_layout;
pub mod filter_graph;
pub mod mixdown;
pub mod stems;
pub mod tool;
pub mod track_store;

// Re-export commonly used types for convenience
pub use analysis::{AnalysisMethod, AnalysisResult, AudioAnalyzer};
pub use asset::AudioAsset;
pub use mixdown::{MixJob, MixResult, MixdownEngine, MixdownError};
pub use stems::{StemExportError, StemExportResult, StemExporter};
pub use tool::{ExternalTool, FfmpegTool, ToolOutput, ToolProgram};
pub use track_store::{RecordType, SqliteTrackStore, TrackStore};
