//! External audio tool (ffmpeg/ffprobe) invocation.
//!
//! Every sample-level operation of the pipeline runs through
//! [`ExternalTool`]; the pipeline itself only builds arguments and parses
//! what the tool reports.

mod probe;
mod runner;

pub use probe::{check_tools_available, probe_audio_file, ProbeError};
pub use runner::{
    ExternalTool, FfmpegTool, ToolError, ToolOutput, ToolProgram, DEFAULT_TOOL_TIMEOUT,
};
