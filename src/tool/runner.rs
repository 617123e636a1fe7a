//! Subprocess execution for ffmpeg/ffprobe.

use async_trait::async_trait;
use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::process::Command;
use tracing::{debug, trace};

/// Default upper bound for a single tool invocation.
pub const DEFAULT_TOOL_TIMEOUT: Duration = Duration::from_secs(600);

/// Which binary of the external toolkit to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ToolProgram {
    Ffmpeg,
    Ffprobe,
}

impl ToolProgram {
    pub fn as_str(&self) -> &'static str {
        match self {
            ToolProgram::Ffmpeg => "ffmpeg",
            ToolProgram::Ffprobe => "ffprobe",
        }
    }
}

impl fmt::Display for ToolProgram {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors raised while running an external tool.
///
/// A non-zero exit status is not an error at this level: callers decide
/// whether it is fatal or triggers a fallback.
#[derive(Debug, Error)]
pub enum ToolError {
    #[error("failed to spawn {program}: {source}")]
    Spawn {
        program: ToolProgram,
        #[source]
        source: std::io::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{program} timed out after {timeout:?}")]
    Timeout {
        program: ToolProgram,
        timeout: Duration,
    },

    #[error("{program} failed: {message}")]
    Failed {
        program: ToolProgram,
        message: String,
    },
}

/// Captured result of one tool invocation.
#[derive(Debug, Clone, Default)]
pub struct ToolOutput {
    pub stdout: String,
    pub stderr: String,
    /// `None` when the process was terminated by a signal.
    pub exit_code: Option<i32>,
}

impl ToolOutput {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }

    /// The last `max_lines` non-empty lines of stderr, for error messages.
    pub fn stderr_tail(&self, max_lines: usize) -> String {
        let lines: Vec<&str> = self
            .stderr
            .lines()
            .filter(|l| !l.trim().is_empty())
            .collect();
        let start = lines.len().saturating_sub(max_lines);
        lines[start..].join("\n")
    }

    /// Describe a failed invocation.
    pub fn failure_message(&self) -> String {
        let status = match self.exit_code {
            Some(code) => format!("exit code {}", code),
            None => "terminated by signal".to_string(),
        };
        let tail = self.stderr_tail(5);
        if tail.is_empty() {
            status
        } else {
            format!("{}: {}", status, tail)
        }
    }

    /// Turn a non-zero exit into [`ToolError::Failed`].
    pub fn ensure_success(self, program: ToolProgram) -> Result<Self, ToolError> {
        if self.success() {
            Ok(self)
        } else {
            Err(ToolError::Failed {
                program,
                message: self.failure_message(),
            })
        }
    }
}

/// Runs the external audio-processing tool.
///
/// Implementations must wait for the process to exit and hand back its
/// full stdout/stderr; the pipeline parses figures out of both.
#[async_trait]
pub trait ExternalTool: Send + Sync {
    async fn run(&self, program: ToolProgram, args: &[String]) -> Result<ToolOutput, ToolError>;
}

/// [`ExternalTool`] backed by real ffmpeg/ffprobe binaries.
#[derive(Debug, Clone)]
pub struct FfmpegTool {
    ffmpeg_path: PathBuf,
    ffprobe_path: PathBuf,
    timeout: Duration,
}

impl FfmpegTool {
    pub fn new(ffmpeg_path: PathBuf, ffprobe_path: PathBuf, timeout: Duration) -> Self {
        Self {
            ffmpeg_path,
            ffprobe_path,
            timeout,
        }
    }

    /// Binaries resolved from `PATH`, default timeout.
    pub fn with_defaults() -> Self {
        Self::new(
            PathBuf::from("ffmpeg"),
            PathBuf::from("ffprobe"),
            DEFAULT_TOOL_TIMEOUT,
        )
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    fn binary(&self, program: ToolProgram) -> &Path {
        match program {
            ToolProgram::Ffmpeg => &self.ffmpeg_path,
            ToolProgram::Ffprobe => &self.ffprobe_path,
        }
    }

    async fn run_to_exit(
        &self,
        program: ToolProgram,
        args: &[String],
    ) -> Result<ToolOutput, ToolError> {
        // kill_on_drop: a timed out or abandoned invocation takes its child down with it.
        let mut child = Command::new(self.binary(program))
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| ToolError::Spawn { program, source })?;

        let stdout_pipe = child.stdout.take();
        let stderr_pipe = child.stderr.take();

        let read_stdout = async move {
            let mut buf = Vec::new();
            if let Some(mut pipe) = stdout_pipe {
                pipe.read_to_end(&mut buf).await?;
            }
            Ok::<_, std::io::Error>(String::from_utf8_lossy(&buf).to_string())
        };

        // ffmpeg reports everything on stderr; consume it as it arrives.
        let read_stderr = async move {
            let mut collected = String::new();
            if let Some(pipe) = stderr_pipe {
                let mut reader = BufReader::new(pipe);
                let mut line = Vec::new();
                loop {
                    line.clear();
                    if reader.read_until(b'\n', &mut line).await? == 0 {
                        break;
                    }
                    let text = String::from_utf8_lossy(&line);
                    if is_progress_line(&text) {
                        trace!(program = %program, "{}", text.trim_end());
                    }
                    collected.push_str(&text);
                }
            }
            Ok::<_, std::io::Error>(collected)
        };

        let (stdout, stderr, status) = tokio::join!(read_stdout, read_stderr, child.wait());

        Ok(ToolOutput {
            stdout: stdout?,
            stderr: stderr?,
            exit_code: status?.code(),
        })
    }
}

#[async_trait]
impl ExternalTool for FfmpegTool {
    async fn run(&self, program: ToolProgram, args: &[String]) -> Result<ToolOutput, ToolError> {
        debug!("Running {} {}", program, args.join(" "));

        let output = tokio::time::timeout(self.timeout, self.run_to_exit(program, args))
            .await
            .map_err(|_| ToolError::Timeout {
                program,
                timeout: self.timeout,
            })??;

        debug!(
            program = %program,
            exit_code = ?output.exit_code,
            "Tool invocation finished"
        );
        Ok(output)
    }
}

fn is_progress_line(line: &str) -> bool {
    line.contains("time=") && (line.contains("size=") || line.contains("speed="))
}
