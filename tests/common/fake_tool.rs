//! Scripted stand-in for ffmpeg/ffprobe.

use async_trait::async_trait;
use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;
use studio_pipeline::tool::{ExternalTool, ToolError, ToolOutput, ToolProgram};

/// Canned response to one invocation.
#[derive(Debug, Clone)]
pub struct Reply {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
    /// Create the output file named by the last argument.
    pub writes_output: bool,
    pub delay: Option<Duration>,
}

impl Reply {
    pub fn ok() -> Self {
        Self {
            exit_code: 0,
            stdout: String::new(),
            stderr: String::new(),
            writes_output: true,
            delay: None,
        }
    }

    pub fn failed(exit_code: i32, stderr: &str) -> Self {
        Self {
            exit_code,
            stderr: stderr.to_string(),
            writes_output: false,
            ..Self::ok()
        }
    }

    pub fn with_stdout(mut self, stdout: &str) -> Self {
        self.stdout = stdout.to_string();
        self
    }

    pub fn with_stderr(mut self, stderr: &str) -> Self {
        self.stderr = stderr.to_string();
        self
    }

    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}

#[derive(Debug, Clone)]
pub struct ToolCall {
    pub program: ToolProgram,
    pub args: Vec<String>,
}

impl ToolCall {
    pub fn has_arg_containing(&self, needle: &str) -> bool {
        self.args.iter().any(|a| a.contains(needle))
    }

    pub fn arg_after(&self, flag: &str) -> Option<&str> {
        let pos = self.args.iter().position(|a| a == flag)?;
        self.args.get(pos + 1).map(|s| s.as_str())
    }
}

struct Rule {
    program: Option<ToolProgram>,
    needle: Option<String>,
    reply: Reply,
}

impl Rule {
    fn matches(&self, program: ToolProgram, args: &[String]) -> bool {
        if self.program.is_some_and(|p| p != program) {
            return false;
        }
        match &self.needle {
            Some(needle) => args.iter().any(|a| a.contains(needle.as_str())),
            None => true,
        }
    }
}

/// First matching rule wins; unmatched invocations get [`Reply::ok`].
#[derive(Default)]
pub struct FakeTool {
    rules: Vec<Rule>,
    calls: Mutex<Vec<ToolCall>>,
}

impl FakeTool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reply to any invocation with an argument containing `needle`.
    pub fn when_arg(mut self, needle: &str, reply: Reply) -> Self {
        self.rules.push(Rule {
            program: None,
            needle: Some(needle.to_string()),
            reply,
        });
        self
    }

    pub fn when_program(mut self, program: ToolProgram, reply: Reply) -> Self {
        self.rules.push(Rule {
            program: Some(program),
            needle: None,
            reply,
        });
        self
    }

    /// Reply to everything not matched by an earlier rule.
    pub fn otherwise(mut self, reply: Reply) -> Self {
        self.rules.push(Rule {
            program: None,
            needle: None,
            reply,
        });
        self
    }

    pub fn calls(&self) -> Vec<ToolCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_containing(&self, needle: &str) -> Vec<ToolCall> {
        self.calls()
            .into_iter()
            .filter(|c| c.has_arg_containing(needle))
            .collect()
    }

    fn reply_for(&self, program: ToolProgram, args: &[String]) -> Reply {
        self.rules
            .iter()
            .find(|r| r.matches(program, args))
            .map(|r| r.reply.clone())
            .unwrap_or_else(Reply::ok)
    }
}

fn looks_like_output_file(arg: &str) -> bool {
    [".wav", ".mp3"].iter().any(|ext| arg.ends_with(ext))
}

#[async_trait]
impl ExternalTool for FakeTool {
    async fn run(&self, program: ToolProgram, args: &[String]) -> Result<ToolOutput, ToolError> {
        self.calls.lock().unwrap().push(ToolCall {
            program,
            args: args.to_vec(),
        });

        let reply = self.reply_for(program, args);
        if let Some(delay) = reply.delay {
            tokio::time::sleep(delay).await;
        }

        if reply.writes_output && program == ToolProgram::Ffmpeg {
            if let Some(last) = args.last().filter(|a| looks_like_output_file(a)) {
                let output = Path::new(last);
                if output.parent().is_some_and(|p| p.is_dir()) {
                    std::fs::write(output, b"RIFF\0\0\0\0WAVEfake")?;
                }
            }
        }

        Ok(ToolOutput {
            stdout: reply.stdout,
            stderr: reply.stderr,
            exit_code: Some(reply.exit_code),
        })
    }
}
