//! Invocation of the external media tools (ffprobe, ffmpeg, whisper).
//!
//! Pipeline stages describe what to run as a [`ToolInvocation`] and hand it
//! to a [`ToolInvoker`]. Production uses [`ProcessInvoker`]; tests swap in a
//! scripted implementation.

use std::fmt;
use std::time::Duration;

pub mod error;
pub mod ffmpeg;
pub mod process;

pub use error::ToolError;
pub use ffmpeg::FfmpegArgs;
pub use process::ProcessInvoker;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tool {
    Ffprobe,
    Ffmpeg,
    Whisper,
}

impl Tool {
    pub fn name(&self) -> &'static str {
        match self {
            Tool::Ffprobe => "ffprobe",
            Tool::Ffmpeg => "ffmpeg",
            Tool::Whisper => "whisper",
        }
    }
}

impl fmt::Display for Tool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One bounded run of an external tool.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolInvocation {
    pub tool: Tool,
    pub args: Vec<String>,
    pub timeout: Duration,
}

impl ToolInvocation {
    pub fn new(tool: Tool, timeout: Duration) -> Self {
        Self {
            tool,
            args: Vec::new(),
            timeout,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Value following `flag` in the argument list, if any.
    pub fn flag_value(&self, flag: &str) -> Option<&str> {
        self.args
            .iter()
            .position(|a| a == flag)
            .and_then(|i| self.args.get(i + 1))
            .map(String::as_str)
    }
}

/// Captured result of a tool run that finished within its timeout.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ToolOutput {
    pub stdout: String,
    pub stderr: String,
    /// `None` when the process was terminated by a signal.
    pub exit_code: Option<i32>,
}

impl ToolOutput {
    pub fn success(stdout: impl Into<String>) -> Self {
        Self {
            stdout: stdout.into(),
            stderr: String::new(),
            exit_code: Some(0),
        }
    }

    pub fn is_success(&self) -> bool {
        self.exit_code == Some(0)
    }

    /// Turns a non-zero exit into `ToolError::NonZeroExit`.
    pub fn ensure_success(self, tool: Tool) -> Result<Self, ToolError> {
        if self.is_success() {
            Ok(self)
        } else {
            Err(ToolError::non_zero_exit(tool, self.exit_code, &self.stderr))
        }
    }
}

/// Runs external tools. Implementations must bound every call by the
/// invocation's timeout.
pub trait ToolInvoker: Send + Sync {
    fn invoke(&self, invocation: &ToolInvocation) -> Result<ToolOutput, ToolError>;

    /// Fails with `ToolError::NotFound` when `tool` cannot be run at all.
    fn ensure_available(&self, _tool: Tool) -> Result<(), ToolError> {
        Ok(())
    }
}
