//! Runs tools as child processes on a lazily built tokio runtime.

use std::path::PathBuf;
use std::process::Stdio;
use std::sync::OnceLock;
use std::time::Duration;

use moka::sync::Cache;
use tokio::process::Command;
use tokio::runtime::Runtime;
use tracing::{debug, warn};

use super::{Tool, ToolError, ToolInvocation, ToolInvoker, ToolOutput};
use crate::config::ToolsConfig;

/// How long a resolved program path is trusted before `which` runs again.
const RESOLVE_TTL: Duration = Duration::from_secs(300);

pub struct ProcessInvoker {
    ffprobe: String,
    ffmpeg: String,
    whisper: String,
    runtime: OnceLock<Runtime>,
    resolved: Cache<Tool, PathBuf>,
}

impl ProcessInvoker {
    pub fn new(config: &ToolsConfig) -> Self {
        Self {
            ffprobe: config.ffprobe.clone(),
            ffmpeg: config.ffmpeg.clone(),
            whisper: config.whisper.clone(),
            runtime: OnceLock::new(),
            resolved: Cache::builder()
                .max_capacity(8)
                .time_to_live(RESOLVE_TTL)
                .build(),
        }
    }

    fn program(&self, tool: Tool) -> &str {
        match tool {
            Tool::Ffprobe => &self.ffprobe,
            Tool::Ffmpeg => &self.ffmpeg,
            Tool::Whisper => &self.whisper,
        }
    }

    /// Resolves the configured program for `tool` to an executable path.
    pub fn resolve(&self, tool: Tool) -> Result<PathBuf, ToolError> {
        if let Some(path) = self.resolved.get(&tool) {
            return Ok(path);
        }
        let program = self.program(tool);
        let path = which::which(program).map_err(|_| ToolError::NotFound {
            tool,
            program: program.to_string(),
        })?;
        debug!(%tool, path = %path.display(), "resolved tool");
        self.resolved.insert(tool, path.clone());
        Ok(path)
    }

    /// Shared runtime, built on first use.
    fn runtime(&self, tool: Tool) -> Result<&Runtime, ToolError> {
        if let Some(runtime) = self.runtime.get() {
            return Ok(runtime);
        }
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .thread_name("voxreel-tools")
            .enable_all()
            .build()
            .map_err(|source| ToolError::Io { tool, source })?;
        // A concurrent caller may have won the race; its runtime is kept.
        let _ = self.runtime.set(runtime);
        self.runtime
            .get()
            .ok_or_else(|| ToolError::Io {
                tool,
                source: std::io::Error::other("tool runtime unavailable"),
            })
    }
}

impl ToolInvoker for ProcessInvoker {
    fn invoke(&self, invocation: &ToolInvocation) -> Result<ToolOutput, ToolError> {
        let program = self.resolve(invocation.tool)?;
        let runtime = self.runtime(invocation.tool)?;
        debug!(
            tool = %invocation.tool,
            args = ?invocation.args,
            timeout_secs = invocation.timeout.as_secs(),
            "invoking tool"
        );
        runtime.block_on(run(invocation, program))
    }

    fn ensure_available(&self, tool: Tool) -> Result<(), ToolError> {
        self.resolve(tool).map(|_| ())
    }
}

async fn run(invocation: &ToolInvocation, program: PathBuf) -> Result<ToolOutput, ToolError> {
    let tool = invocation.tool;
    let child = Command::new(&program)
        .args(&invocation.args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|source| ToolError::Spawn { tool, source })?;

    // On timeout the dropped future drops the child, and kill_on_drop reaps it.
    match tokio::time::timeout(invocation.timeout, child.wait_with_output()).await {
        Ok(Ok(output)) => Ok(ToolOutput {
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            exit_code: output.status.code(),
        }),
        Ok(Err(source)) => Err(ToolError::Io { tool, source }),
        Err(_) => {
            warn!(
                %tool,
                timeout_secs = invocation.timeout.as_secs(),
                "tool timed out, killing process"
            );
            Err(ToolError::Timeout {
                tool,
                secs: invocation.timeout.as_secs(),
            })
        }
    }
}
