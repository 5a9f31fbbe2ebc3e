use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use tracing::warn;

use crate::config::ProgressBand;
use crate::pipeline::context::PipelineContext;
use crate::pipeline::error::StageError;
use crate::pipeline::stage::{Stage, StageProgress};
use crate::tools::{Tool, ToolInvocation, ToolInvoker};

/// Checks the media tools are installed, then reads the audio duration with
/// ffprobe and enforces the length limit.
pub struct DurationProbeStage {
    invoker: Arc<dyn ToolInvoker>,
    timeout: Duration,
    max_duration_secs: u64,
    band: ProgressBand,
}

#[derive(Debug, Deserialize)]
struct ProbeOutput {
    format: ProbeFormat,
}

#[derive(Debug, Deserialize)]
struct ProbeFormat {
    /// ffprobe prints the duration as a string; accept a number as well.
    duration: Option<serde_json::Value>,
}

impl DurationProbeStage {
    pub fn new(
        invoker: Arc<dyn ToolInvoker>,
        timeout: Duration,
        max_duration_secs: u64,
        band: ProgressBand,
    ) -> Self {
        Self {
            invoker,
            timeout,
            max_duration_secs,
            band,
        }
    }
}

fn parse_duration(stdout: &str) -> Result<f64, StageError> {
    let probe: ProbeOutput = serde_json::from_str(stdout).map_err(|source| StageError::Parse {
        what: "ffprobe output",
        source,
    })?;

    let duration = match probe.format.duration {
        Some(serde_json::Value::String(s)) => s.trim().parse::<f64>().ok(),
        Some(serde_json::Value::Number(n)) => n.as_f64(),
        _ => None,
    };

    match duration {
        Some(d) if d.is_finite() && d > 0.0 => Ok(d),
        Some(d) => Err(StageError::InvalidOutput {
            tool: Tool::Ffprobe,
            reason: format!("unusable duration {}", d),
        }),
        None => Err(StageError::InvalidOutput {
            tool: Tool::Ffprobe,
            reason: "no duration reported".to_string(),
        }),
    }
}

impl Stage for DurationProbeStage {
    fn name(&self) -> &'static str {
        "probe"
    }

    fn label(&self) -> &'static str {
        "Duration probe"
    }

    fn band(&self) -> ProgressBand {
        self.band
    }

    fn announcement(&self) -> String {
        "Analysing audio file".to_string()
    }

    fn run(&self, ctx: &mut PipelineContext, _progress: &StageProgress<'_>) -> Result<(), StageError> {
        if !ctx.audio_path.is_file() {
            return Err(StageError::io(
                &ctx.audio_path,
                std::io::Error::new(std::io::ErrorKind::NotFound, "audio file not found"),
            ));
        }

        self.invoker.ensure_available(Tool::Ffmpeg)?;
        if let Err(e) = self.invoker.ensure_available(Tool::Whisper) {
            warn!(job_id = %ctx.job_id, error = %e, "transcriber unavailable");
            ctx.log(format!("{}. Fallback subtitles will be used.", e));
        }

        let invocation = ToolInvocation::new(Tool::Ffprobe, self.timeout)
            .args(["-v", "error", "-show_entries", "format=duration", "-of", "json"])
            .arg(ctx.audio_path.to_string_lossy());
        let output = self
            .invoker
            .invoke(&invocation)?
            .ensure_success(Tool::Ffprobe)?;

        let duration = parse_duration(&output.stdout)?;
        ctx.log(format!("Duration: {:.1}s", duration));
        ctx.duration_secs = Some(duration);

        if duration > self.max_duration_secs as f64 {
            return Err(StageError::DurationLimit {
                duration,
                max: self.max_duration_secs,
            });
        }
        Ok(())
    }
}
