use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use crate::config::{ProgressBand, SubtitleConfig};
use crate::pipeline::context::PipelineContext;
use crate::pipeline::error::StageError;
use crate::pipeline::stage::{FailurePolicy, Stage, StageProgress};
use crate::pipeline::subtitles::{self, Transcript};
use crate::tools::{Tool, ToolInvocation, ToolInvoker};

use super::ensure_dir;

/// Speech-to-text with word timings, written out as SRT.
///
/// Recoverable: when the transcriber fails or hears nothing, a single
/// placeholder cue covering the whole audio is written instead.
pub struct TranscriptionStage {
    invoker: Arc<dyn ToolInvoker>,
    timeout: Duration,
    model: String,
    subtitles: SubtitleConfig,
    band: ProgressBand,
}

impl TranscriptionStage {
    pub fn new(
        invoker: Arc<dyn ToolInvoker>,
        timeout: Duration,
        model: impl Into<String>,
        subtitles: SubtitleConfig,
        band: ProgressBand,
    ) -> Self {
        Self {
            invoker,
            timeout,
            model: model.into(),
            subtitles,
            band,
        }
    }

    fn transcribe(&self, audio_path: &Path, out_dir: &Path) -> Result<Transcript, StageError> {
        let invocation = ToolInvocation::new(Tool::Whisper, self.timeout)
            .arg(audio_path.to_string_lossy())
            .args(["--model", self.model.as_str()])
            .args(["--word_timestamps", "True"])
            .args(["--output_format", "json"])
            .arg("--output_dir")
            .arg(out_dir.to_string_lossy())
            .args(["--verbose", "False"]);
        self.invoker
            .invoke(&invocation)?
            .ensure_success(Tool::Whisper)?;

        let transcript_path = transcript_file(audio_path, out_dir);
        let body = std::fs::read_to_string(&transcript_path).map_err(|_| StageError::InvalidOutput {
            tool: Tool::Whisper,
            reason: format!("no transcript at {}", transcript_path.display()),
        })?;
        serde_json::from_str(&body).map_err(|source| StageError::Parse {
            what: "transcript",
            source,
        })
    }
}

/// The transcriber names its output after the input's file stem.
fn transcript_file(audio_path: &Path, out_dir: &Path) -> PathBuf {
    let stem = audio_path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "audio".to_string());
    out_dir.join(format!("{}.json", stem))
}

impl Stage for TranscriptionStage {
    fn name(&self) -> &'static str {
        "transcription"
    }

    fn label(&self) -> &'static str {
        "Transcription"
    }

    fn band(&self) -> ProgressBand {
        self.band
    }

    fn policy(&self) -> FailurePolicy {
        FailurePolicy::Recoverable
    }

    fn announcement(&self) -> String {
        format!("Transcribing audio (model: {})", self.model)
    }

    fn run(&self, ctx: &mut PipelineContext, _progress: &StageProgress<'_>) -> Result<(), StageError> {
        ensure_dir(&ctx.outputs_dir)?;
        let scratch = ctx.transcript_dir();
        ensure_dir(&scratch)?;

        let result = self.transcribe(&ctx.audio_path, &scratch);
        if let Err(e) = std::fs::remove_dir_all(&scratch) {
            debug!(path = %scratch.display(), error = %e, "could not remove transcript scratch dir");
        }
        let transcript = result?;

        if transcript.segments.is_empty() {
            return Err(StageError::NoSegments);
        }

        let cues = subtitles::word_level_cues(&transcript.segments, self.subtitles.words_per_cue);
        let srt_path = ctx.srt_path();
        subtitles::write_srt(&srt_path, &cues)?;

        ctx.log(format!(
            "Transcription complete: {} segments, {} cues",
            transcript.segments.len(),
            cues.len()
        ));
        ctx.subtitle_path = Some(srt_path);
        ctx.subtitle_fallback = false;
        ctx.segments = transcript.segments;
        Ok(())
    }

    fn recover(&self, ctx: &mut PipelineContext, error: StageError) -> Result<(), StageError> {
        warn!(job_id = %ctx.job_id, error = %error, "transcription failed, using fallback subtitles");
        ctx.log(match error {
            StageError::NoSegments => "No speech segments found, using fallback subtitles.".to_string(),
            other => format!("Transcription failed: {}. Using fallback subtitles.", other),
        });

        ensure_dir(&ctx.outputs_dir)?;
        let cue = subtitles::fallback_cue(ctx.duration_secs, &self.subtitles.fallback_text);
        let srt_path = ctx.srt_path();
        subtitles::write_srt(&srt_path, &[cue])?;

        ctx.subtitle_path = Some(srt_path);
        ctx.subtitle_fallback = true;
        ctx.segments.clear();
        Ok(())
    }
}
