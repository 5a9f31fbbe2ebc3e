use std::path::PathBuf;
use std::sync::Arc;

use tracing::{info, info_span, warn};

use crate::images::HttpFetcher;
use crate::store::StoreError;
use crate::tools::ToolInvoker;

use super::config::PipelineConfig;
use super::context::PipelineContext;
use super::error::StageError;
use super::progress::{ProgressEvent, ProgressReporter};
use super::stage::{FailurePolicy, Stage, StageProgress};
use super::stages::{
    BackgroundRenderStage, DurationProbeStage, SubtitleBurnStage, TranscriptionStage,
};

/// How a pipeline run ended. Both variants have already been reported.
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineOutcome {
    Completed {
        output_path: PathBuf,
        subtitle_fallback: bool,
    },
    Failed {
        stage: &'static str,
        error: String,
    },
}

pub struct Pipeline {
    stages: Vec<Box<dyn Stage>>,
}

impl Pipeline {
    /// Production constructor: the four standard stages in order.
    pub fn from_config(config: &PipelineConfig, invoker: Arc<dyn ToolInvoker>) -> Self {
        let bands = &config.bands;
        Self::with_stages(vec![
            Box::new(DurationProbeStage::new(
                Arc::clone(&invoker),
                config.probe_timeout,
                config.max_audio_duration_secs,
                bands.probe,
            )),
            Box::new(TranscriptionStage::new(
                Arc::clone(&invoker),
                config.transcribe_timeout,
                config.whisper_model.clone(),
                config.subtitles.clone(),
                bands.transcription,
            )),
            Box::new(BackgroundRenderStage::new(
                Arc::clone(&invoker),
                Arc::new(HttpFetcher::new(config.image_timeout)),
                config.render_timeout,
                config.video.clone(),
                config.scenes.clone(),
                bands.render,
            )),
            Box::new(SubtitleBurnStage::new(
                invoker,
                config.encode_timeout,
                config.video.clone(),
                bands.encode,
            )),
        ])
    }

    pub fn with_stages(stages: Vec<Box<dyn Stage>>) -> Self {
        Self { stages }
    }

    pub fn stage_names(&self) -> Vec<&'static str> {
        self.stages.iter().map(|s| s.name()).collect()
    }

    /// Runs every stage in order, reporting as it goes.
    ///
    /// Stage failures end in `PipelineOutcome::Failed`; only a reporting
    /// error is returned as `Err`, since the job state can no longer be
    /// trusted to reflect the run.
    pub fn run(
        &self,
        ctx: &mut PipelineContext,
        progress: &dyn ProgressReporter,
    ) -> Result<PipelineOutcome, StoreError> {
        let _pipeline_span = info_span!("pipeline", job_id = %ctx.job_id).entered();

        for stage in &self.stages {
            let _step = info_span!("stage", name = stage.name()).entered();
            let band = stage.band();

            progress.report(ProgressEvent::StageStarted {
                stage: stage.name(),
                progress: band.start,
                message: stage.announcement(),
            })?;

            let tracker = StageProgress::new(stage.name(), band, progress);
            match self.run_stage(stage.as_ref(), ctx, &tracker) {
                Ok(()) => {}
                Err(StageError::Report(error)) => return Err(error),
                Err(error) => return self.fail(stage.as_ref(), error, ctx, progress),
            }

            progress.report(ProgressEvent::StageCompleted {
                stage: stage.name(),
                progress: band.end,
                logs: ctx.take_logs(),
            })?;
        }

        let Some(output_path) = ctx.output_path.clone() else {
            let error = StageError::MissingInput("final video");
            let message = error.to_string();
            ctx.log(format!("Pipeline error: {}", message));
            progress.report(ProgressEvent::Failed {
                error: message.clone(),
                logs: ctx.take_logs(),
            })?;
            return Ok(PipelineOutcome::Failed {
                stage: "pipeline",
                error: message,
            });
        };

        progress.report(ProgressEvent::Completed {
            output_path: output_path.clone(),
            subtitle: ctx
                .subtitle_path
                .clone()
                .map(|path| (path, ctx.subtitle_fallback)),
            logs: vec!["Video generation complete".to_string()],
        })?;
        info!(output = %output_path.display(), "job completed");

        Ok(PipelineOutcome::Completed {
            output_path,
            subtitle_fallback: ctx.subtitle_fallback,
        })
    }

    fn run_stage(
        &self,
        stage: &dyn Stage,
        ctx: &mut PipelineContext,
        progress: &StageProgress<'_>,
    ) -> Result<(), StageError> {
        match stage.run(ctx, progress) {
            Ok(()) => Ok(()),
            Err(error @ StageError::Report(_)) => Err(error),
            Err(error) => match stage.policy() {
                FailurePolicy::Fatal => Err(error),
                FailurePolicy::Recoverable => {
                    warn!(stage = stage.name(), error = %error, "stage failed, recovering");
                    stage.recover(ctx, error)
                }
            },
        }
    }

    fn fail(
        &self,
        stage: &dyn Stage,
        error: StageError,
        ctx: &mut PipelineContext,
        progress: &dyn ProgressReporter,
    ) -> Result<PipelineOutcome, StoreError> {
        let message = error.failure_message(stage.label());
        warn!(stage = stage.name(), error = %message, "job failed");

        ctx.log(format!("Pipeline error: {}", message));
        progress.report(ProgressEvent::Failed {
            error: message.clone(),
            logs: ctx.take_logs(),
        })?;

        Ok(PipelineOutcome::Failed {
            stage: stage.name(),
            error: message,
        })
    }
}
