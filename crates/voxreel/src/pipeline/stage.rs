use crate::config::ProgressBand;

use super::context::PipelineContext;
use super::error::StageError;
use super::progress::{ProgressEvent, ProgressReporter};

/// What the pipeline does when a stage returns an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailurePolicy {
    /// Stop the run and fail the job.
    Fatal,
    /// Call [`Stage::recover`] and continue if it succeeds.
    Recoverable,
}

/// One step of the pipeline.
pub trait Stage: Send + Sync {
    /// Short identifier used in spans and progress events.
    fn name(&self) -> &'static str;

    /// Human-readable name used in job logs and error messages.
    fn label(&self) -> &'static str;

    /// Slice of the progress scale this stage owns.
    fn band(&self) -> ProgressBand;

    fn policy(&self) -> FailurePolicy {
        FailurePolicy::Fatal
    }

    /// Log line recorded when the stage starts.
    fn announcement(&self) -> String;

    fn run(&self, ctx: &mut PipelineContext, progress: &StageProgress<'_>) -> Result<(), StageError>;

    /// Produces a substitute result after `run` failed. Only called for
    /// recoverable stages; an error here fails the job.
    fn recover(&self, _ctx: &mut PipelineContext, error: StageError) -> Result<(), StageError> {
        Err(error)
    }
}

/// Lets a running stage report how far through its band it is.
pub struct StageProgress<'a> {
    stage: &'static str,
    band: ProgressBand,
    reporter: &'a dyn ProgressReporter,
}

impl<'a> StageProgress<'a> {
    pub fn new(stage: &'static str, band: ProgressBand, reporter: &'a dyn ProgressReporter) -> Self {
        Self {
            stage,
            band,
            reporter,
        }
    }

    /// Reports `done` of `total` units of work, flushing the context's
    /// pending log lines with it.
    pub fn advance(
        &self,
        ctx: &mut PipelineContext,
        done: usize,
        total: usize,
    ) -> Result<(), StageError> {
        self.reporter.report(ProgressEvent::StageProgress {
            stage: self.stage,
            progress: self.value(done, total),
            logs: ctx.take_logs(),
        })?;
        Ok(())
    }

    fn value(&self, done: usize, total: usize) -> u8 {
        let span = usize::from(self.band.end.saturating_sub(self.band.start));
        let step = match total {
            0 => span,
            _ => span * done.min(total) / total,
        };
        self.band.start + step as u8
    }
}
