use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, error, info_span, warn};

use crate::pipeline::{Pipeline, PipelineContext, PipelineOutcome, StoreProgress};
use crate::store::{Job, JobStore, JobUpdate, StoreError};

/// Error recorded on a job when its run ends in neither success nor a
/// stage failure.
pub const UNEXPECTED_ERROR: &str = "Unexpected error while processing job";

/// What happened to one claimed job.
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessedJob {
    pub job_id: String,
    pub outcome: PipelineOutcome,
}

/// Claims queued jobs and drives them through the pipeline.
///
/// Cheap to clone; every worker thread owns one.
#[derive(Clone)]
pub struct JobExecutor {
    store: JobStore,
    pipeline: Arc<Pipeline>,
    outputs_dir: PathBuf,
}

impl JobExecutor {
    pub fn new(store: JobStore, pipeline: Arc<Pipeline>, outputs_dir: impl Into<PathBuf>) -> Self {
        Self {
            store,
            pipeline,
            outputs_dir: outputs_dir.into(),
        }
    }

    pub fn store(&self) -> &JobStore {
        &self.store
    }

    pub fn outputs_dir(&self) -> &Path {
        &self.outputs_dir
    }

    /// Claims the oldest queued job and runs it to a terminal state.
    ///
    /// Returns `Ok(None)` when the queue is empty. Only a failed claim is an
    /// error; anything that goes wrong once a job is claimed is recorded on
    /// the job itself.
    pub fn process_next(&self) -> Result<Option<ProcessedJob>, StoreError> {
        let Some(job) = self.store.claim_next_queued()? else {
            return Ok(None);
        };
        Ok(Some(self.process(&job)))
    }

    fn process(&self, job: &Job) -> ProcessedJob {
        let _span = info_span!("job", job_id = %job.id).entered();
        debug!(audio = %job.audio_path.display(), "processing job");

        let run = catch_unwind(AssertUnwindSafe(|| {
            let mut ctx = PipelineContext::for_job(job, &self.outputs_dir);
            let progress = StoreProgress::new(self.store.clone(), job.id.clone());
            self.pipeline.run(&mut ctx, &progress)
        }));

        let outcome = match run {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(e)) => {
                error!(error = %e, "could not record job progress");
                self.fail_unexpected(&job.id)
            }
            Err(payload) => {
                error!(panic = %panic_message(payload.as_ref()), "pipeline panicked");
                self.fail_unexpected(&job.id)
            }
        };

        ProcessedJob {
            job_id: job.id.clone(),
            outcome,
        }
    }

    /// Marks the job failed unless it already reached a terminal state.
    fn fail_unexpected(&self, job_id: &str) -> PipelineOutcome {
        let update = JobUpdate::new()
            .log(format!("Error: {}", UNEXPECTED_ERROR))
            .failed(UNEXPECTED_ERROR);

        match self.store.get(job_id) {
            Ok(job) if job.is_terminal() => {
                debug!(status = %job.status, "job already terminal, leaving as is");
            }
            Ok(_) => {
                if let Err(e) = self.store.apply_update(job_id, update) {
                    error!(error = %e, "could not mark job as failed");
                }
            }
            Err(e) => warn!(error = %e, "could not resolve job after unexpected error"),
        }

        PipelineOutcome::Failed {
            stage: "worker",
            error: UNEXPECTED_ERROR.to_string(),
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
