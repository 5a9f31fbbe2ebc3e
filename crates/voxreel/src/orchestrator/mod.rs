//! The facade that ties the job store, the pipeline and the worker pool
//! together. Every method maps onto one operation of the HTTP API.

use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tracing::{info, warn};

use crate::config::Config;
use crate::error::IntakeError;
use crate::pipeline::{Pipeline, PipelineConfig};
use crate::store::{JobStatus, JobStore};
use crate::tools::{ProcessInvoker, ToolInvoker};
use crate::worker::{JobExecutor, WorkerPool};

pub mod error;
pub mod intake;
pub mod views;

pub use error::OrchestratorError;
pub use intake::UploadPolicy;
pub use views::{JobSummary, JobView, OutputFile, SubmitResponse};

/// Recorded on jobs found in `processing` when the worker starts.
pub const ORPHANED_MESSAGE: &str = "Job interrupted before completion (worker restarted)";

pub struct Orchestrator {
    config: Config,
    store: JobStore,
    invoker: Arc<dyn ToolInvoker>,
    uploads: UploadPolicy,
    pool: Mutex<Option<WorkerPool>>,
}

impl Orchestrator {
    pub fn new(config: Config, store: JobStore, invoker: Arc<dyn ToolInvoker>) -> Self {
        let uploads = UploadPolicy::from_limits(&config.limits);
        Self {
            config,
            store,
            invoker,
            uploads,
            pool: Mutex::new(None),
        }
    }

    /// Opens the store named in `config` and wires up the real tools.
    pub fn open(config: Config) -> Result<Self, OrchestratorError> {
        let store = JobStore::open(&config.storage.database_path)?;
        let invoker = Arc::new(ProcessInvoker::new(&config.tools));
        Ok(Self::new(config, store, invoker))
    }

    pub fn store(&self) -> &JobStore {
        &self.store
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Queues a job for an audio file that is already on disk.
    pub fn submit(&self, audio_path: &Path) -> Result<SubmitResponse, OrchestratorError> {
        if !audio_path.is_file() {
            return Err(IntakeError::AudioMissing(audio_path.to_path_buf()).into());
        }
        let id = self.store.create(audio_path)?;
        self.wake_workers();
        Ok(SubmitResponse::queued(id))
    }

    /// Validates and stores an uploaded file, then queues a job for it.
    ///
    /// Nothing is written and no job is created when validation fails.
    pub fn submit_upload(
        &self,
        filename: &str,
        bytes: &[u8],
    ) -> Result<SubmitResponse, OrchestratorError> {
        let size = bytes.len() as u64;
        let extension = self.uploads.validate(filename, size)?;

        let id = crate::store::new_job_id();
        let path = intake::upload_path(&self.config.storage.uploads_dir, &id, &extension);
        intake::store_upload(&path, bytes)?;

        let logs = [intake::upload_log_line(filename, size)];
        if let Err(e) = self.store.create_with_id(&id, &path, &logs) {
            if let Err(cleanup) = std::fs::remove_file(&path) {
                warn!(path = %path.display(), error = %cleanup, "could not remove orphaned upload");
            }
            return Err(e.into());
        }

        info!(job_id = %id, filename, size, "upload accepted");
        self.wake_workers();
        Ok(SubmitResponse::queued(id))
    }

    pub fn job(&self, id: &str) -> Result<JobView, OrchestratorError> {
        Ok(self.store.get(id)?.into())
    }

    /// All jobs in creation order.
    pub fn list(&self) -> Result<Vec<JobSummary>, OrchestratorError> {
        Ok(self
            .store
            .list()?
            .into_iter()
            .map(JobSummary::from)
            .collect())
    }

    /// Opens the finished video of a `Done` job.
    pub fn open_output(&self, id: &str) -> Result<OutputFile, OrchestratorError> {
        let job = self.store.get(id)?;
        if job.status != JobStatus::Done {
            return Err(OrchestratorError::NotReady {
                id: job.id,
                status: job.status,
            });
        }

        let Some(path) = job.output_path else {
            return Err(OrchestratorError::OutputMissing {
                id: job.id,
                path: None,
            });
        };
        let file = match std::fs::File::open(&path) {
            Ok(file) => file,
            Err(e) => {
                warn!(job_id = %job.id, path = %path.display(), error = %e, "output file unavailable");
                return Err(OrchestratorError::OutputMissing {
                    id: job.id,
                    path: Some(path),
                });
            }
        };

        let content_type = mime_guess::from_path(&path)
            .first_or_octet_stream()
            .essence_str()
            .to_string();
        Ok(OutputFile {
            file,
            filename: views::download_filename(&job.id),
            content_type,
            path,
        })
    }

    /// Starts the worker pool, first failing any jobs a previous run left
    /// in `processing` when `worker.reconcile_on_start` is set.
    pub fn start(&self) -> Result<(), OrchestratorError> {
        let mut pool = self.lock_pool();
        if pool.is_some() {
            return Err(crate::error::WorkerError::AlreadyRunning.into());
        }

        if self.config.worker.reconcile_on_start {
            let orphaned = self.store.fail_orphaned(ORPHANED_MESSAGE)?;
            if !orphaned.is_empty() {
                warn!(count = orphaned.len(), "failed jobs orphaned by a previous run");
            }
        }

        let pipeline = Pipeline::from_config(
            &PipelineConfig::from_config(&self.config),
            Arc::clone(&self.invoker),
        );
        let pipeline_stages = pipeline.stage_names();
        let executor = JobExecutor::new(
            self.store.clone(),
            Arc::new(pipeline),
            &self.config.storage.outputs_dir,
        );
        let worker = &self.config.worker;
        info!(
            stages = ?pipeline_stages,
            workers = worker.worker_count,
            "starting job processing"
        );
        *pool = Some(WorkerPool::start(
            executor,
            worker.worker_count,
            Duration::from_secs(worker.poll_interval_secs),
        )?);
        Ok(())
    }

    pub fn is_running(&self) -> bool {
        self.lock_pool().is_some()
    }

    /// Stops the worker pool after the jobs in flight finish.
    pub fn shutdown(&self) {
        let pool = self.lock_pool().take();
        if let Some(pool) = pool {
            pool.shutdown();
            pool.wait();
        }
    }

    fn wake_workers(&self) {
        if let Some(pool) = self.lock_pool().as_ref() {
            pool.wake();
        }
    }

    fn lock_pool(&self) -> MutexGuard<'_, Option<WorkerPool>> {
        self.pool.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Drop for Orchestrator {
    fn drop(&mut self) {
        self.shutdown();
    }
}
