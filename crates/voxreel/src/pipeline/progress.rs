use std::path::PathBuf;
use std::sync::Mutex;

use crate::store::{JobStore, JobUpdate, StoreError};

/// Events emitted by the pipeline while running a job.
#[derive(Debug, Clone, PartialEq)]
pub enum ProgressEvent {
    StageStarted {
        stage: &'static str,
        progress: u8,
        message: String,
    },
    /// Intermediate progress from inside a stage, within its band.
    StageProgress {
        stage: &'static str,
        progress: u8,
        logs: Vec<String>,
    },
    StageCompleted {
        stage: &'static str,
        progress: u8,
        logs: Vec<String>,
    },
    /// The run succeeded. Artifacts are recorded on the job only here.
    Completed {
        output_path: PathBuf,
        /// Subtitle artifact and whether it is the fallback placeholder.
        subtitle: Option<(PathBuf, bool)>,
        logs: Vec<String>,
    },
    Failed {
        error: String,
        logs: Vec<String>,
    },
}

impl ProgressEvent {
    /// The store update that persists this event.
    pub fn to_update(&self) -> JobUpdate {
        match self {
            ProgressEvent::StageStarted {
                progress, message, ..
            } => JobUpdate::new().progress(*progress).log(message.clone()),
            ProgressEvent::StageProgress { progress, logs, .. }
            | ProgressEvent::StageCompleted { progress, logs, .. } => {
                JobUpdate::new().progress(*progress).logs(logs.iter().cloned())
            }
            ProgressEvent::Completed {
                output_path,
                subtitle,
                logs,
            } => {
                let update = JobUpdate::new().logs(logs.iter().cloned());
                let update = match subtitle {
                    Some((path, fallback)) => update.subtitle(path.clone(), *fallback),
                    None => update,
                };
                update.done(output_path.clone())
            }
            ProgressEvent::Failed { error, logs } => JobUpdate::new()
                .logs(logs.iter().cloned())
                .failed(error.clone()),
        }
    }
}

/// Receives pipeline progress. A reporting error aborts the run.
pub trait ProgressReporter: Send + Sync {
    fn report(&self, event: ProgressEvent) -> Result<(), StoreError>;
}

/// No-op reporter for unit tests.
pub struct NoopProgress;

impl ProgressReporter for NoopProgress {
    fn report(&self, _event: ProgressEvent) -> Result<(), StoreError> {
        Ok(())
    }
}

/// Persists every event to the job store.
pub struct StoreProgress {
    store: JobStore,
    job_id: String,
}

impl StoreProgress {
    pub fn new(store: JobStore, job_id: impl Into<String>) -> Self {
        Self {
            store,
            job_id: job_id.into(),
        }
    }
}

impl ProgressReporter for StoreProgress {
    fn report(&self, event: ProgressEvent) -> Result<(), StoreError> {
        self.store.apply_update(&self.job_id, event.to_update())?;
        Ok(())
    }
}

/// Keeps every event in memory.
#[derive(Default)]
pub struct RecordingProgress {
    events: Mutex<Vec<ProgressEvent>>,
}

impl RecordingProgress {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<ProgressEvent> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }
}

impl ProgressReporter for RecordingProgress {
    fn report(&self, event: ProgressEvent) -> Result<(), StoreError> {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
        Ok(())
    }
}
