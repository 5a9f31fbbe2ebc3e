use std::path::PathBuf;

use thiserror::Error;

use crate::error::{IntakeError, WorkerError};
use crate::store::{JobStatus, StoreError};

/// Errors surfaced by the orchestrator facade.
///
/// The first three map onto client errors (404 / 400 / 404 in HTTP terms);
/// the wrapped variants are server-side failures.
#[derive(Error, Debug)]
pub enum OrchestratorError {
    #[error("Job '{0}' not found.")]
    NotFound(String),

    #[error("Video is not ready yet.")]
    NotReady { id: String, status: JobStatus },

    #[error("Video file not found on disk.")]
    OutputMissing { id: String, path: Option<PathBuf> },

    #[error(transparent)]
    Intake(#[from] IntakeError),

    #[error(transparent)]
    Store(StoreError),

    #[error(transparent)]
    Worker(#[from] WorkerError),
}

impl From<StoreError> for OrchestratorError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound(id) => OrchestratorError::NotFound(id),
            other => OrchestratorError::Store(other),
        }
    }
}

impl OrchestratorError {
    /// True for errors caused by the request rather than the server.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            OrchestratorError::NotFound(_)
                | OrchestratorError::NotReady { .. }
                | OrchestratorError::OutputMissing { .. }
                | OrchestratorError::Intake(_)
        )
    }
}
