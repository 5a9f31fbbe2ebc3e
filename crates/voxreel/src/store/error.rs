use thiserror::Error;

use super::model::JobStatus;
use crate::db::DatabaseError;

/// Errors from job store operations.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Job not found: {0}")]
    NotFound(String),

    /// The database could not be read or written.
    #[error("Store I/O error: {0}")]
    Database(#[from] DatabaseError),

    #[error("Invalid transition for job {id}: {from} -> {to}")]
    InvalidTransition {
        id: String,
        from: JobStatus,
        to: JobStatus,
    },

    #[error("Progress for job {id} cannot go from {current} back to {requested}")]
    ProgressRegression {
        id: String,
        current: u8,
        requested: u8,
    },

    #[error("Progress {value} for job {id} is outside 0..=100")]
    ProgressOutOfRange { id: String, value: u8 },

    #[error("Job {id} cannot be marked failed without an error message")]
    MissingError { id: String },

    #[error("Corrupt record for job {id}: {reason}")]
    CorruptRecord { id: String, reason: String },
}

impl From<rusqlite::Error> for StoreError {
    fn from(e: rusqlite::Error) -> Self {
        StoreError::Database(DatabaseError::Sqlite(e))
    }
}
