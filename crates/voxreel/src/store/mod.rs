//! Durable job store: the single source of truth for job state.
//!
//! Every mutation runs on the database's writer connection inside one
//! transaction, so the status machine and progress rules are checked against
//! the committed row and readers never observe a half-applied update.

use std::path::Path;

use chrono::{SecondsFormat, Utc};
use rusqlite::Connection;

use crate::db::job_repo::{self, JobRow};
use crate::db::Database;

pub mod error;
pub mod model;

pub use error::StoreError;
pub use model::{Job, JobStatus, JobUpdate};

/// Generates a fresh job id: the first 12 hex characters of a v4 UUID.
pub fn new_job_id() -> String {
    let mut id = uuid::Uuid::new_v4().simple().to_string();
    id.truncate(12);
    id
}

/// Fixed-width UTC timestamps keep `ORDER BY created_at` chronological.
fn now() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}

#[derive(Clone)]
pub struct JobStore {
    db: Database,
}

impl JobStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    pub fn open(path: &Path) -> Result<Self, StoreError> {
        Ok(Self::new(Database::open(path)?))
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        Ok(Self::new(Database::open_in_memory()?))
    }

    fn write<T>(
        &self,
        f: impl FnOnce(&mut Connection) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        self.db.with_writer(|conn| Ok(f(conn)))?
    }

    /// Runs `f` inside one read transaction, so every query in it sees the
    /// same committed snapshot.
    fn read<T>(&self, f: impl FnOnce(&Connection) -> Result<T, StoreError>) -> Result<T, StoreError> {
        self.db.with_reader(|conn| {
            let tx = conn.unchecked_transaction()?;
            let result = f(&tx);
            tx.commit()?;
            Ok(result)
        })?
    }

    /// Creates a queued job for the given audio file and returns its id.
    pub fn create(&self, audio_path: &Path) -> Result<String, StoreError> {
        let id = new_job_id();
        self.create_with_id(&id, audio_path, &[])?;
        Ok(id)
    }

    /// Creates a queued job under a caller-chosen id, with optional initial
    /// log lines. Used by intake, which names the stored upload after the id.
    pub fn create_with_id(
        &self,
        id: &str,
        audio_path: &Path,
        initial_logs: &[String],
    ) -> Result<(), StoreError> {
        let timestamp = now();
        let row = JobRow {
            id: id.to_string(),
            status: JobStatus::Queued.as_str().to_string(),
            progress: 0,
            audio_path: audio_path.to_string_lossy().into_owned(),
            output_path: None,
            subtitle_path: None,
            subtitle_fallback: false,
            error: None,
            created_at: timestamp.clone(),
            updated_at: timestamp.clone(),
        };

        self.write(|conn| {
            let tx = conn.transaction()?;
            job_repo::insert(&tx, &row)?;
            job_repo::append_logs(&tx, id, initial_logs, &timestamp)?;
            tx.commit()?;
            Ok(())
        })?;

        log::info!("Job created: {}", id);
        Ok(())
    }

    pub fn get(&self, id: &str) -> Result<Job, StoreError> {
        self.read(|conn| {
            let row =
                job_repo::find_by_id(conn, id)?.ok_or_else(|| StoreError::NotFound(id.to_string()))?;
            let logs = job_repo::logs_for(conn, id)?;
            Job::from_row(row, logs)
        })
    }

    /// All jobs in creation order.
    pub fn list(&self) -> Result<Vec<Job>, StoreError> {
        self.read(|conn| {
            let rows = job_repo::list_all(conn)?;
            let mut logs = job_repo::all_logs(conn)?;
            rows.into_iter()
                .map(|row| {
                    let lines = logs.remove(&row.id).unwrap_or_default();
                    Job::from_row(row, lines)
                })
                .collect()
        })
    }

    /// Claims the oldest queued job, moving it to `Processing`.
    ///
    /// Exactly one caller wins each job, however many threads race here.
    pub fn claim_next_queued(&self) -> Result<Option<Job>, StoreError> {
        self.write(|conn| {
            let tx = conn.transaction()?;
            let Some(row) = job_repo::claim_next_queued(&tx, &now())? else {
                return Ok(None);
            };
            let logs = job_repo::logs_for(&tx, &row.id)?;
            tx.commit()?;
            Job::from_row(row, logs).map(Some)
        })
    }

    /// Merges a partial update into a job and returns the resulting state.
    ///
    /// Rejected updates leave the stored job untouched.
    pub fn apply_update(&self, id: &str, update: JobUpdate) -> Result<Job, StoreError> {
        let job = self.write(|conn| {
            let tx = conn.transaction()?;
            let mut row =
                job_repo::find_by_id(&tx, id)?.ok_or_else(|| StoreError::NotFound(id.to_string()))?;
            let current = row
                .status
                .parse::<JobStatus>()
                .map_err(|reason| StoreError::CorruptRecord {
                    id: id.to_string(),
                    reason,
                })?;

            merge(&mut row, current, &update)?;
            row.updated_at = now();

            job_repo::update(&tx, &row)?;
            job_repo::append_logs(&tx, id, &update.logs, &row.updated_at)?;
            let logs = job_repo::logs_for(&tx, id)?;
            tx.commit()?;
            Job::from_row(row, logs)
        })?;

        if let Some(status) = update.status {
            log::debug!("Job {} is now {}", id, status);
        }
        Ok(job)
    }

    /// Appends a single log line.
    pub fn append_log(&self, id: &str, line: impl Into<String>) -> Result<Job, StoreError> {
        self.apply_update(id, JobUpdate::new().log(line))
    }

    pub fn count_by_status(&self, status: JobStatus) -> Result<u64, StoreError> {
        self.read(|conn| Ok(job_repo::count_by_status(conn, status.as_str())?))
    }

    /// Fails every job left in `Processing`, typically by a crash before the
    /// previous run could finish it. Returns the affected ids.
    pub fn fail_orphaned(&self, message: &str) -> Result<Vec<String>, StoreError> {
        let ids = self.write(|conn| {
            let tx = conn.transaction()?;
            let ids = job_repo::ids_with_status(&tx, JobStatus::Processing.as_str())?;
            let timestamp = now();
            for id in &ids {
                if let Some(mut row) = job_repo::find_by_id(&tx, id)? {
                    row.status = JobStatus::Failed.as_str().to_string();
                    row.error = Some(message.to_string());
                    row.updated_at = timestamp.clone();
                    job_repo::update(&tx, &row)?;
                    job_repo::append_logs(&tx, id, &[format!("Error: {}", message)], &timestamp)?;
                }
            }
            tx.commit()?;
            Ok(ids)
        })?;

        for id in &ids {
            log::warn!("Job {} was left processing and has been failed", id);
        }
        Ok(ids)
    }
}

/// Validates `update` against the stored row and applies it in place.
fn merge(row: &mut JobRow, current: JobStatus, update: &JobUpdate) -> Result<(), StoreError> {
    let next = update.status.unwrap_or(current);

    if current.is_terminal() || (next != current && !current.can_transition_to(next)) {
        return Err(StoreError::InvalidTransition {
            id: row.id.clone(),
            from: current,
            to: next,
        });
    }

    if let Some(progress) = update.progress {
        if progress > 100 {
            return Err(StoreError::ProgressOutOfRange {
                id: row.id.clone(),
                value: progress,
            });
        }
        if progress < row.progress {
            return Err(StoreError::ProgressRegression {
                id: row.id.clone(),
                current: row.progress,
                requested: progress,
            });
        }
        row.progress = progress;
    }

    if let Some(path) = &update.subtitle_path {
        row.subtitle_path = Some(path.to_string_lossy().into_owned());
    }
    if let Some(fallback) = update.subtitle_fallback {
        row.subtitle_fallback = fallback;
    }

    match next {
        JobStatus::Done => {
            row.progress = 100;
            if let Some(path) = &update.output_path {
                row.output_path = Some(path.to_string_lossy().into_owned());
            }
        }
        JobStatus::Failed => {
            let message = update
                .error
                .as_deref()
                .map(str::trim)
                .filter(|m| !m.is_empty())
                .ok_or_else(|| StoreError::MissingError { id: row.id.clone() })?;
            row.error = Some(message.to_string());
            row.output_path = None;
            row.subtitle_path = None;
            row.subtitle_fallback = false;
        }
        JobStatus::Queued | JobStatus::Processing => {}
    }

    row.status = next.as_str().to_string();
    Ok(())
}
