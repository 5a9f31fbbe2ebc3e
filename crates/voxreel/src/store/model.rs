//! Job record, status machine and partial updates.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::error::StoreError;
use crate::db::job_repo::JobRow;

/// Lifecycle status of a job.
///
/// Transitions only ever move forward: `Queued -> Processing -> Done | Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Queued,
    Processing,
    Done,
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Queued => "queued",
            JobStatus::Processing => "processing",
            JobStatus::Done => "done",
            JobStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Done | JobStatus::Failed)
    }

    /// Whether moving from `self` to `next` is a legal forward step.
    pub fn can_transition_to(&self, next: JobStatus) -> bool {
        matches!(
            (self, next),
            (JobStatus::Queued, JobStatus::Processing)
                | (JobStatus::Processing, JobStatus::Done)
                | (JobStatus::Processing, JobStatus::Failed)
        )
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "queued" => Ok(JobStatus::Queued),
            "processing" => Ok(JobStatus::Processing),
            "done" => Ok(JobStatus::Done),
            "failed" => Ok(JobStatus::Failed),
            other => Err(format!("unknown job status '{}'", other)),
        }
    }
}

/// A job as seen by readers of the store.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    pub id: String,
    pub status: JobStatus,
    /// 0 to 100, never decreasing.
    pub progress: u8,
    pub audio_path: PathBuf,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_path: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subtitle_path: Option<PathBuf>,
    /// True when the subtitle file is the placeholder written after a
    /// transcription failure.
    pub subtitle_fallback: bool,
    pub logs: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Job {
    pub(crate) fn from_row(row: JobRow, logs: Vec<String>) -> Result<Self, StoreError> {
        let status = row
            .status
            .parse::<JobStatus>()
            .map_err(|reason| StoreError::CorruptRecord {
                id: row.id.clone(),
                reason,
            })?;

        Ok(Self {
            status,
            progress: row.progress,
            audio_path: PathBuf::from(row.audio_path),
            output_path: row.output_path.map(PathBuf::from),
            subtitle_path: row.subtitle_path.map(PathBuf::from),
            subtitle_fallback: row.subtitle_fallback,
            logs,
            error: row.error,
            created_at: parse_timestamp(&row.created_at),
            updated_at: parse_timestamp(&row.updated_at),
            id: row.id,
        })
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}

fn parse_timestamp(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|e| {
            log::warn!("parse_timestamp: failed to parse '{}': {}", s, e);
            Utc::now()
        })
}

/// A partial update merged into a job by `JobStore::apply_update`.
///
/// Fields left unset keep their stored value. Terminal status and error are
/// only set together, through [`JobUpdate::done`] and [`JobUpdate::failed`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct JobUpdate {
    pub(crate) progress: Option<u8>,
    pub(crate) logs: Vec<String>,
    pub(crate) output_path: Option<PathBuf>,
    pub(crate) subtitle_path: Option<PathBuf>,
    pub(crate) subtitle_fallback: Option<bool>,
    pub(crate) status: Option<JobStatus>,
    pub(crate) error: Option<String>,
}

impl JobUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn progress(mut self, progress: u8) -> Self {
        self.progress = Some(progress);
        self
    }

    pub fn log(mut self, line: impl Into<String>) -> Self {
        self.logs.push(line.into());
        self
    }

    pub fn logs<I, S>(mut self, lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.logs.extend(lines.into_iter().map(Into::into));
        self
    }

    pub fn subtitle(mut self, path: impl Into<PathBuf>, fallback: bool) -> Self {
        self.subtitle_path = Some(path.into());
        self.subtitle_fallback = Some(fallback);
        self
    }

    /// Marks the job `Done` with its final output. Progress becomes 100.
    pub fn done(mut self, output_path: impl Into<PathBuf>) -> Self {
        self.status = Some(JobStatus::Done);
        self.output_path = Some(output_path.into());
        self
    }

    pub fn failed(mut self, error: impl Into<String>) -> Self {
        self.status = Some(JobStatus::Failed);
        self.error = Some(error.into());
        self
    }
}
