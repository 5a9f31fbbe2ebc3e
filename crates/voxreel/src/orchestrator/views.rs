//! Serializable shapes returned to clients.

use std::fs::File;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::store::{Job, JobStatus};

pub const SUBMIT_MESSAGE: &str = "Job created successfully. Processing will begin shortly.";

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitResponse {
    pub job_id: String,
    pub status: JobStatus,
    pub message: String,
}

impl SubmitResponse {
    pub fn queued(job_id: impl Into<String>) -> Self {
        Self {
            job_id: job_id.into(),
            status: JobStatus::Queued,
            message: SUBMIT_MESSAGE.to_string(),
        }
    }
}

/// Full status of one job, as polled by clients.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobView {
    pub id: String,
    pub status: JobStatus,
    pub progress: u8,
    pub logs: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub output_available: bool,
    pub subtitle_fallback: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub download_url: Option<String>,
}

impl From<Job> for JobView {
    fn from(job: Job) -> Self {
        let output_available = output_available(&job);
        Self {
            download_url: output_available.then(|| download_url(&job.id)),
            output_available,
            subtitle_fallback: job.subtitle_fallback,
            id: job.id,
            status: job.status,
            progress: job.progress,
            logs: job.logs,
            error: job.error,
            created_at: job.created_at,
            updated_at: job.updated_at,
        }
    }
}

/// One row of the job list.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobSummary {
    pub id: String,
    pub status: JobStatus,
    pub progress: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_log: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub output_available: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub download_url: Option<String>,
}

impl From<Job> for JobSummary {
    fn from(mut job: Job) -> Self {
        let output_available = output_available(&job);
        Self {
            download_url: output_available.then(|| download_url(&job.id)),
            last_log: job.logs.pop(),
            output_available,
            id: job.id,
            status: job.status,
            progress: job.progress,
            error: job.error,
            created_at: job.created_at,
            updated_at: job.updated_at,
        }
    }
}

/// An opened output video, ready to be streamed.
#[derive(Debug)]
pub struct OutputFile {
    pub file: File,
    pub path: PathBuf,
    /// Suggested download name.
    pub filename: String,
    pub content_type: String,
}

pub fn download_url(job_id: &str) -> String {
    format!("/api/jobs/{}/download", job_id)
}

pub fn download_filename(job_id: &str) -> String {
    format!("voxreel-{}.mp4", job_id)
}

fn output_available(job: &Job) -> bool {
    job.status == JobStatus::Done && job.output_path.as_ref().is_some_and(|p| p.is_file())
}
