//! Validation and storage of uploaded audio.

use std::path::{Path, PathBuf};

use crate::config::LimitsConfig;
use crate::error::IntakeError;

const BYTES_PER_MB: u64 = 1024 * 1024;

/// What an upload must satisfy before a job is created for it.
#[derive(Debug, Clone)]
pub struct UploadPolicy {
    allowed_extensions: Vec<String>,
    max_bytes: u64,
}

impl UploadPolicy {
    pub fn from_limits(limits: &LimitsConfig) -> Self {
        let mut allowed_extensions: Vec<String> = limits
            .allowed_extensions
            .iter()
            .map(|e| e.trim_start_matches('.').to_ascii_lowercase())
            .collect();
        allowed_extensions.sort();
        allowed_extensions.dedup();
        Self {
            allowed_extensions,
            max_bytes: limits.max_upload_bytes,
        }
    }

    /// Checks name and size, returning the normalized extension.
    pub fn validate(&self, filename: &str, size: u64) -> Result<String, IntakeError> {
        if filename.trim().is_empty() {
            return Err(IntakeError::MissingFilename);
        }

        let extension = Path::new(filename)
            .extension()
            .map(|e| e.to_string_lossy().to_ascii_lowercase())
            .unwrap_or_default();
        if !self.allowed_extensions.contains(&extension) {
            return Err(IntakeError::UnsupportedExtension {
                extension: format!(".{}", extension),
                allowed: self.allowed_list(),
            });
        }

        if size == 0 {
            return Err(IntakeError::Empty);
        }
        if size > self.max_bytes {
            return Err(IntakeError::TooLarge {
                size,
                max_mb: self.max_bytes / BYTES_PER_MB,
            });
        }

        Ok(extension)
    }

    fn allowed_list(&self) -> String {
        self.allowed_extensions
            .iter()
            .map(|e| format!(".{}", e))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// `<uploads>/<id>.<ext>`
pub fn upload_path(uploads_dir: &Path, job_id: &str, extension: &str) -> PathBuf {
    uploads_dir.join(format!("{}.{}", job_id, extension))
}

pub fn store_upload(path: &Path, bytes: &[u8]) -> Result<(), IntakeError> {
    let write_err = |source| IntakeError::WriteFile {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(write_err)?;
    }
    std::fs::write(path, bytes).map_err(write_err)
}

/// Log line recorded on a freshly uploaded job.
pub fn upload_log_line(filename: &str, size: u64) -> String {
    format!("Audio uploaded: {} ({:.0} KB)", filename, size as f64 / 1024.0)
}
