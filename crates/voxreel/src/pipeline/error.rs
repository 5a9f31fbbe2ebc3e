use std::path::PathBuf;

use thiserror::Error;

use crate::store::StoreError;
use crate::tools::{Tool, ToolError};

/// Why a single stage could not do its work.
#[derive(Error, Debug)]
pub enum StageError {
    #[error(transparent)]
    Tool(#[from] ToolError),

    #[error("Audio too long ({duration:.0}s). Max allowed: {max}s.")]
    DurationLimit { duration: f64, max: u64 },

    #[error("unexpected {tool} output: {reason}")]
    InvalidOutput { tool: Tool, reason: String },

    #[error("I/O error for path '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("could not parse {what}: {source}")]
    Parse {
        what: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("missing {0} from an earlier stage")]
    MissingInput(&'static str),

    #[error("no speech segments found")]
    NoSegments,

    /// Progress could not be persisted. Not a stage failure: the run aborts
    /// and the error surfaces from `Pipeline::run`.
    #[error(transparent)]
    Report(#[from] StoreError),
}

impl StageError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        StageError::Io {
            path: path.into(),
            source,
        }
    }

    /// Message recorded on the job when `stage` fails with this error.
    ///
    /// The duration limit is reported verbatim; everything else is prefixed
    /// with the stage label.
    pub fn failure_message(&self, stage_label: &str) -> String {
        match self {
            StageError::DurationLimit { .. } => self.to_string(),
            other => format!("{} failed: {}", stage_label, other),
        }
    }
}
