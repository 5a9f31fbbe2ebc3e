pub mod config;
pub mod context;
pub mod error;
pub mod progress;
pub mod runner;
pub mod scenes;
pub mod stage;
pub mod stages;
pub mod subtitles;

pub use config::PipelineConfig;
pub use context::PipelineContext;
pub use error::StageError;
pub use progress::{NoopProgress, ProgressEvent, ProgressReporter, RecordingProgress, StoreProgress};
pub use runner::{Pipeline, PipelineOutcome};
pub use stage::{FailurePolicy, Stage, StageProgress};
