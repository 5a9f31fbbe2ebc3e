pub mod config;
pub mod db;
pub mod error;
pub mod images;
pub mod logging;
pub mod orchestrator;
pub mod pipeline;
pub mod store;
pub mod tools;
pub mod worker;

pub use config::{load_config, Config};
pub use error::{ConfigError, IntakeError, Result, VoxreelError, WorkerError};
pub use orchestrator::{JobSummary, JobView, Orchestrator, OrchestratorError, OutputFile, SubmitResponse};
pub use pipeline::{Pipeline, PipelineConfig, PipelineContext, PipelineOutcome};
pub use store::{Job, JobStatus, JobStore, JobUpdate, StoreError};
pub use tools::{ProcessInvoker, Tool, ToolError, ToolInvoker};
pub use worker::{JobExecutor, WorkerPool};
