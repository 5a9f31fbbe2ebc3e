use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum VoxreelError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Database error: {0}")]
    Database(#[from] crate::db::DatabaseError),

    #[error("Job store error: {0}")]
    Store(#[from] crate::store::StoreError),

    #[error("Tool error: {0}")]
    Tool(#[from] crate::tools::ToolError),

    #[error("Intake error: {0}")]
    Intake(#[from] IntakeError),

    #[error("Worker error: {0}")]
    Worker(#[from] WorkerError),

    #[error("Orchestrator error: {0}")]
    Orchestrator(#[from] crate::orchestrator::OrchestratorError),

    #[error("Logging error: {0}")]
    Logging(#[from] crate::logging::LoggingError),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config JSON: {0}")]
    ParseJson(#[from] serde_json::Error),

    #[error("Config validation failed: {message}")]
    Validation { message: String },

    #[error("Invalid progress band for stage '{stage}': {reason}")]
    InvalidBand { stage: String, reason: String },

    #[error("Invalid value for environment variable {name}: '{value}'")]
    InvalidEnv { name: String, value: String },
}

/// Errors raised while accepting an uploaded audio file, before any job exists.
#[derive(Error, Debug)]
pub enum IntakeError {
    #[error("No file name provided")]
    MissingFilename,

    #[error("Unsupported file type '{extension}'. Allowed: {allowed}")]
    UnsupportedExtension { extension: String, allowed: String },

    #[error("Uploaded file is empty")]
    Empty,

    #[error("File too large ({size} bytes). Maximum size: {max_mb} MB")]
    TooLarge { size: u64, max_mb: u64 },

    #[error("Failed to write upload '{path}': {source}")]
    WriteFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Audio file not found: {0}")]
    AudioMissing(PathBuf),
}

#[derive(Error, Debug)]
pub enum WorkerError {
    #[error("Failed to spawn worker: {0}")]
    SpawnFailed(String),

    #[error("Worker pool is already running")]
    AlreadyRunning,

    #[error("Worker channel closed unexpectedly")]
    ChannelClosed,
}

pub type Result<T> = std::result::Result<T, VoxreelError>;
