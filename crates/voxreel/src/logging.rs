//! Process-wide log output.
//!
//! Storage code logs through the `log` facade and the pipeline through
//! `tracing`; both end up in the same `tracing-subscriber` formatter.

use thiserror::Error;
use tracing_log::LogTracer;
use tracing_subscriber::{fmt, prelude::*, EnvFilter, Registry};

use crate::config::LoggingConfig;

#[derive(Error, Debug)]
pub enum LoggingError {
    #[error("Invalid log filter '{directive}': {source}")]
    Filter {
        directive: String,
        #[source]
        source: tracing_subscriber::filter::ParseError,
    },

    #[error("Logging already initialized: {0}")]
    AlreadyInitialized(String),
}

pub fn env_filter(directive: &str) -> Result<EnvFilter, LoggingError> {
    EnvFilter::try_new(directive).map_err(|source| LoggingError::Filter {
        directive: directive.to_string(),
        source,
    })
}

/// Installs the global subscriber and routes `log` records into it.
pub fn init(config: &LoggingConfig) -> Result<(), LoggingError> {
    let filter = env_filter(&config.level)?;

    let installed = if config.json {
        let subscriber = Registry::default()
            .with(fmt::layer().json().with_current_span(true))
            .with(filter);
        tracing::subscriber::set_global_default(subscriber)
    } else {
        let subscriber = Registry::default()
            .with(fmt::layer().with_target(true).with_thread_names(true))
            .with(filter);
        tracing::subscriber::set_global_default(subscriber)
    };
    installed.map_err(|e| LoggingError::AlreadyInitialized(e.to_string()))?;

    LogTracer::init().map_err(|e| LoggingError::AlreadyInitialized(e.to_string()))?;
    Ok(())
}
