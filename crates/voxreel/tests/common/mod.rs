//! Shared test utilities for voxreel integration tests.
//!
//! - `TestHarness`: isolated storage directories plus an orchestrator factory
//! - `ConfigBuilder`: configs assembled programmatically
//! - `FakeTools`: a scripted stand-in for ffprobe, whisper and ffmpeg

pub mod builders;
pub mod fake_tools;
pub mod harness;

pub use builders::*;
pub use fake_tools::{FakeTools, WhisperBehavior};
pub use harness::TestHarness;
