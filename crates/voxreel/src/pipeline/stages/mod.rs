//! The concrete stages, in execution order.

use std::path::Path;

use super::error::StageError;

pub mod encode;
pub mod probe;
pub mod render;
pub mod transcribe;

pub use encode::SubtitleBurnStage;
pub use probe::DurationProbeStage;
pub use render::BackgroundRenderStage;
pub use transcribe::TranscriptionStage;

fn ensure_dir(dir: &Path) -> Result<(), StageError> {
    std::fs::create_dir_all(dir).map_err(|e| StageError::io(dir, e))
}

/// Fails unless a tool actually left a non-empty file at `path`.
fn expect_output(tool: crate::tools::Tool, path: &Path) -> Result<(), StageError> {
    match std::fs::metadata(path) {
        Ok(meta) if meta.len() > 0 => Ok(()),
        _ => Err(StageError::InvalidOutput {
            tool,
            reason: format!("no output written to {}", path.display()),
        }),
    }
}
