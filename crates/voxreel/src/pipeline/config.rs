use std::path::PathBuf;
use std::time::Duration;

use crate::config::{Config, SceneConfig, StageBands, SubtitleConfig, VideoConfig};

/// The slice of application configuration the pipeline needs.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub outputs_dir: PathBuf,
    pub max_audio_duration_secs: u64,
    pub whisper_model: String,
    pub probe_timeout: Duration,
    pub transcribe_timeout: Duration,
    pub render_timeout: Duration,
    pub encode_timeout: Duration,
    pub video: VideoConfig,
    pub subtitles: SubtitleConfig,
    pub scenes: SceneConfig,
    pub image_timeout: Duration,
    pub bands: StageBands,
}

impl PipelineConfig {
    pub fn from_config(config: &Config) -> Self {
        let tools = &config.tools;
        Self {
            outputs_dir: config.storage.outputs_dir.clone(),
            max_audio_duration_secs: config.limits.max_audio_duration_secs,
            whisper_model: tools.whisper_model.clone(),
            probe_timeout: Duration::from_secs(tools.probe_timeout_secs),
            transcribe_timeout: Duration::from_secs(tools.transcribe_timeout_secs),
            render_timeout: Duration::from_secs(tools.render_timeout_secs),
            encode_timeout: Duration::from_secs(tools.encode_timeout_secs),
            video: config.video.clone(),
            subtitles: config.subtitles.clone(),
            scenes: config.scenes.clone(),
            image_timeout: Duration::from_secs(config.scenes.request_timeout_secs),
            bands: config.stages.clone(),
        }
    }
}
