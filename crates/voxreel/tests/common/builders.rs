//! Builder for test configurations.

#![allow(dead_code)]

use std::path::{Path, PathBuf};

use voxreel::config::{Config, ProgressBand};

/// Builder for `Config` instances rooted in a test directory.
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Defaults suited to tests: storage under `root`, one worker, a short
    /// poll interval, no reconciliation and no remote image providers.
    pub fn new(root: &Path) -> Self {
        let mut config = Config::default();
        config.storage.database_path = root.join("data").join("voxreel.db");
        config.storage.uploads_dir = root.join("uploads");
        config.storage.outputs_dir = root.join("outputs");
        config.worker.poll_interval_secs = 1;
        config.worker.worker_count = 1;
        config.worker.reconcile_on_start = false;
        config.scenes.providers.clear();
        config.scenes.request_delay_ms = 0;
        Self { config }
    }

    pub fn database_path(mut self, path: PathBuf) -> Self {
        self.config.storage.database_path = path;
        self
    }

    pub fn worker_count(mut self, count: usize) -> Self {
        self.config.worker.worker_count = count;
        self
    }

    pub fn reconcile_on_start(mut self, enabled: bool) -> Self {
        self.config.worker.reconcile_on_start = enabled;
        self
    }

    pub fn max_audio_duration(mut self, secs: u64) -> Self {
        self.config.limits.max_audio_duration_secs = secs;
        self
    }

    pub fn max_upload_bytes(mut self, bytes: u64) -> Self {
        self.config.limits.max_upload_bytes = bytes;
        self
    }

    pub fn whisper_model(mut self, model: &str) -> Self {
        self.config.tools.whisper_model = model.to_string();
        self
    }

    pub fn words_per_cue(mut self, words: usize) -> Self {
        self.config.subtitles.words_per_cue = words;
        self
    }

    pub fn fallback_text(mut self, text: &str) -> Self {
        self.config.subtitles.fallback_text = text.to_string();
        self
    }

    /// Sets all four progress bands from their boundaries.
    pub fn bands(mut self, probe_end: u8, transcription_end: u8, render_end: u8) -> Self {
        let stages = &mut self.config.stages;
        stages.probe = ProgressBand::new(0, probe_end);
        stages.transcription = ProgressBand::new(probe_end, transcription_end);
        stages.render = ProgressBand::new(transcription_end, render_end);
        stages.encode = ProgressBand::new(render_end, 100);
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}
