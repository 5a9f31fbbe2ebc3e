use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_version")]
    pub version: String,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub worker: WorkerConfig,
    #[serde(default)]
    pub limits: LimitsConfig,
    #[serde(default)]
    pub tools: ToolsConfig,
    #[serde(default)]
    pub video: VideoConfig,
    #[serde(default)]
    pub subtitles: SubtitleConfig,
    #[serde(default)]
    pub scenes: SceneConfig,
    #[serde(default)]
    pub stages: StageBands,
    #[serde(default)]
    pub logging: LoggingConfig,
}

fn default_version() -> String {
    "1.0".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: default_version(),
            storage: StorageConfig::default(),
            worker: WorkerConfig::default(),
            limits: LimitsConfig::default(),
            tools: ToolsConfig::default(),
            video: VideoConfig::default(),
            subtitles: SubtitleConfig::default(),
            scenes: SceneConfig::default(),
            stages: StageBands::default(),
            logging: LoggingConfig::default(),
        }
    }
}

/// Returns the base data directory: `~/.voxreel`, or `./.voxreel` when no
/// home directory can be determined.
pub fn default_data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".voxreel")
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_database_path")]
    pub database_path: PathBuf,
    #[serde(default = "default_uploads_dir")]
    pub uploads_dir: PathBuf,
    #[serde(default = "default_outputs_dir")]
    pub outputs_dir: PathBuf,
}

fn default_database_path() -> PathBuf {
    default_data_dir().join("data").join("voxreel.db")
}

fn default_uploads_dir() -> PathBuf {
    default_data_dir().join("storage").join("uploads")
}

fn default_outputs_dir() -> PathBuf {
    default_data_dir().join("storage").join("outputs")
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            uploads_dir: default_uploads_dir(),
            outputs_dir: default_outputs_dir(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerConfig {
    /// Seconds between queue checks while idle.
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,
    #[serde(default = "default_worker_count")]
    pub worker_count: usize,
    /// Fail jobs left in `processing` by a previous run before starting.
    #[serde(default = "default_true")]
    pub reconcile_on_start: bool,
}

fn default_poll_interval() -> u64 {
    2
}

fn default_worker_count() -> usize {
    1
}

fn default_true() -> bool {
    true
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval(),
            worker_count: default_worker_count(),
            reconcile_on_start: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimitsConfig {
    /// Audio longer than this is rejected by the duration probe.
    #[serde(default = "default_max_audio_duration")]
    pub max_audio_duration_secs: u64,
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: u64,
    #[serde(default = "default_allowed_extensions")]
    pub allowed_extensions: Vec<String>,
}

fn default_max_audio_duration() -> u64 {
    120
}

fn default_max_upload_bytes() -> u64 {
    50 * 1024 * 1024
}

fn default_allowed_extensions() -> Vec<String> {
    ["aac", "flac", "m4a", "mp3", "ogg", "wav"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_audio_duration_secs: default_max_audio_duration(),
            max_upload_bytes: default_max_upload_bytes(),
            allowed_extensions: default_allowed_extensions(),
        }
    }
}

/// External command names (or paths) and their timeouts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolsConfig {
    #[serde(default = "default_ffprobe")]
    pub ffprobe: String,
    #[serde(default = "default_ffmpeg")]
    pub ffmpeg: String,
    #[serde(default = "default_whisper")]
    pub whisper: String,
    #[serde(default = "default_whisper_model")]
    pub whisper_model: String,
    #[serde(default = "default_probe_timeout")]
    pub probe_timeout_secs: u64,
    #[serde(default = "default_transcribe_timeout")]
    pub transcribe_timeout_secs: u64,
    #[serde(default = "default_ffmpeg_timeout")]
    pub render_timeout_secs: u64,
    #[serde(default = "default_ffmpeg_timeout")]
    pub encode_timeout_secs: u64,
}

fn default_ffprobe() -> String {
    "ffprobe".to_string()
}

fn default_ffmpeg() -> String {
    "ffmpeg".to_string()
}

fn default_whisper() -> String {
    "whisper".to_string()
}

fn default_whisper_model() -> String {
    "base".to_string()
}

fn default_probe_timeout() -> u64 {
    30
}

fn default_transcribe_timeout() -> u64 {
    600
}

fn default_ffmpeg_timeout() -> u64 {
    300
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            ffprobe: default_ffprobe(),
            ffmpeg: default_ffmpeg(),
            whisper: default_whisper(),
            whisper_model: default_whisper_model(),
            probe_timeout_secs: default_probe_timeout(),
            transcribe_timeout_secs: default_transcribe_timeout(),
            render_timeout_secs: default_ffmpeg_timeout(),
            encode_timeout_secs: default_ffmpeg_timeout(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoConfig {
    #[serde(default = "default_width")]
    pub width: u32,
    #[serde(default = "default_height")]
    pub height: u32,
    #[serde(default = "default_fps")]
    pub fps: u32,
    #[serde(default = "default_font_size")]
    pub font_size: u32,
    #[serde(default = "default_crf")]
    pub crf: u8,
    #[serde(default = "default_preset")]
    pub preset: String,
    #[serde(default = "default_audio_bitrate")]
    pub audio_bitrate: String,
}

fn default_width() -> u32 {
    1280
}

fn default_height() -> u32 {
    720
}

fn default_fps() -> u32 {
    30
}

fn default_font_size() -> u32 {
    28
}

fn default_crf() -> u8 {
    23
}

fn default_preset() -> String {
    "fast".to_string()
}

fn default_audio_bitrate() -> String {
    "192k".to_string()
}

impl Default for VideoConfig {
    fn default() -> Self {
        Self {
            width: default_width(),
            height: default_height(),
            fps: default_fps(),
            font_size: default_font_size(),
            crf: default_crf(),
            preset: default_preset(),
            audio_bitrate: default_audio_bitrate(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubtitleConfig {
    #[serde(default = "default_words_per_cue")]
    pub words_per_cue: usize,
    /// Text of the single cue written when transcription is unavailable.
    #[serde(default = "default_fallback_text")]
    pub fallback_text: String,
}

fn default_words_per_cue() -> usize {
    5
}

fn default_fallback_text() -> String {
    "Subtitles unavailable".to_string()
}

impl Default for SubtitleConfig {
    fn default() -> Self {
        Self {
            words_per_cue: default_words_per_cue(),
            fallback_text: default_fallback_text(),
        }
    }
}

/// Remote source of scene images.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageProvider {
    /// Generated from the scene text.
    Pollinations,
    /// Stock photo, unrelated to the text.
    Picsum,
}

impl ImageProvider {
    pub fn name(&self) -> &'static str {
        match self {
            ImageProvider::Pollinations => "pollinations",
            ImageProvider::Picsum => "picsum",
        }
    }
}

impl fmt::Display for ImageProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Scene images shown behind the subtitles. With no providers every scene
/// gets a locally rendered gradient.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SceneConfig {
    /// Transcript segments are grouped until a scene spans at least this long.
    #[serde(default = "default_scene_duration")]
    pub scene_duration_secs: f64,
    /// Tried in order for every scene.
    #[serde(default = "default_image_providers")]
    pub providers: Vec<ImageProvider>,
    /// Attempts per provider before moving on.
    #[serde(default = "default_image_attempts")]
    pub max_attempts: u32,
    /// Wait before retry N; the last entry repeats.
    #[serde(default = "default_retry_backoff")]
    pub retry_backoff_secs: Vec<u64>,
    /// Pause after a downloaded image, before the next scene.
    #[serde(default = "default_request_delay")]
    pub request_delay_ms: u64,
    #[serde(default = "default_image_timeout")]
    pub request_timeout_secs: u64,
    /// Responses shorter than this are not trusted to be images.
    #[serde(default = "default_min_image_bytes")]
    pub min_image_bytes: usize,
    /// Appended to the scene text to form the generation prompt.
    #[serde(default = "default_style_suffix")]
    pub style_suffix: String,
}

fn default_scene_duration() -> f64 {
    5.0
}

fn default_image_providers() -> Vec<ImageProvider> {
    vec![ImageProvider::Pollinations, ImageProvider::Picsum]
}

fn default_image_attempts() -> u32 {
    3
}

fn default_retry_backoff() -> Vec<u64> {
    vec![3, 8, 15]
}

fn default_request_delay() -> u64 {
    1500
}

fn default_image_timeout() -> u64 {
    120
}

fn default_min_image_bytes() -> usize {
    5000
}

fn default_style_suffix() -> String {
    ", cinematic lighting, digital art, vibrant colors, 4k, detailed background, no text, no watermark"
        .to_string()
}

impl Default for SceneConfig {
    fn default() -> Self {
        Self {
            scene_duration_secs: default_scene_duration(),
            providers: default_image_providers(),
            max_attempts: default_image_attempts(),
            retry_backoff_secs: default_retry_backoff(),
            request_delay_ms: default_request_delay(),
            request_timeout_secs: default_image_timeout(),
            min_image_bytes: default_min_image_bytes(),
            style_suffix: default_style_suffix(),
        }
    }
}

/// A `[start, end]` slice of the 0–100 progress scale owned by one stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressBand {
    pub start: u8,
    pub end: u8,
}

impl ProgressBand {
    pub const fn new(start: u8, end: u8) -> Self {
        Self { start, end }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageBands {
    #[serde(default = "default_probe_band")]
    pub probe: ProgressBand,
    #[serde(default = "default_transcription_band")]
    pub transcription: ProgressBand,
    #[serde(default = "default_render_band")]
    pub render: ProgressBand,
    #[serde(default = "default_encode_band")]
    pub encode: ProgressBand,
}

fn default_probe_band() -> ProgressBand {
    ProgressBand::new(0, 5)
}

fn default_transcription_band() -> ProgressBand {
    ProgressBand::new(5, 50)
}

fn default_render_band() -> ProgressBand {
    ProgressBand::new(50, 70)
}

fn default_encode_band() -> ProgressBand {
    ProgressBand::new(70, 100)
}

impl StageBands {
    /// Bands in execution order, labelled with their stage names.
    pub fn ordered(&self) -> [(&'static str, ProgressBand); 4] {
        [
            ("probe", self.probe),
            ("transcription", self.transcription),
            ("render", self.render),
            ("encode", self.encode),
        ]
    }
}

impl Default for StageBands {
    fn default() -> Self {
        Self {
            probe: default_probe_band(),
            transcription: default_transcription_band(),
            render: default_render_band(),
            encode: default_encode_band(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// `EnvFilter` directive, e.g. `info` or `voxreel=debug`.
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub json: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}
