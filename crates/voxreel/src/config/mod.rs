pub mod loader;
pub mod schema;

pub use loader::{apply_env_overrides, load_config, load_config_from_str, validate_config};
pub use schema::{
    default_data_dir, Config, ImageProvider, LimitsConfig, LoggingConfig, ProgressBand,
    SceneConfig, StageBands, StorageConfig, SubtitleConfig, ToolsConfig, VideoConfig,
    WorkerConfig,
};
