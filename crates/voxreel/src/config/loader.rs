use std::path::Path;

use crate::config::schema::Config;
use crate::error::ConfigError;

pub const ENV_WHISPER_MODEL: &str = "VOXREEL_WHISPER_MODEL";
pub const ENV_MAX_AUDIO_DURATION: &str = "VOXREEL_MAX_AUDIO_DURATION";
pub const ENV_LOG: &str = "VOXREEL_LOG";

pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
        path: path.to_path_buf(),
        source: e,
    })?;

    load_config_from_str(&content)
}

pub fn load_config_from_str(content: &str) -> Result<Config, ConfigError> {
    let mut config: Config = serde_json::from_str(content)?;

    apply_env_overrides(&mut config)?;
    validate_config(&config)?;

    Ok(config)
}

/// Applies `VOXREEL_*` environment overrides on top of file values.
pub fn apply_env_overrides(config: &mut Config) -> Result<(), ConfigError> {
    if let Ok(model) = std::env::var(ENV_WHISPER_MODEL) {
        if !model.trim().is_empty() {
            config.tools.whisper_model = model.trim().to_string();
        }
    }

    if let Ok(raw) = std::env::var(ENV_MAX_AUDIO_DURATION) {
        config.limits.max_audio_duration_secs =
            raw.trim().parse().map_err(|_| ConfigError::InvalidEnv {
                name: ENV_MAX_AUDIO_DURATION.to_string(),
                value: raw.clone(),
            })?;
    }

    if let Ok(level) = std::env::var(ENV_LOG) {
        if !level.trim().is_empty() {
            config.logging.level = level.trim().to_string();
        }
    }

    Ok(())
}

pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.version != "1.0" {
        return Err(ConfigError::Validation {
            message: format!("Unsupported config version: {}", config.version),
        });
    }

    if config.worker.poll_interval_secs == 0 {
        return Err(ConfigError::Validation {
            message: "worker.poll_interval_secs must be greater than 0".to_string(),
        });
    }
    if config.worker.worker_count == 0 {
        return Err(ConfigError::Validation {
            message: "worker.worker_count must be greater than 0".to_string(),
        });
    }

    if config.limits.max_audio_duration_secs == 0 {
        return Err(ConfigError::Validation {
            message: "limits.max_audio_duration_secs must be greater than 0".to_string(),
        });
    }
    if config.limits.allowed_extensions.is_empty() {
        return Err(ConfigError::Validation {
            message: "limits.allowed_extensions must not be empty".to_string(),
        });
    }

    let tools = &config.tools;
    for (name, value) in [
        ("ffprobe", &tools.ffprobe),
        ("ffmpeg", &tools.ffmpeg),
        ("whisper", &tools.whisper),
        ("whisper_model", &tools.whisper_model),
    ] {
        if value.trim().is_empty() {
            return Err(ConfigError::Validation {
                message: format!("tools.{} must not be empty", name),
            });
        }
    }
    for (name, secs) in [
        ("probe_timeout_secs", tools.probe_timeout_secs),
        ("transcribe_timeout_secs", tools.transcribe_timeout_secs),
        ("render_timeout_secs", tools.render_timeout_secs),
        ("encode_timeout_secs", tools.encode_timeout_secs),
    ] {
        if secs == 0 {
            return Err(ConfigError::Validation {
                message: format!("tools.{} must be greater than 0", name),
            });
        }
    }

    if config.subtitles.words_per_cue == 0 {
        return Err(ConfigError::Validation {
            message: "subtitles.words_per_cue must be greater than 0".to_string(),
        });
    }

    let scenes = &config.scenes;
    if scenes.scene_duration_secs <= 0.0 {
        return Err(ConfigError::Validation {
            message: "scenes.scene_duration_secs must be greater than 0".to_string(),
        });
    }
    if scenes.max_attempts == 0 {
        return Err(ConfigError::Validation {
            message: "scenes.max_attempts must be greater than 0".to_string(),
        });
    }
    if scenes.request_timeout_secs == 0 {
        return Err(ConfigError::Validation {
            message: "scenes.request_timeout_secs must be greater than 0".to_string(),
        });
    }

    validate_bands(config)
}

/// Bands must tile 0..=100 in stage order without gaps or overlaps.
fn validate_bands(config: &Config) -> Result<(), ConfigError> {
    let mut expected_start = 0u8;

    for (stage, band) in config.stages.ordered() {
        if band.start > band.end {
            return Err(ConfigError::InvalidBand {
                stage: stage.to_string(),
                reason: format!("start {} is after end {}", band.start, band.end),
            });
        }
        if band.end > 100 {
            return Err(ConfigError::InvalidBand {
                stage: stage.to_string(),
                reason: format!("end {} exceeds 100", band.end),
            });
        }
        if band.start != expected_start {
            return Err(ConfigError::InvalidBand {
                stage: stage.to_string(),
                reason: format!(
                    "expected band to start at {}, found {}",
                    expected_start, band.start
                ),
            });
        }
        expected_start = band.end;
    }

    if expected_start != 100 {
        return Err(ConfigError::InvalidBand {
            stage: "encode".to_string(),
            reason: format!("last band must end at 100, found {}", expected_start),
        });
    }

    Ok(())
}
