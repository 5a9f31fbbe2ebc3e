//! Table-driven tests for configuration loading and validation.

mod common;

use serial_test::serial;

use voxreel::config::loader::{ENV_LOG, ENV_MAX_AUDIO_DURATION, ENV_WHISPER_MODEL};
use voxreel::config::{load_config, load_config_from_str, ProgressBand};

/// Represents a single config loading test case.
struct ConfigTestCase {
    name: &'static str,
    config_json: &'static str,
    should_succeed: bool,
    /// Expected error substring (if should_succeed is false).
    expected_error: Option<&'static str>,
}

const CONFIG_TESTS: &[ConfigTestCase] = &[
    ConfigTestCase {
        name: "empty_object_uses_defaults",
        config_json: "{}",
        should_succeed: true,
        expected_error: None,
    },
    ConfigTestCase {
        name: "valid_full",
        config_json: r#"{
            "version": "1.0",
            "storage": {
                "database_path": "/var/lib/voxreel/voxreel.db",
                "uploads_dir": "/var/lib/voxreel/uploads",
                "outputs_dir": "/var/lib/voxreel/outputs"
            },
            "worker": { "poll_interval_secs": 5, "worker_count": 2, "reconcile_on_start": false },
            "limits": { "max_audio_duration_secs": 300, "max_upload_bytes": 1048576,
                        "allowed_extensions": ["mp3", "wav"] },
            "tools": { "ffmpeg": "/usr/local/bin/ffmpeg", "whisper_model": "small",
                       "transcribe_timeout_secs": 900 },
            "video": { "width": 1920, "height": 1080, "fps": 25, "crf": 20 },
            "subtitles": { "words_per_cue": 3, "fallback_text": "..." },
            "scenes": { "scene_duration_secs": 4.0, "providers": ["picsum"], "max_attempts": 2,
                        "retry_backoff_secs": [1, 2], "request_delay_ms": 0 },
            "stages": {
                "probe": { "start": 0, "end": 10 },
                "transcription": { "start": 10, "end": 60 },
                "render": { "start": 60, "end": 80 },
                "encode": { "start": 80, "end": 100 }
            },
            "logging": { "level": "voxreel=debug", "json": true }
        }"#,
        should_succeed: true,
        expected_error: None,
    },
    ConfigTestCase {
        name: "unsupported_version",
        config_json: r#"{ "version": "2.0" }"#,
        should_succeed: false,
        expected_error: Some("Unsupported config version"),
    },
    ConfigTestCase {
        name: "malformed_json",
        config_json: r#"{ "worker": "#,
        should_succeed: false,
        expected_error: Some("Failed to parse config JSON"),
    },
    ConfigTestCase {
        name: "unknown_image_provider",
        config_json: r#"{ "scenes": { "providers": ["midjourney"] } }"#,
        should_succeed: false,
        expected_error: Some("Failed to parse config JSON"),
    },
    ConfigTestCase {
        name: "zero_image_attempts",
        config_json: r#"{ "scenes": { "max_attempts": 0 } }"#,
        should_succeed: false,
        expected_error: Some("scenes.max_attempts"),
    },
    ConfigTestCase {
        name: "no_image_providers",
        config_json: r#"{ "scenes": { "providers": [] } }"#,
        should_succeed: true,
        expected_error: None,
    },
    ConfigTestCase {
        name: "zero_workers",
        config_json: r#"{ "worker": { "worker_count": 0 } }"#,
        should_succeed: false,
        expected_error: Some("worker.worker_count"),
    },
    ConfigTestCase {
        name: "zero_poll_interval",
        config_json: r#"{ "worker": { "poll_interval_secs": 0 } }"#,
        should_succeed: false,
        expected_error: Some("worker.poll_interval_secs"),
    },
    ConfigTestCase {
        name: "empty_tool_name",
        config_json: r#"{ "tools": { "whisper": "  " } }"#,
        should_succeed: false,
        expected_error: Some("tools.whisper must not be empty"),
    },
    ConfigTestCase {
        name: "zero_timeout",
        config_json: r#"{ "tools": { "encode_timeout_secs": 0 } }"#,
        should_succeed: false,
        expected_error: Some("tools.encode_timeout_secs"),
    },
    ConfigTestCase {
        name: "zero_words_per_cue",
        config_json: r#"{ "subtitles": { "words_per_cue": 0 } }"#,
        should_succeed: false,
        expected_error: Some("subtitles.words_per_cue"),
    },
    ConfigTestCase {
        name: "band_gap",
        config_json: r#"{ "stages": { "transcription": { "start": 6, "end": 50 } } }"#,
        should_succeed: false,
        expected_error: Some("Invalid progress band for stage 'transcription'"),
    },
    ConfigTestCase {
        name: "band_reversed",
        config_json: r#"{ "stages": { "render": { "start": 70, "end": 50 } } }"#,
        should_succeed: false,
        expected_error: Some("start 70 is after end 50"),
    },
    ConfigTestCase {
        name: "bands_stop_short",
        config_json: r#"{ "stages": { "encode": { "start": 70, "end": 95 } } }"#,
        should_succeed: false,
        expected_error: Some("last band must end at 100"),
    },
];

fn clear_env() {
    std::env::remove_var(ENV_WHISPER_MODEL);
    std::env::remove_var(ENV_MAX_AUDIO_DURATION);
    std::env::remove_var(ENV_LOG);
}

#[test]
#[serial]
fn test_config_table() {
    clear_env();
    for case in CONFIG_TESTS {
        let result = load_config_from_str(case.config_json);
        match (case.should_succeed, result) {
            (true, Ok(_)) => {}
            (true, Err(e)) => panic!("{}: expected success, got error: {}", case.name, e),
            (false, Ok(_)) => panic!("{}: expected an error", case.name),
            (false, Err(e)) => {
                if let Some(expected) = case.expected_error {
                    assert!(
                        e.to_string().contains(expected),
                        "{}: error '{}' does not contain '{}'",
                        case.name,
                        e,
                        expected
                    );
                }
            }
        }
    }
}

#[test]
#[serial]
fn test_full_config_values() {
    clear_env();
    let config = load_config_from_str(CONFIG_TESTS[1].config_json).unwrap();
    assert_eq!(config.worker.worker_count, 2);
    assert!(!config.worker.reconcile_on_start);
    assert_eq!(config.limits.allowed_extensions, vec!["mp3", "wav"]);
    assert_eq!(config.tools.ffmpeg, "/usr/local/bin/ffmpeg");
    assert_eq!(config.tools.ffprobe, "ffprobe");
    assert_eq!(config.tools.transcribe_timeout_secs, 900);
    assert_eq!(config.video.width, 1920);
    assert_eq!(config.video.preset, "fast");
    assert_eq!(config.stages.render, ProgressBand::new(60, 80));
    assert!(config.logging.json);
}

#[test]
#[serial]
fn test_env_overrides_file_values() {
    clear_env();
    std::env::set_var(ENV_WHISPER_MODEL, "medium");
    std::env::set_var(ENV_MAX_AUDIO_DURATION, "45");
    std::env::set_var(ENV_LOG, "debug");

    let config = load_config_from_str(r#"{ "tools": { "whisper_model": "tiny" } }"#);
    clear_env();

    let config = config.unwrap();
    assert_eq!(config.tools.whisper_model, "medium");
    assert_eq!(config.limits.max_audio_duration_secs, 45);
    assert_eq!(config.logging.level, "debug");
}

#[test]
#[serial]
fn test_invalid_env_value() {
    clear_env();
    std::env::set_var(ENV_MAX_AUDIO_DURATION, "two minutes");
    let result = load_config_from_str("{}");
    clear_env();

    let err = result.unwrap_err().to_string();
    assert!(err.contains(ENV_MAX_AUDIO_DURATION), "{}", err);
}

#[test]
#[serial]
fn test_load_from_file() {
    clear_env();
    let harness = common::TestHarness::new();
    let path = harness.temp_path().join("voxreel.json");
    std::fs::write(&path, r#"{ "limits": { "max_audio_duration_secs": 90 } }"#).unwrap();

    let config = load_config(&path).unwrap();
    assert_eq!(config.limits.max_audio_duration_secs, 90);

    let missing = load_config(harness.temp_path().join("nope.json")).unwrap_err();
    assert!(missing.to_string().starts_with("Failed to read config file"));
}
