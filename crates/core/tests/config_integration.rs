//! logan.toml integration tests
//!
//! - logan.toml.example parses and validates
//! - partial files merge with defaults
//! - env overrides win over file values
//! - bad files surface typed errors

use logan_core::config::LoganConfig;
use logan_core::error::{ConfigError, LoganError};
use serial_test::serial;

// =============================================================================
// logan.toml.example
// =============================================================================

#[test]
fn example_config_parses_successfully() {
    let content = include_str!("../../../logan.toml.example");
    let config = LoganConfig::parse(content).expect("example config should parse");

    assert_eq!(config.general.log_level, "info");
    assert_eq!(config.general.log_format, "pretty");
    assert_eq!(config.engine.schema, "moz");
    assert_eq!(config.engine.chunk_size, 1_048_576);
    assert!(config.engine.prefix_index);
    assert_eq!(config.engine.pattern_mode, "lenient");
    assert_eq!(config.engine.ipc, "auto");
    assert_eq!(config.search.max_results, 1000);
}

#[test]
fn example_config_passes_validation() {
    let content = include_str!("../../../logan.toml.example");
    let config = LoganConfig::parse(content).expect("should parse");
    config
        .validate()
        .expect("example config should pass validation");
}

#[test]
fn example_config_matches_defaults() {
    let content = include_str!("../../../logan.toml.example");
    let parsed = LoganConfig::parse(content).expect("should parse");
    let defaults = LoganConfig::default();

    assert_eq!(parsed.engine.chunk_size, defaults.engine.chunk_size);
    assert_eq!(parsed.engine.pattern_mode, defaults.engine.pattern_mode);
    assert_eq!(parsed.search.max_results, defaults.search.max_results);
}

// =============================================================================
// file loading
// =============================================================================

#[tokio::test]
#[serial]
async fn load_partial_file_merges_with_defaults() {
    let dir = tempfile::tempdir().expect("temp dir");
    let path = dir.path().join("logan.toml");
    std::fs::write(&path, "[engine]\nipc = \"off\"\n").expect("write config");

    let config = LoganConfig::load(&path).await.expect("should load");
    assert_eq!(config.engine.ipc, "off");
    assert_eq!(config.engine.schema, "moz");
}

#[tokio::test]
#[serial]
async fn load_rejects_invalid_values() {
    let dir = tempfile::tempdir().expect("temp dir");
    let path = dir.path().join("logan.toml");
    std::fs::write(&path, "[engine]\npattern_mode = \"loose\"\n").expect("write config");

    let err = LoganConfig::load(&path).await.unwrap_err();
    match err {
        LoganError::Config(ConfigError::InvalidValue { field, .. }) => {
            assert_eq!(field, "engine.pattern_mode");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
#[serial]
async fn env_override_beats_file_value() {
    let dir = tempfile::tempdir().expect("temp dir");
    let path = dir.path().join("logan.toml");
    std::fs::write(&path, "[engine]\nchunk_size = 4096\n").expect("write config");

    // SAFETY: serialized with other env tests
    unsafe {
        std::env::set_var("LOGAN_ENGINE_CHUNK_SIZE", "2048");
    }
    let result = LoganConfig::load(&path).await;
    unsafe {
        std::env::remove_var("LOGAN_ENGINE_CHUNK_SIZE");
    }

    let config = result.expect("should load");
    assert_eq!(config.engine.chunk_size, 2048);
}

#[tokio::test]
#[serial]
async fn env_override_is_validated() {
    let dir = tempfile::tempdir().expect("temp dir");
    let path = dir.path().join("logan.toml");
    std::fs::write(&path, "").expect("write config");

    unsafe {
        std::env::set_var("LOGAN_GENERAL_LOG_LEVEL", "chatty");
    }
    let result = LoganConfig::load(&path).await;
    unsafe {
        std::env::remove_var("LOGAN_GENERAL_LOG_LEVEL");
    }

    assert!(result.is_err(), "invalid env value must fail validation");
}

#[test]
fn malformed_toml_is_parse_failed() {
    let err = LoganConfig::parse("[engine\nchunk_size = 1").unwrap_err();
    assert!(matches!(
        err,
        LoganError::Config(ConfigError::ParseFailed { .. })
    ));
}

#[test]
fn wrong_type_is_parse_failed() {
    let err = LoganConfig::parse("[engine]\nchunk_size = \"big\"").unwrap_err();
    assert!(matches!(
        err,
        LoganError::Config(ConfigError::ParseFailed { .. })
    ));
}
