//! Configuration -- `logan.toml` parsing and runtime settings.
//!
//! [`LoganConfig`] is the root of the configuration tree. Each consumer reads
//! only its own section.
//!
//! # Load order
//! 1. CLI arguments (highest)
//! 2. Environment variables (`LOGAN_ENGINE_CHUNK_SIZE=65536` style)
//! 3. Config file (`logan.toml`)
//! 4. Defaults (`Default` impls)
//!
//! # Example
//! ```no_run
//! # async fn example() -> Result<(), logan_core::error::LoganError> {
//! use logan_core::config::LoganConfig;
//!
//! // file + env overrides
//! let config = LoganConfig::load("logan.toml").await?;
//!
//! // straight from a TOML string
//! let config = LoganConfig::parse("[engine]\nchunk_size = 65536")?;
//! # Ok(())
//! # }
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{ConfigError, LoganError};

/// Largest accepted `engine.chunk_size` (64 MiB).
pub const MAX_CHUNK_SIZE: usize = 64 * 1024 * 1024;

/// Root configuration, the shape of `logan.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoganConfig {
    /// Logging
    #[serde(default)]
    pub general: GeneralConfig,
    /// Parse engine
    #[serde(default)]
    pub engine: EngineConfig,
    /// Post-parse search
    #[serde(default)]
    pub search: SearchConfig,
}

impl LoganConfig {
    /// Loads a TOML file and applies environment overrides.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, LoganError> {
        let mut config = Self::from_file(path).await?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Loads a TOML file without environment overrides.
    pub async fn from_file(path: impl AsRef<Path>) -> Result<Self, LoganError> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                LoganError::Config(ConfigError::FileNotFound {
                    path: path.display().to_string(),
                })
            } else {
                LoganError::Io(e)
            }
        })?;
        let config = Self::parse(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Parses configuration from a TOML string.
    pub fn parse(toml_str: &str) -> Result<Self, LoganError> {
        toml::from_str(toml_str).map_err(|e| {
            LoganError::Config(ConfigError::ParseFailed {
                reason: e.to_string(),
            })
        })
    }

    /// Overrides fields from environment variables.
    ///
    /// Naming: `LOGAN_{SECTION}_{FIELD}`, e.g. `LOGAN_ENGINE_PATTERN_MODE=strict`.
    pub fn apply_env_overrides(&mut self) {
        // General
        override_string(&mut self.general.log_level, "LOGAN_GENERAL_LOG_LEVEL");
        override_string(&mut self.general.log_format, "LOGAN_GENERAL_LOG_FORMAT");

        // Engine
        override_string(&mut self.engine.schema, "LOGAN_ENGINE_SCHEMA");
        override_usize(&mut self.engine.chunk_size, "LOGAN_ENGINE_CHUNK_SIZE");
        override_bool(&mut self.engine.prefix_index, "LOGAN_ENGINE_PREFIX_INDEX");
        override_string(&mut self.engine.pattern_mode, "LOGAN_ENGINE_PATTERN_MODE");
        override_string(&mut self.engine.ipc, "LOGAN_ENGINE_IPC");

        // Search
        override_usize(&mut self.search.max_results, "LOGAN_SEARCH_MAX_RESULTS");
    }

    /// Validates field values.
    pub fn validate(&self) -> Result<(), LoganError> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.general.log_level.as_str()) {
            return Err(ConfigError::InvalidValue {
                field: "general.log_level".to_owned(),
                reason: format!("must be one of: {}", valid_levels.join(", ")),
            }
            .into());
        }

        let valid_formats = ["json", "pretty"];
        if !valid_formats.contains(&self.general.log_format.as_str()) {
            return Err(ConfigError::InvalidValue {
                field: "general.log_format".to_owned(),
                reason: format!("must be one of: {}", valid_formats.join(", ")),
            }
            .into());
        }

        if self.engine.schema.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "engine.schema".to_owned(),
                reason: "schema name must not be empty".to_owned(),
            }
            .into());
        }

        if self.engine.chunk_size == 0 || self.engine.chunk_size > MAX_CHUNK_SIZE {
            return Err(ConfigError::InvalidValue {
                field: "engine.chunk_size".to_owned(),
                reason: format!("must be 1-{MAX_CHUNK_SIZE}"),
            }
            .into());
        }

        let valid_modes = ["lenient", "strict"];
        if !valid_modes.contains(&self.engine.pattern_mode.as_str()) {
            return Err(ConfigError::InvalidValue {
                field: "engine.pattern_mode".to_owned(),
                reason: format!("must be one of: {}", valid_modes.join(", ")),
            }
            .into());
        }

        let valid_ipc = ["auto", "on", "off"];
        if !valid_ipc.contains(&self.engine.ipc.as_str()) {
            return Err(ConfigError::InvalidValue {
                field: "engine.ipc".to_owned(),
                reason: format!("must be one of: {}", valid_ipc.join(", ")),
            }
            .into());
        }

        if self.search.max_results == 0 {
            return Err(ConfigError::InvalidValue {
                field: "search.max_results".to_owned(),
                reason: "must be greater than 0".to_owned(),
            }
            .into());
        }

        Ok(())
    }
}

/// Logging settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Log format (json, pretty)
    pub log_format: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_owned(),
            log_format: "pretty".to_owned(),
        }
    }
}

/// Parse engine settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Built-in schema name
    pub schema: String,
    /// Slice size of the chunked reader (bytes)
    pub chunk_size: usize,
    /// Dispatch rules through the leading-token index
    pub prefix_index: bool,
    /// Unknown `%` placeholders: "lenient" keeps them literal, "strict" rejects the rule
    pub pattern_mode: String,
    /// Cross-process send/recv correlation: "auto", "on", "off"
    pub ipc: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            schema: "moz".to_owned(),
            chunk_size: 1024 * 1024, // 1MiB
            prefix_index: true,
            pattern_mode: "lenient".to_owned(),
            ipc: "auto".to_owned(),
        }
    }
}

/// Search settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Maximum number of results rendered by the CLI
    pub max_results: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self { max_results: 1000 }
    }
}

// --- env override helpers ---

fn override_string(target: &mut String, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        *target = val;
    }
}

fn override_bool(target: &mut bool, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<bool>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse bool from env var, ignoring"
            ),
        }
    }
}

fn override_usize(target: &mut usize, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<usize>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse usize from env var, ignoring"
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn default_config_has_sane_values() {
        let config = LoganConfig::default();
        assert_eq!(config.general.log_level, "info");
        assert_eq!(config.engine.schema, "moz");
        assert_eq!(config.engine.chunk_size, 1024 * 1024);
        assert!(config.engine.prefix_index);
        assert_eq!(config.engine.pattern_mode, "lenient");
        assert_eq!(config.engine.ipc, "auto");
    }

    #[test]
    fn default_config_passes_validation() {
        LoganConfig::default().validate().unwrap();
    }

    #[test]
    fn empty_toml_uses_defaults() {
        let config = LoganConfig::parse("").unwrap();
        assert_eq!(config.search.max_results, 1000);
        assert_eq!(config.general.log_format, "pretty");
    }

    #[test]
    fn partial_toml_merges_with_defaults() {
        let toml = r#"
[engine]
chunk_size = 4096
pattern_mode = "strict"
"#;
        let config = LoganConfig::parse(toml).unwrap();
        assert_eq!(config.engine.chunk_size, 4096);
        assert_eq!(config.engine.pattern_mode, "strict");
        // untouched fields keep defaults
        assert_eq!(config.engine.ipc, "auto");
        assert!(config.engine.prefix_index);
    }

    #[test]
    fn invalid_toml_returns_parse_error() {
        let err = LoganConfig::parse("engine = [[[").unwrap_err();
        assert!(matches!(
            err,
            LoganError::Config(ConfigError::ParseFailed { .. })
        ));
    }

    #[test]
    fn validate_rejects_zero_chunk_size() {
        let mut config = LoganConfig::default();
        config.engine.chunk_size = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("engine.chunk_size"));
    }

    #[test]
    fn validate_rejects_oversized_chunk() {
        let mut config = LoganConfig::default();
        config.engine.chunk_size = MAX_CHUNK_SIZE + 1;
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_unknown_pattern_mode() {
        let mut config = LoganConfig::default();
        config.engine.pattern_mode = "pedantic".to_owned();
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_unknown_ipc_mode() {
        let mut config = LoganConfig::default();
        config.engine.ipc = "sometimes".to_owned();
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_unknown_log_format() {
        let mut config = LoganConfig::default();
        config.general.log_format = "xml".to_owned();
        assert!(config.validate().is_err());
    }

    #[test]
    #[serial]
    fn env_overrides_apply() {
        // SAFETY: serialized with other env tests
        unsafe {
            std::env::set_var("LOGAN_ENGINE_CHUNK_SIZE", "8192");
            std::env::set_var("LOGAN_ENGINE_PREFIX_INDEX", "false");
            std::env::set_var("LOGAN_ENGINE_IPC", "off");
        }
        let mut config = LoganConfig::default();
        config.apply_env_overrides();
        unsafe {
            std::env::remove_var("LOGAN_ENGINE_CHUNK_SIZE");
            std::env::remove_var("LOGAN_ENGINE_PREFIX_INDEX");
            std::env::remove_var("LOGAN_ENGINE_IPC");
        }
        assert_eq!(config.engine.chunk_size, 8192);
        assert!(!config.engine.prefix_index);
        assert_eq!(config.engine.ipc, "off");
    }

    #[test]
    #[serial]
    fn env_override_with_garbage_is_ignored() {
        unsafe {
            std::env::set_var("LOGAN_ENGINE_CHUNK_SIZE", "lots");
        }
        let mut config = LoganConfig::default();
        config.apply_env_overrides();
        unsafe {
            std::env::remove_var("LOGAN_ENGINE_CHUNK_SIZE");
        }
        assert_eq!(config.engine.chunk_size, 1024 * 1024);
    }

    #[tokio::test]
    async fn from_file_missing_is_file_not_found() {
        let err = LoganConfig::from_file("/nonexistent/logan.toml")
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            LoganError::Config(ConfigError::FileNotFound { .. })
        ));
    }
}
