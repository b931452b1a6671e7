//! Engine settings
//!
//! [`EngineSettings`] is derived from the core
//! [`EngineConfig`](logan_core::config::EngineConfig) section and turns its
//! string-typed knobs into enums the engine can match on.
//!
//! ```ignore
//! use logan_core::config::LoganConfig;
//! use logan_engine::config::EngineSettings;
//!
//! let core = LoganConfig::default();
//! let settings = EngineSettings::from_core(&core.engine)?;
//! ```

use std::fmt;
use std::str::FromStr;

use logan_core::config::{EngineConfig, MAX_CHUNK_SIZE};
use serde::{Deserialize, Serialize};

use crate::error::EngineError;

/// What the pattern compiler does with a `%` placeholder it does not know
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PatternMode {
    /// Keep it as escaped literal text
    #[default]
    Lenient,
    /// Reject the rule at schema build time
    Strict,
}

impl FromStr for PatternMode {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "lenient" => Ok(Self::Lenient),
            "strict" => Ok(Self::Strict),
            other => Err(EngineError::Config {
                field: "pattern_mode".to_owned(),
                reason: format!("expected 'lenient' or 'strict', got '{other}'"),
            }),
        }
    }
}

impl fmt::Display for PatternMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Lenient => f.write_str("lenient"),
            Self::Strict => f.write_str("strict"),
        }
    }
}

/// Cross-process send/recv correlation switch
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IpcMode {
    /// Active when both parent and child families are loaded
    #[default]
    Auto,
    /// Always active
    On,
    /// Never active; `send`/`recv` become no-ops
    Off,
}

impl IpcMode {
    /// Resolves the mode against the loaded source topology.
    pub fn resolve(self, topology_says: bool) -> bool {
        match self {
            Self::Auto => topology_says,
            Self::On => true,
            Self::Off => false,
        }
    }
}

impl FromStr for IpcMode {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "auto" => Ok(Self::Auto),
            "on" => Ok(Self::On),
            "off" => Ok(Self::Off),
            other => Err(EngineError::Config {
                field: "ipc".to_owned(),
                reason: format!("expected 'auto', 'on' or 'off', got '{other}'"),
            }),
        }
    }
}

/// Runtime settings of one parse
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineSettings {
    /// Built-in schema name
    pub schema: String,
    /// Bytes requested per slice read
    pub chunk_size: usize,
    /// Dispatch through the leading-token index
    pub prefix_index: bool,
    /// Unknown placeholder handling
    pub pattern_mode: PatternMode,
    /// send/recv correlation
    pub ipc: IpcMode,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            schema: "moz".to_owned(),
            chunk_size: 1024 * 1024,
            prefix_index: true,
            pattern_mode: PatternMode::Lenient,
            ipc: IpcMode::Auto,
        }
    }
}

impl EngineSettings {
    /// Builds settings from the `[engine]` section of `logan.toml`.
    pub fn from_core(core: &EngineConfig) -> Result<Self, EngineError> {
        let settings = Self {
            schema: core.schema.clone(),
            chunk_size: core.chunk_size,
            prefix_index: core.prefix_index,
            pattern_mode: core.pattern_mode.parse()?,
            ipc: core.ipc.parse()?,
        };
        settings.validate()?;
        Ok(settings)
    }

    /// Checks value ranges.
    pub fn validate(&self) -> Result<(), EngineError> {
        if self.chunk_size == 0 || self.chunk_size > MAX_CHUNK_SIZE {
            return Err(EngineError::Config {
                field: "chunk_size".to_owned(),
                reason: format!("must be 1-{MAX_CHUNK_SIZE}"),
            });
        }

        if self.schema.trim().is_empty() {
            return Err(EngineError::Config {
                field: "schema".to_owned(),
                reason: "must not be empty".to_owned(),
            });
        }

        Ok(())
    }
}

/// Builder for [`EngineSettings`]
#[derive(Default)]
pub struct EngineSettingsBuilder {
    settings: EngineSettings,
}

impl EngineSettingsBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn schema(mut self, name: impl Into<String>) -> Self {
        self.settings.schema = name.into();
        self
    }

    pub fn chunk_size(mut self, size: usize) -> Self {
        self.settings.chunk_size = size;
        self
    }

    pub fn prefix_index(mut self, enabled: bool) -> Self {
        self.settings.prefix_index = enabled;
        self
    }

    pub fn pattern_mode(mut self, mode: PatternMode) -> Self {
        self.settings.pattern_mode = mode;
        self
    }

    pub fn ipc(mut self, mode: IpcMode) -> Self {
        self.settings.ipc = mode;
        self
    }

    /// Validates and returns the settings.
    pub fn build(self) -> Result<EngineSettings, EngineError> {
        self.settings.validate()?;
        Ok(self.settings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_settings_are_valid() {
        EngineSettings::default().validate().unwrap();
    }

    #[test]
    fn from_core_parses_modes() {
        let core = EngineConfig {
            pattern_mode: "strict".to_owned(),
            ipc: "off".to_owned(),
            chunk_size: 4096,
            ..Default::default()
        };
        let settings = EngineSettings::from_core(&core).unwrap();
        assert_eq!(settings.pattern_mode, PatternMode::Strict);
        assert_eq!(settings.ipc, IpcMode::Off);
        assert_eq!(settings.chunk_size, 4096);
    }

    #[test]
    fn from_core_rejects_unknown_mode() {
        let core = EngineConfig {
            ipc: "sometimes".to_owned(),
            ..Default::default()
        };
        let err = EngineSettings::from_core(&core).unwrap_err();
        assert!(err.to_string().contains("ipc"));
    }

    #[test]
    fn builder_rejects_zero_chunk() {
        assert!(EngineSettingsBuilder::new().chunk_size(0).build().is_err());
    }

    #[test]
    fn builder_sets_fields() {
        let settings = EngineSettingsBuilder::new()
            .chunk_size(16)
            .prefix_index(false)
            .ipc(IpcMode::On)
            .build()
            .unwrap();
        assert_eq!(settings.chunk_size, 16);
        assert!(!settings.prefix_index);
        assert!(settings.ipc.resolve(false));
    }

    #[test]
    fn ipc_auto_follows_topology() {
        assert!(IpcMode::Auto.resolve(true));
        assert!(!IpcMode::Auto.resolve(false));
        assert!(!IpcMode::Off.resolve(true));
    }
}
