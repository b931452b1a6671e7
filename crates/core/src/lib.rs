//! logan-core -- shared building blocks for the logan workspace.
//!
//! - [`config`]: `logan.toml` parsing, environment overrides, validation
//! - [`error`]: top-level error taxonomy
//! - [`metrics`]: metric name constants used with the `metrics` macros

pub mod config;
pub mod error;
pub mod metrics;

// --- re-exports ---

// errors
pub use error::{ConfigError, LoganError, ParseError};

// config
pub use config::{EngineConfig, GeneralConfig, LoganConfig, SearchConfig};
