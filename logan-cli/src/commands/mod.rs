//! Command handlers -- one module per subcommand

pub mod config;
pub mod parse;
pub mod search;

use std::path::{Path, PathBuf};

use tracing::{debug, info};

use logan_core::config::LoganConfig;
use logan_engine::schema::builtin;
use logan_engine::{EngineSettings, FileSource, ParseSession, ParseSessionBuilder};

use crate::error::CliError;
use crate::sink::CliSink;

/// Loads `path`, or defaults plus environment overrides when the file does
/// not exist.
pub async fn load_config(path: &Path) -> Result<LoganConfig, CliError> {
    if tokio::fs::try_exists(path).await.unwrap_or(false) {
        return Ok(LoganConfig::load(path).await?);
    }
    debug!(path = %path.display(), "config file not found, using defaults");
    let mut config = LoganConfig::default();
    config.apply_env_overrides();
    config.validate()?;
    Ok(config)
}

/// Source name used for rotation and parent/child detection.
fn source_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Opens every file and runs a full parse with the configured schema.
pub async fn parse_files(
    files: &[PathBuf],
    config: &LoganConfig,
    sink: &mut CliSink,
) -> Result<ParseSession<FileSource>, CliError> {
    let settings = EngineSettings::from_core(&config.engine)?;
    let schema = builtin(&settings.schema, &settings)?;
    info!(schema = schema.name(), files = files.len(), "opening sources");

    let mut builder = ParseSessionBuilder::new(schema).settings(settings);
    for path in files {
        let source = FileSource::open(path).await.map_err(|e| {
            CliError::Command(format!("cannot open {}: {e}", path.display()))
        })?;
        builder = builder.source(source_name(path), source.len(), source);
    }

    let mut session = builder.build()?;
    session.run(sink).await?;
    Ok(session)
}
