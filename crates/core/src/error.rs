//! Error types shared by every logan crate.

/// Top-level logan error.
#[derive(Debug, thiserror::Error)]
pub enum LoganError {
    /// Configuration problem.
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// A parse was aborted.
    #[error("parse error: {0}")]
    Parse(#[from] ParseError),

    /// Schema configuration is unusable (bad rule, bad pattern).
    #[error("schema error: {0}")]
    Schema(String),

    /// A post-parse query could not be evaluated.
    #[error("query error: {0}")]
    Query(String),

    /// I/O error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Config file does not exist.
    #[error("config file not found: {path}")]
    FileNotFound { path: String },

    /// Config file is not valid TOML for [`LoganConfig`](crate::config::LoganConfig).
    #[error("failed to parse config: {reason}")]
    ParseFailed { reason: String },

    /// A field holds a value outside its allowed domain.
    #[error("invalid config value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },
}

/// Fatal parse errors.
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    /// A rule failed while processing a line.
    #[error("{file}:{line}: {reason}")]
    Rule {
        file: String,
        line: u64,
        reason: String,
    },

    /// Reading a source failed.
    #[error("failed to read {file}: {reason}")]
    Read { file: String, reason: String },

    /// Any other fatal condition.
    #[error("{0}")]
    Failed(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_error_converts() {
        let err: LoganError = ConfigError::InvalidValue {
            field: "engine.chunk_size".to_owned(),
            reason: "must be positive".to_owned(),
        }
        .into();
        assert!(matches!(err, LoganError::Config(_)));
        assert!(err.to_string().contains("engine.chunk_size"));
    }

    #[test]
    fn rule_parse_error_display_names_location() {
        let err = ParseError::Rule {
            file: "log-main.1.moz_log".to_owned(),
            line: 42,
            reason: "boom".to_owned(),
        };
        assert_eq!(err.to_string(), "log-main.1.moz_log:42: boom");
    }
}
