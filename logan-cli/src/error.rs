//! CLI-specific error types and exit code mapping

use logan_core::error::LoganError;
use logan_engine::EngineError;

/// CLI-specific error type.
///
/// `exit_code()` maps each variant to a process exit code.
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    /// Configuration loading or validation failure.
    #[error("configuration error: {0}")]
    Config(String),

    /// A subcommand-specific operation failed.
    #[error("{0}")]
    Command(String),

    /// JSON serialisation failed during output rendering.
    #[error("json output error: {0}")]
    JsonSerialize(#[from] serde_json::Error),

    /// IO error (file read, stdout write, etc.).
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Wrapped domain error from logan-core.
    #[error("{0}")]
    Core(#[from] LoganError),
}

impl CliError {
    /// Map the error to a process exit code.
    ///
    /// | Code | Meaning                                 |
    /// |------|-----------------------------------------|
    /// | 0    | Success                                 |
    /// | 1    | General / command error                 |
    /// | 2    | Configuration or schema error           |
    /// | 3    | Parse aborted (rule failure, read error) |
    /// | 4    | Invalid search query                    |
    /// | 10   | IO error                                |
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Config(_) => 2,
            Self::Io(_) => 10,
            Self::Core(e) => match e {
                LoganError::Config(_) | LoganError::Schema(_) => 2,
                LoganError::Parse(_) => 3,
                LoganError::Query(_) => 4,
                LoganError::Io(_) => 10,
            },
            Self::JsonSerialize(_) | Self::Command(_) => 1,
        }
    }
}

impl From<EngineError> for CliError {
    fn from(e: EngineError) -> Self {
        Self::Core(e.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use logan_core::error::{ConfigError, ParseError};

    #[test]
    fn test_exit_code_config_error() {
        let err = CliError::Config("test error".to_owned());
        assert_eq!(err.exit_code(), 2, "config error should return exit code 2");
    }

    #[test]
    fn test_exit_code_io_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        assert_eq!(CliError::Io(io_err).exit_code(), 10);
    }

    #[test]
    fn test_exit_code_command_error() {
        assert_eq!(CliError::Command("x".to_owned()).exit_code(), 1);
    }

    #[test]
    fn test_exit_code_core_variants() {
        let parse = CliError::Core(LoganError::Parse(ParseError::Failed("boom".to_owned())));
        assert_eq!(parse.exit_code(), 3);
        let query = CliError::Core(LoganError::Query("bad op".to_owned()));
        assert_eq!(query.exit_code(), 4);
        let schema = CliError::Core(LoganError::Schema("no pattern".to_owned()));
        assert_eq!(schema.exit_code(), 2);
        let config = CliError::Core(LoganError::Config(ConfigError::FileNotFound {
            path: "logan.toml".to_owned(),
        }));
        assert_eq!(config.exit_code(), 2);
    }

    #[test]
    fn test_engine_errors_keep_their_category() {
        let rule: CliError = EngineError::RuleFailed {
            file: "log-main.1.moz_log".to_owned(),
            line: 7,
            raw: "Creating nsHttpChannel [this=0x1]".to_owned(),
            source: Box::new(EngineError::consumer("bad state")),
        }
        .into();
        assert_eq!(rule.exit_code(), 3);
        assert!(rule.to_string().contains("log-main.1.moz_log:7"));

        let query: CliError = EngineError::Query("unexpected operator '~'".to_owned()).into();
        assert_eq!(query.exit_code(), 4);

        let schema: CliError = EngineError::UnknownSchema("nope".to_owned()).into();
        assert_eq!(schema.exit_code(), 2);
    }

    #[test]
    fn test_error_display_config() {
        let err = CliError::Config("invalid TOML syntax".to_owned());
        let display_str = err.to_string();
        assert!(display_str.contains("configuration error"));
        assert!(display_str.contains("invalid TOML syntax"));
    }

    #[test]
    fn test_from_io_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "access denied");
        let cli_err: CliError = io_err.into();
        match cli_err {
            CliError::Io(e) => assert_eq!(e.kind(), std::io::ErrorKind::PermissionDenied),
            _ => panic!("expected Io error variant"),
        }
    }
}
