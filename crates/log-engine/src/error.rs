//! Engine error type
//!
//! [`EngineError`] covers everything the engine can fail with. Expected
//! "rule did not match" outcomes are not errors; they travel as
//! [`RuleOutcome::NoMatch`](crate::schema::RuleOutcome::NoMatch).
//! `From<EngineError> for LoganError` lets upper layers use `?`.

use logan_core::error::{ConfigError, LoganError, ParseError};

/// Engine domain error
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// A rule pattern could not be compiled
    #[error("pattern error: '{pattern}': {reason}")]
    Pattern {
        /// Original printf-style pattern
        pattern: String,
        /// Why it was rejected
        reason: String,
    },

    /// Schema configuration error (rule without pattern or condition, ...)
    #[error("schema error: {0}")]
    Schema(String),

    /// No built-in schema with this name
    #[error("unknown schema: {0}")]
    UnknownSchema(String),

    /// Query could not be evaluated (unknown operator, bad regex)
    #[error("query error: {0}")]
    Query(String),

    /// Raised by rule consumer or condition code
    #[error("{0}")]
    Consumer(String),

    /// A captured group could not be converted
    #[error("capture {index} '{value}': {reason}")]
    Capture {
        /// Zero-based group index
        index: usize,
        /// Captured text
        value: String,
        /// Conversion failure
        reason: String,
    },

    /// A rule failed while handling a line; wraps the cause with its location
    #[error("{file}:{line}: rule failed on '{raw}': {source}")]
    RuleFailed {
        /// Source name
        file: String,
        /// 1-based line number
        line: u64,
        /// Raw line text
        raw: String,
        /// Underlying failure
        #[source]
        source: Box<EngineError>,
    },

    /// Reading a slice from a source failed
    #[error("read error: {file}: {source}")]
    Read {
        /// Source name
        file: String,
        /// I/O failure
        #[source]
        source: std::io::Error,
    },

    /// Invalid engine settings
    #[error("config error: {field}: {reason}")]
    Config {
        /// Setting name
        field: String,
        /// Why it was rejected
        reason: String,
    },

    /// Parse session misuse (run twice, no sources)
    #[error("session error: {0}")]
    Session(String),

    /// I/O error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Regex compilation error
    #[error("regex error: {0}")]
    Regex(#[from] regex::Error),
}

impl EngineError {
    /// Shorthand for rule code reporting a failure.
    pub fn consumer(reason: impl Into<String>) -> Self {
        Self::Consumer(reason.into())
    }
}

impl From<EngineError> for LoganError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::RuleFailed {
                file, line, source, ..
            } => LoganError::Parse(ParseError::Rule {
                file,
                line,
                reason: source.to_string(),
            }),
            EngineError::Read { file, source } => LoganError::Parse(ParseError::Read {
                file,
                reason: source.to_string(),
            }),
            EngineError::Pattern { .. } | EngineError::Schema(_) | EngineError::UnknownSchema(_) => {
                LoganError::Schema(err.to_string())
            }
            EngineError::Query(reason) => LoganError::Query(reason),
            EngineError::Config { field, reason } => {
                LoganError::Config(ConfigError::InvalidValue { field, reason })
            }
            EngineError::Io(e) => LoganError::Io(e),
            other => LoganError::Parse(ParseError::Failed(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rule_failed_display_carries_location() {
        let err = EngineError::RuleFailed {
            file: "log-main.1.moz_log".to_owned(),
            line: 12,
            raw: "Creating nsHttpChannel [this=0x1]".to_owned(),
            source: Box::new(EngineError::consumer("bad state")),
        };
        let msg = err.to_string();
        assert!(msg.contains("log-main.1.moz_log:12"));
        assert!(msg.contains("Creating nsHttpChannel"));
        assert!(msg.contains("bad state"));
    }

    #[test]
    fn pattern_error_converts_to_schema_error() {
        let err = EngineError::Pattern {
            pattern: "foo %q".to_owned(),
            reason: "unknown placeholder '%q'".to_owned(),
        };
        let logan: LoganError = err.into();
        assert!(matches!(logan, LoganError::Schema(_)));
    }

    #[test]
    fn rule_failed_converts_to_parse_error() {
        let err = EngineError::RuleFailed {
            file: "a.log".to_owned(),
            line: 3,
            raw: "x".to_owned(),
            source: Box::new(EngineError::consumer("boom")),
        };
        let logan: LoganError = err.into();
        match logan {
            LoganError::Parse(ParseError::Rule { file, line, reason }) => {
                assert_eq!(file, "a.log");
                assert_eq!(line, 3);
                assert_eq!(reason, "boom");
            }
            other => panic!("unexpected conversion: {other}"),
        }
    }

    #[test]
    fn query_error_converts() {
        let logan: LoganError = EngineError::Query("unexpected operator '~'".to_owned()).into();
        assert!(matches!(logan, LoganError::Query(_)));
    }
}
