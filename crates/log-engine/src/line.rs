//! Raw and prepared lines

use std::ops::Range;

use chrono::{DateTime, Utc};

/// One line as cut out of a source by the chunked reader
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawLine {
    /// Line text without the terminator
    pub text: String,
    /// Absolute byte range in the source, terminator excluded
    pub offset: Range<u64>,
    /// 1-based line number
    pub number: u64,
}

/// A line after the schema's preparer looked at it
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedLine {
    /// Full line as read
    pub raw: String,
    /// Message part the rules match against
    pub text: String,
    /// Header timestamp, [`DateTime::UNIX_EPOCH`] when the header has no date
    pub timestamp: DateTime<Utc>,
    pub thread: String,
    pub module: String,
    pub level: String,
    /// Replay event id from an `[rr <pid> <event>]` prefix
    pub replay_id: Option<u64>,
    pub offset: Range<u64>,
    pub number: u64,
    /// No header was recognized; context came from the previous line
    pub continuation: bool,
}

impl PreparedLine {
    /// A header-less line inheriting context from `previous`.
    pub fn continuation(raw: &RawLine, previous: Option<&PreparedLine>) -> Self {
        let (timestamp, thread, module, level) = match previous {
            Some(p) => (p.timestamp, p.thread.clone(), p.module.clone(), p.level.clone()),
            None => (DateTime::UNIX_EPOCH, String::new(), String::new(), String::new()),
        };
        Self {
            raw: raw.text.clone(),
            text: raw.text.clone(),
            timestamp,
            thread,
            module,
            level,
            replay_id: None,
            offset: raw.offset.clone(),
            number: raw.number,
            continuation: true,
        }
    }
}

/// Per-schema line header parser
pub trait LinePreparer: Send + Sync {
    /// Turns `raw` into a [`PreparedLine`]. Lines without a recognizable
    /// header inherit timestamp, thread and module from `previous`.
    fn prepare(&self, raw: &RawLine, previous: Option<&PreparedLine>) -> PreparedLine;
}

impl<F> LinePreparer for F
where
    F: Fn(&RawLine, Option<&PreparedLine>) -> PreparedLine + Send + Sync,
{
    fn prepare(&self, raw: &RawLine, previous: Option<&PreparedLine>) -> PreparedLine {
        self(raw, previous)
    }
}
