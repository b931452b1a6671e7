//! Progress sink
//!
//! The engine reports progress, soft warnings, discovered classes and
//! search results through [`ProgressSink`]. Only [`ProgressSink::warn`] is
//! required; everything else defaults to a no-op.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::Serialize;
use tracing::{info, warn};

use crate::graph::Obj;

/// Soft warning categories
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WarningKind {
    /// More than one parent-process family loaded
    MultipleParents,
    /// Child-process logs without any parent log
    OrphanChildren,
    /// A recv never saw its send
    UnmatchedSync,
    /// `create` on an object that already had a class
    ObjectRecreated,
    /// A second recv for a key that already had one parked
    DuplicateRecv,
}

impl WarningKind {
    /// Metric label value.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::MultipleParents => "multiple_parents",
            Self::OrphanChildren => "orphan_children",
            Self::UnmatchedSync => "unmatched_sync",
            Self::ObjectRecreated => "object_recreated",
            Self::DuplicateRecv => "duplicate_recv",
        }
    }
}

impl fmt::Display for WarningKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A non-fatal problem found while loading or parsing
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Warning {
    pub kind: WarningKind,
    pub message: String,
}

impl Warning {
    pub fn new(kind: WarningKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.kind, self.message)
    }
}

/// Receiver of engine progress and results
pub trait ProgressSink {
    fn warn(&mut self, warning: &Warning);

    /// Total bytes that will be read grew by `bytes`.
    fn add_to_max_progress(&mut self, _bytes: u64) {}

    /// `bytes` more were read.
    fn add_to_load_progress(&mut self, _bytes: u64) {}

    fn reset_progress(&mut self) {}

    /// Absolute progress in percent.
    fn load_progress(&mut self, _percent: u8) {}

    fn title(&mut self, _title: &str) {}

    /// Classes and their searchable properties, once parsing is done.
    fn fill_class_names(&mut self, _props: &BTreeMap<String, BTreeSet<String>>) {}

    fn fill_search_by(&mut self) {}

    fn searching_enabled(&mut self, _enabled: bool) {}

    fn add_result(&mut self, _obj: &Obj) {}
}

/// Sink that only logs
#[derive(Debug, Default)]
pub struct TracingSink {
    warnings: usize,
}

impl TracingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn warnings(&self) -> usize {
        self.warnings
    }
}

impl ProgressSink for TracingSink {
    fn warn(&mut self, warning: &Warning) {
        self.warnings += 1;
        warn!(kind = %warning.kind, "{}", warning.message);
    }

    fn title(&mut self, title: &str) {
        info!(title, "parse started");
    }

    fn fill_class_names(&mut self, props: &BTreeMap<String, BTreeSet<String>>) {
        info!(classes = props.len(), "classes discovered");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn warning_display_includes_kind() {
        let w = Warning::new(WarningKind::UnmatchedSync, "no send for 'A::1'");
        assert_eq!(w.to_string(), "[unmatched_sync] no send for 'A::1'");
    }

    #[test]
    fn tracing_sink_counts_warnings() {
        let mut sink = TracingSink::new();
        sink.warn(&Warning::new(WarningKind::OrphanChildren, "x"));
        sink.warn(&Warning::new(WarningKind::MultipleParents, "y"));
        sink.add_to_load_progress(10);
        assert_eq!(sink.warnings(), 2);
    }
}
