//! Progress sink used by the CLI commands

use std::collections::{BTreeMap, BTreeSet};

use tracing::{debug, info, warn};

use logan_engine::{Obj, ObjId, ProgressSink, Warning};

/// Logs progress and keeps warnings for the final report.
#[derive(Debug, Default)]
pub struct CliSink {
    pub warnings: Vec<Warning>,
    pub results: Vec<ObjId>,
    pub classes: BTreeMap<String, BTreeSet<String>>,
    max: u64,
    loaded: u64,
    last_decile: u64,
}

impl CliSink {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ProgressSink for CliSink {
    fn warn(&mut self, warning: &Warning) {
        warn!(kind = %warning.kind, "{}", warning.message);
        self.warnings.push(warning.clone());
    }

    fn add_to_max_progress(&mut self, bytes: u64) {
        self.max += bytes;
    }

    fn add_to_load_progress(&mut self, bytes: u64) {
        self.loaded += bytes;
        if self.max == 0 {
            return;
        }
        let decile = self.loaded.saturating_mul(10) / self.max;
        if decile > self.last_decile {
            self.last_decile = decile;
            debug!(percent = decile * 10, loaded = self.loaded, "reading");
        }
    }

    fn reset_progress(&mut self) {
        self.max = 0;
        self.loaded = 0;
        self.last_decile = 0;
    }

    fn title(&mut self, title: &str) {
        info!(files = title, "parsing");
    }

    fn fill_class_names(&mut self, props: &BTreeMap<String, BTreeSet<String>>) {
        self.classes = props.clone();
    }

    fn add_result(&mut self, obj: &Obj) {
        self.results.push(obj.id());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use logan_engine::WarningKind;

    #[test]
    fn test_warnings_are_kept_in_order() {
        let mut sink = CliSink::new();
        sink.warn(&Warning::new(WarningKind::MultipleParents, "two parents"));
        sink.warn(&Warning::new(WarningKind::UnmatchedSync, "no send"));
        let kinds: Vec<_> = sink.warnings.iter().map(|w| w.kind).collect();
        assert_eq!(kinds, [WarningKind::MultipleParents, WarningKind::UnmatchedSync]);
    }

    #[test]
    fn test_progress_reset() {
        let mut sink = CliSink::new();
        sink.add_to_max_progress(100);
        sink.add_to_load_progress(55);
        assert_eq!(sink.last_decile, 5);
        sink.reset_progress();
        assert_eq!((sink.max, sink.loaded, sink.last_decile), (0, 0, 0));
    }
}
