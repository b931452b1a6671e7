//! `logan parse` command handler

use std::collections::BTreeMap;
use std::io::Write;
use std::path::Path;

use serde::Serialize;
use tracing::info;

use logan_engine::{ObjectGraph, ParseSummary};

use crate::cli::ParseArgs;
use crate::error::CliError;
use crate::output::{OutputWriter, Render};
use crate::sink::CliSink;

use super::{load_config, parse_files};

/// Execute the `parse` command.
pub async fn execute(
    args: ParseArgs,
    config_path: &Path,
    writer: &OutputWriter,
) -> Result<(), CliError> {
    let config = load_config(config_path).await?;
    let mut sink = CliSink::new();
    let session = parse_files(&args.files, &config, &mut sink).await?;

    let report = ParseReport::new(
        args.files.iter().map(|p| p.display().to_string()).collect(),
        session.summary().clone(),
        session.graph(),
        &sink,
    );
    info!(
        objects = report.summary.objects,
        classes = report.classes.len(),
        "parse report ready"
    );
    writer.render(&report)
}

/// Objects of one class
#[derive(Debug, Serialize)]
pub struct ClassRow {
    pub class_name: String,
    pub objects: usize,
    /// Objects still holding a live alias at end of parse
    pub live: usize,
    pub searchable: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct ParseReport {
    pub files: Vec<String>,
    pub summary: ParseSummary,
    pub classes: Vec<ClassRow>,
    pub warnings: Vec<String>,
}

impl ParseReport {
    pub fn new(
        files: Vec<String>,
        summary: ParseSummary,
        graph: &ObjectGraph,
        sink: &CliSink,
    ) -> Self {
        let mut counts: BTreeMap<&str, (usize, usize)> = BTreeMap::new();
        for obj in graph.objs() {
            let Some(class) = obj.class_name() else {
                continue;
            };
            let entry = counts.entry(class).or_default();
            entry.0 += 1;
            if !obj.is_destroyed() {
                entry.1 += 1;
            }
        }

        let classes = counts
            .into_iter()
            .map(|(class, (objects, live))| ClassRow {
                class_name: class.to_owned(),
                objects,
                live,
                searchable: sink
                    .classes
                    .get(class)
                    .map(|props| props.iter().cloned().collect())
                    .unwrap_or_default(),
            })
            .collect();

        Self {
            files,
            summary,
            classes,
            warnings: sink.warnings.iter().map(ToString::to_string).collect(),
        }
    }
}

impl Render for ParseReport {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        use colored::Colorize;

        writeln!(w, "Parsed {} file(s): {}", self.files.len(), self.files.join(", ").bold())?;
        writeln!(
            w,
            "  Lines: {}  Bytes: {}  Objects: {}  IPC: {}",
            self.summary.lines,
            self.summary.bytes,
            self.summary.objects,
            if self.summary.ipc { "on" } else { "off" }
        )?;
        if self.summary.forced > 0 {
            writeln!(
                w,
                "  Forced dispatches: {}",
                self.summary.forced.to_string().yellow()
            )?;
        }

        writeln!(w)?;
        writeln!(w, "{:<32} {:>8} {:>8}  {}", "Class", "Objects", "Live", "Searchable")?;
        writeln!(w, "{}", "-".repeat(72))?;
        for row in &self.classes {
            writeln!(
                w,
                "{:<32} {:>8} {:>8}  {}",
                row.class_name,
                row.objects,
                row.live,
                row.searchable.join(", ")
            )?;
        }

        if !self.warnings.is_empty() {
            writeln!(w)?;
            writeln!(w, "Warnings ({}):", self.warnings.len().to_string().yellow().bold())?;
            for warning in &self.warnings {
                writeln!(w, "  {}", warning.yellow())?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use logan_engine::{Warning, WarningKind};

    #[test]
    fn test_render_text_lists_classes_and_warnings() {
        let report = ParseReport {
            files: vec!["log-main.1.moz_log".to_owned()],
            summary: ParseSummary {
                lines: 10,
                bytes: 900,
                objects: 3,
                warnings: 1,
                forced: 0,
                ipc: false,
            },
            classes: vec![ClassRow {
                class_name: "nsHttpChannel".to_owned(),
                objects: 3,
                live: 1,
                searchable: vec!["className".to_owned(), "pointer".to_owned(), "url".to_owned()],
            }],
            warnings: vec![Warning::new(WarningKind::UnmatchedSync, "recv 'A::1' never matched a send").to_string()],
        };

        colored::control::set_override(false);
        let mut buffer = Vec::new();
        report.render_text(&mut buffer).expect("render");
        let output = String::from_utf8(buffer).expect("utf-8");
        assert!(output.contains("Lines: 10"));
        assert!(output.contains("nsHttpChannel"));
        assert!(output.contains("className, pointer, url"));
        assert!(output.contains("[unmatched_sync] recv 'A::1'"));
        assert!(!output.contains("Forced"));
    }

    #[test]
    fn test_report_counts_live_objects() {
        let graph = ObjectGraph::new();
        let report = ParseReport::new(Vec::new(), ParseSummary::default(), &graph, &CliSink::new());
        assert!(report.classes.is_empty());
        assert!(report.warnings.is_empty());
    }
}
